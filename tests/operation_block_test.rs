//! S4 operation-block scenario plus invariants 4, 6, and 7.

mod common;

use common::ScriptedTransport;
use open_agent::{
    BlockDisplay, Chat, ChatOptions, FinishReason, OperationStatus, StreamEvent, UIMessagePart,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn set_resource_block_surfaces_operation_and_fires_resource_hook_once() {
    let transport = ScriptedTransport::single(vec![
        StreamEvent::BlockStart {
            block_id: "b1".into(),
            block_name: "save_prefs".into(),
            block_type: "set-resource".into(),
            display: BlockDisplay::Description,
            description: Some("Saving".into()),
            output_to_chat: true,
            thread: None,
        },
        StreamEvent::ResourceUpdate {
            name: "prefs".into(),
            value: json!({"x": 1}),
        },
        StreamEvent::BlockEnd { block_id: "b1".into() },
        StreamEvent::Finish {
            finish_reason: FinishReason::Stop,
        },
    ]);

    let resource_calls = Arc::new(Mutex::new(Vec::new()));
    let recorder = resource_calls.clone();
    let options = ChatOptions::builder()
        .transport(transport)
        .on_resource_update(move |name, value| {
            recorder.lock().unwrap().push((name.to_string(), value.clone()));
        })
        .build()
        .unwrap();
    let mut chat = Chat::new(options);
    chat.send("default", None, None).await.unwrap();

    // Invariant 6: resource-update never adds a part — exactly one
    // (operation) part total.
    let parts = &chat.messages()[0].parts;
    assert_eq!(parts.len(), 1);
    match &parts[0] {
        UIMessagePart::Operation {
            name,
            operation_type,
            status,
            ..
        } => {
            assert_eq!(name, "Saving");
            assert_eq!(operation_type, "set-resource");
            assert_eq!(*status, OperationStatus::Done);
        }
        other => panic!("unexpected part: {other:?}"),
    }
    assert!(!parts.iter().any(|p| matches!(p, UIMessagePart::Text { .. })));

    let calls = resource_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "prefs");
    assert_eq!(calls[0].1["x"], 1);
}

#[tokio::test]
async fn hidden_display_operation_block_produces_no_part() {
    let transport = ScriptedTransport::single(vec![
        StreamEvent::BlockStart {
            block_id: "b1".into(),
            block_name: "save_prefs".into(),
            block_type: "set-resource".into(),
            display: BlockDisplay::Hidden,
            description: None,
            output_to_chat: true,
            thread: None,
        },
        StreamEvent::BlockEnd { block_id: "b1".into() },
        StreamEvent::Finish {
            finish_reason: FinishReason::Stop,
        },
    ]);
    let options = ChatOptions::builder().transport(transport).build().unwrap();
    let mut chat = Chat::new(options);
    chat.send("default", None, None).await.unwrap();

    assert!(chat.messages().is_empty() || chat.messages()[0].parts.is_empty());
}

#[tokio::test]
async fn output_to_chat_false_suppresses_main_thread_text_but_not_non_main() {
    let transport = ScriptedTransport::single(vec![
        StreamEvent::BlockStart {
            block_id: "b1".into(),
            block_name: "inner".into(),
            block_type: "llm-call".into(),
            display: BlockDisplay::Hidden,
            description: None,
            output_to_chat: false,
            thread: None,
        },
        StreamEvent::TextStart {
            id: "t1".into(),
            response_type: None,
        },
        StreamEvent::TextDelta {
            id: "t1".into(),
            delta: "hidden".into(),
        },
        StreamEvent::TextEnd { id: "t1".into() },
        StreamEvent::BlockEnd { block_id: "b1".into() },
        StreamEvent::BlockStart {
            block_id: "b2".into(),
            block_name: "summary".into(),
            block_type: "llm-call".into(),
            display: BlockDisplay::Hidden,
            description: None,
            output_to_chat: false,
            thread: Some("summary".into()),
        },
        StreamEvent::TextStart {
            id: "t2".into(),
            response_type: None,
        },
        StreamEvent::TextDelta {
            id: "t2".into(),
            delta: "side note".into(),
        },
        StreamEvent::TextEnd { id: "t2".into() },
        StreamEvent::BlockEnd { block_id: "b2".into() },
        StreamEvent::Finish {
            finish_reason: FinishReason::Stop,
        },
    ]);
    let options = ChatOptions::builder().transport(transport).build().unwrap();
    let mut chat = Chat::new(options);
    chat.send("default", None, None).await.unwrap();

    let parts = &chat.messages()[0].parts;
    assert_eq!(parts.len(), 1);
    match &parts[0] {
        UIMessagePart::Text { text, thread, .. } => {
            assert_eq!(text, "side note");
            assert_eq!(thread.as_deref(), Some("summary"));
        }
        other => panic!("unexpected part: {other:?}"),
    }
}

#[tokio::test]
async fn operation_part_is_cancelled_on_stop() {
    let transport = ScriptedTransport::single(vec![
        StreamEvent::BlockStart {
            block_id: "b1".into(),
            block_name: "save_prefs".into(),
            block_type: "set-resource".into(),
            display: BlockDisplay::Description,
            description: Some("Saving".into()),
            output_to_chat: true,
            thread: None,
        },
    ]);
    let options = ChatOptions::builder().transport(transport).build().unwrap();
    let mut chat = Chat::new(options);
    chat.send("default", None, None).await.unwrap();
    chat.stop().await;

    match &chat.messages()[0].parts[0] {
        UIMessagePart::Operation { status, .. } => {
            assert_eq!(*status, OperationStatus::Cancelled);
        }
        other => panic!("unexpected part: {other:?}"),
    }
}
