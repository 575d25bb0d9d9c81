//! Basic chat demo
//!
//! Drives a `Chat` against a scripted transport that plays back a small
//! fixed event script, instead of a real server, so the example runs with
//! no network access. Swap `ScriptedTransport` for
//! `open_agent::RequestStreamTransport::new(url)` to talk to a real
//! endpoint.

use async_trait::async_trait;
use open_agent::{
    BoxStreamEvents, Chat, ChatOptions, ChatStatus, FinishReason, StreamEvent, Transport,
    UIMessagePart, UserContent, UserMessageInput,
};
use serde_json::Value;
use std::sync::Mutex;

struct ScriptedTransport {
    events: Mutex<Vec<StreamEvent>>,
}

impl ScriptedTransport {
    fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn trigger(
        &mut self,
        _trigger_name: &str,
        _input: Option<Value>,
        _client_tool_results: Option<Vec<open_agent::ToolResult>>,
    ) -> open_agent::Result<BoxStreamEvents> {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }

    async fn stop(&mut self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let transport = ScriptedTransport::new(vec![
        StreamEvent::Start,
        StreamEvent::TextStart {
            id: "t1".into(),
            response_type: None,
        },
        StreamEvent::TextDelta {
            id: "t1".into(),
            delta: "The capital of France is ".into(),
        },
        StreamEvent::TextDelta {
            id: "t1".into(),
            delta: "Paris.".into(),
        },
        StreamEvent::TextEnd { id: "t1".into() },
        StreamEvent::Finish {
            finish_reason: FinishReason::Stop,
        },
    ]);

    let options = ChatOptions::builder().transport(transport).build()?;
    let mut chat = Chat::new(options);

    chat.subscribe(|snapshot| {
        println!("status={:?} messages={}", snapshot.status, snapshot.messages.len());
    });

    chat.send(
        "default",
        None,
        Some(UserMessageInput {
            content: Some(UserContent::Text("What's the capital of France?".into())),
            files: None,
        }),
    )
    .await?;

    assert_eq!(chat.status(), ChatStatus::Idle);
    for message in chat.messages() {
        for part in &message.parts {
            if let UIMessagePart::Text { text, .. } = part {
                println!("assistant: {text}");
            }
        }
    }

    Ok(())
}
