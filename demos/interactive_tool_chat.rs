//! Interactive client-tool demo
//!
//! Shows a turn that pauses in `ChatStatus::AwaitingInput` because the
//! server asked for a client-side tool the host marked `"interactive"`,
//! then resumes once the host supplies a result.

use async_trait::async_trait;
use open_agent::{
    BoxStreamEvents, Chat, ChatOptions, ChatStatus, ClientToolCallRequest, ClientToolHandler,
    FinishReason, StreamEvent, ToolResult, Transport, UIMessagePart, UserContent,
    UserMessageInput,
};
use serde_json::{json, Value};
use std::sync::Mutex;

/// Hands back a scripted batch of events per call, simulating the
/// continuation round the reducer triggers after a client tool resolves.
struct TwoTurnTransport {
    batches: Mutex<Vec<Vec<StreamEvent>>>,
}

impl TwoTurnTransport {
    fn new(batches: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            batches: Mutex::new(batches),
        }
    }
}

#[async_trait]
impl Transport for TwoTurnTransport {
    async fn trigger(
        &mut self,
        _trigger_name: &str,
        _input: Option<Value>,
        _client_tool_results: Option<Vec<ToolResult>>,
    ) -> open_agent::Result<BoxStreamEvents> {
        let mut batches = self.batches.lock().unwrap();
        let events = if batches.is_empty() {
            Vec::new()
        } else {
            batches.remove(0)
        };
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }

    async fn stop(&mut self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let transport = TwoTurnTransport::new(vec![
        vec![
            StreamEvent::ToolInputStart {
                tool_call_id: "c1".into(),
                tool_name: "ask-name".into(),
                title: Some("Asking for your name".into()),
            },
            StreamEvent::ToolInputAvailable {
                tool_call_id: "c1".into(),
                tool_name: "ask-name".into(),
                input: json!({}),
            },
            StreamEvent::ClientToolRequest {
                tool_calls: vec![ClientToolCallRequest {
                    tool_call_id: "c1".into(),
                    tool_name: "ask-name".into(),
                    args: json!({}),
                }],
            },
            StreamEvent::Finish {
                finish_reason: FinishReason::ClientToolCalls,
            },
        ],
        vec![
            StreamEvent::ToolOutputAvailable {
                tool_call_id: "c1".into(),
                output: json!({"name": "Ada"}),
            },
            StreamEvent::TextStart {
                id: "t1".into(),
                response_type: None,
            },
            StreamEvent::TextDelta {
                id: "t1".into(),
                delta: "Nice to meet you, Ada!".into(),
            },
            StreamEvent::TextEnd { id: "t1".into() },
            StreamEvent::Finish {
                finish_reason: FinishReason::Stop,
            },
        ],
    ]);

    let options = ChatOptions::builder()
        .transport(transport)
        .client_tool("ask-name", ClientToolHandler::Interactive)
        .build()?;
    let mut chat = Chat::new(options);

    chat.send(
        "default",
        None,
        Some(UserMessageInput {
            content: Some(UserContent::Text("Say hi".into())),
            files: None,
        }),
    )
    .await?;

    assert_eq!(chat.status(), ChatStatus::AwaitingInput);
    let pending = chat.pending_client_tools();
    println!("awaiting host input for: {:?}", pending);

    // The host UI collected a name from the user and hands it back here.
    chat.submit_client_tool_result("c1", Some(json!({"name": "Ada"})), None)
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
