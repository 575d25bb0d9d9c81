//! Shared scripted transport for integration tests.
//!
//! Each call to `trigger` hands back the next queued batch of events,
//! letting a single test drive a multi-round conversation (e.g. an initial
//! stream followed by a client-tool continuation) without a real server.

use async_trait::async_trait;
use open_agent::{BoxStreamEvents, StreamEvent, ToolResult, Transport};
use serde_json::Value;
use std::sync::Mutex;

pub struct ScriptedTransport {
    batches: Mutex<Vec<Vec<StreamEvent>>>,
    pub stop_calls: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new(batches: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            batches: Mutex::new(batches),
            stop_calls: Mutex::new(0),
        }
    }

    pub fn single(events: Vec<StreamEvent>) -> Self {
        Self::new(vec![events])
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
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

    async fn stop(&mut self) {
        *self.stop_calls.lock().unwrap() += 1;
    }
}
