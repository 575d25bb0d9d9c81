//! The stream reducer: folds a [`crate::event::StreamEvent`] sequence into
//! an evolving [`UIMessage`] and mediates client-side tool execution.
//!
//! `Chat` drives an arbitrary [`Transport`], folding its event union into
//! reactive `UIMessage` snapshots and pausing for client-side tool
//! execution along the way.

use crate::error::{AgentError, ErrorSource, ErrorType};
use crate::event::{BlockDisplay, FinishReason, StreamEvent};
use crate::partial_json::repair_partial_json;
use crate::tools::{ClientToolHandler, PendingClientTool, ToolMediator, ToolResult};
use crate::transport::{BoxStreamEvents, Transport};
use crate::types::{
    MessageStatus, ObjectStatus, OperationStatus, ToolCallStatus, UIMessage, UIMessagePart, UIRole,
};
use crate::upload::{FileReference, PendingUpload, ProgressHandler, UploadUrlRequester};
use crate::{upload, Error, Result};
use futures::stream::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Observable lifecycle of a [`Chat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    Streaming,
    Error,
    AwaitingInput,
}

/// Immutable snapshot handed to subscribers after each mutation.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    pub messages: Vec<UIMessage>,
    pub status: ChatStatus,
    pub error: Option<AgentError>,
    pub pending_client_tools: Vec<PendingClientTool>,
}

type Listener = Arc<dyn Fn(&ChatSnapshot) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&AgentError) + Send + Sync>;
type VoidHook = Arc<dyn Fn() + Send + Sync>;
type ResourceHook = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Content of an optimistically-appended user message, per spec §4.E.1.
pub enum UserContent {
    Text(String),
    Object(Value),
}

/// A file attached to an outgoing user message: either already uploaded, or
/// pending upload through [`ChatOptions::request_upload_urls`].
pub enum UserFile {
    Reference(FileReference),
    Pending(PendingUpload),
}

/// Input to [`Chat::send`]'s optimistic user-message construction.
#[derive(Default)]
pub struct UserMessageInput {
    pub content: Option<UserContent>,
    pub files: Option<Vec<UserFile>>,
}

/// Per-open-block bookkeeping. Tracks just enough to gate and tag parts
/// produced while the block is active; the block's own reasoning/text
/// accumulation lives on the part itself, not duplicated here.
struct BlockState {
    block_id: String,
    output_to_chat: bool,
    thread: Option<String>,
}

/// Reducer-local state for the message currently being streamed.
#[derive(Default)]
struct StreamingState {
    message_index: usize,
    active_block: Option<BlockState>,
    current_text_index: Option<usize>,
    current_reasoning_index: Option<usize>,
    current_object_index: Option<usize>,
    accumulated_json: String,
    tool_call_parts: HashMap<String, usize>,
    operation_parts: HashMap<String, usize>,
}

/// Host configuration for a [`Chat`]: its transport, upload plumbing,
/// client-side tool handlers, and lifecycle hooks.
pub struct ChatOptions {
    pub transport: Box<dyn Transport>,
    pub request_upload_urls: Option<UploadUrlRequester>,
    pub client_tools: HashMap<String, ClientToolHandler>,
    pub initial_messages: Vec<UIMessage>,
    pub on_error: Option<ErrorHook>,
    pub on_finish: Option<VoidHook>,
    pub on_stop: Option<VoidHook>,
    pub on_resource_update: Option<ResourceHook>,
}

impl std::fmt::Debug for ChatOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOptions")
            .field("client_tools", &self.client_tools.keys().collect::<Vec<_>>())
            .field("initial_messages", &self.initial_messages.len())
            .field("request_upload_urls", &self.request_upload_urls.is_some())
            .finish()
    }
}

impl ChatOptions {
    pub fn builder() -> ChatOptionsBuilder {
        ChatOptionsBuilder::default()
    }
}

/// Builder for [`ChatOptions`]. `transport` is the only required field;
/// `build()` returns a config error if it was never set.
#[derive(Default)]
pub struct ChatOptionsBuilder {
    transport: Option<Box<dyn Transport>>,
    request_upload_urls: Option<UploadUrlRequester>,
    client_tools: HashMap<String, ClientToolHandler>,
    initial_messages: Vec<UIMessage>,
    on_error: Option<ErrorHook>,
    on_finish: Option<VoidHook>,
    on_stop: Option<VoidHook>,
    on_resource_update: Option<ResourceHook>,
}

impl ChatOptionsBuilder {
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn request_upload_urls(mut self, requester: UploadUrlRequester) -> Self {
        self.request_upload_urls = Some(requester);
        self
    }

    pub fn client_tool(mut self, name: impl Into<String>, handler: ClientToolHandler) -> Self {
        self.client_tools.insert(name.into(), handler);
        self
    }

    pub fn initial_messages(mut self, messages: Vec<UIMessage>) -> Self {
        self.initial_messages = messages;
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&AgentError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn on_finish<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_finish = Some(Arc::new(handler));
        self
    }

    pub fn on_stop<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_stop = Some(Arc::new(handler));
        self
    }

    pub fn on_resource_update<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.on_resource_update = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<ChatOptions> {
        let transport = self
            .transport
            .ok_or_else(|| Error::config("transport is required"))?;
        Ok(ChatOptions {
            transport,
            request_upload_urls: self.request_upload_urls,
            client_tools: self.client_tools,
            initial_messages: self.initial_messages,
            on_error: self.on_error,
            on_finish: self.on_finish,
            on_stop: self.on_stop,
            on_resource_update: self.on_resource_update,
        })
    }
}

/// The stream reducer / chat state machine.
///
/// Owns its `messages` list, `streamingState`, pending-tool map, and
/// transport exclusively; subscribers observe [`ChatSnapshot`]s and must
/// never mutate them. All transitions run on one logical execution
/// context: every mutating method takes `&mut self`, so there is no
/// concurrent access to reconcile.
pub struct Chat {
    transport: Box<dyn Transport>,
    http_client: reqwest::Client,
    mediator: ToolMediator,
    request_upload_urls: Option<UploadUrlRequester>,
    messages: Vec<UIMessage>,
    status: ChatStatus,
    error: Option<AgentError>,
    streaming: Option<StreamingState>,
    last_trigger: Option<(String, Option<Value>)>,
    collected_tool_results: Vec<ToolResult>,
    listeners: Vec<Option<Listener>>,
    id_seq: u64,
    on_error: Option<ErrorHook>,
    on_finish: Option<VoidHook>,
    on_stop: Option<VoidHook>,
    on_resource_update: Option<ResourceHook>,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("status", &self.status)
            .field("messages", &self.messages.len())
            .field("pending_client_tools", &self.mediator.pending_list().len())
            .finish()
    }
}

impl Chat {
    pub fn new(options: ChatOptions) -> Self {
        Self {
            transport: options.transport,
            http_client: reqwest::Client::new(),
            mediator: ToolMediator::new(options.client_tools),
            request_upload_urls: options.request_upload_urls,
            messages: options.initial_messages,
            status: ChatStatus::Idle,
            error: None,
            streaming: None,
            last_trigger: None,
            collected_tool_results: Vec::new(),
            listeners: Vec::new(),
            id_seq: 0,
            on_error: options.on_error,
            on_finish: options.on_finish,
            on_stop: options.on_stop,
            on_resource_update: options.on_resource_update,
        }
    }

    pub fn messages(&self) -> &[UIMessage] {
        &self.messages
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn error(&self) -> Option<&AgentError> {
        self.error.as_ref()
    }

    pub fn pending_client_tools(&self) -> Vec<PendingClientTool> {
        self.mediator.pending_list()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.messages.clone(),
            status: self.status,
            error: self.error.clone(),
            pending_client_tools: self.mediator.pending_list(),
        }
    }

    /// Registers a listener invoked after every observable mutation.
    /// Returns a handle for [`Chat::unsubscribe`].
    pub fn subscribe(&mut self, listener: impl Fn(&ChatSnapshot) + Send + Sync + 'static) -> usize {
        self.listeners.push(Some(Arc::new(listener)));
        self.listeners.len() - 1
    }

    pub fn unsubscribe(&mut self, handle: usize) {
        if let Some(slot) = self.listeners.get_mut(handle) {
            *slot = None;
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        for listener in self.listeners.iter().flatten() {
            listener(&snapshot);
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.id_seq += 1;
        format!("{prefix}_{}", self.id_seq)
    }

    fn now_millis() -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// §4.D pass-through.
    pub async fn upload_files(
        &self,
        files: Vec<PendingUpload>,
        on_progress: Option<&ProgressHandler>,
    ) -> Result<Vec<FileReference>> {
        let requester = self
            .request_upload_urls
            .as_ref()
            .ok_or_else(|| Error::config("request_upload_urls is required to upload files"))?;
        upload::upload_files(&self.http_client, files, requester, on_progress).await
    }

    /// §4.E.1 optimistic user-message construction.
    async fn build_user_message(&mut self, input: UserMessageInput) -> Result<UIMessage> {
        let mut parts = Vec::new();

        if let Some(files) = input.files {
            let mut pending = Vec::new();
            let mut resolved = Vec::new();
            for file in files {
                match file {
                    UserFile::Reference(reference) => resolved.push(reference),
                    UserFile::Pending(upload) => pending.push(upload),
                }
            }
            if !pending.is_empty() {
                let mut uploaded = self.upload_files(pending, None).await?;
                resolved.append(&mut uploaded);
            }
            for file in resolved {
                parts.push(UIMessagePart::File {
                    file: serde_json::to_value(&file)?,
                    thread: None,
                });
            }
        }

        if let Some(content) = input.content {
            match content {
                UserContent::Text(text) => parts.push(UIMessagePart::Text {
                    text,
                    status: MessageStatus::Done,
                    thread: None,
                }),
                UserContent::Object(object) => {
                    let type_name = object
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or("object")
                        .to_string();
                    parts.push(UIMessagePart::Object {
                        type_name,
                        partial: Some(object.clone()),
                        object: Some(object),
                        status: ObjectStatus::Done,
                        error: None,
                        thread: None,
                    });
                }
            }
        }

        let id = self.next_id("user");
        Ok(UIMessage {
            id,
            role: UIRole::User,
            parts,
            status: MessageStatus::Done,
            created_at: Self::now_millis(),
        })
    }

    /// Starts a trigger: optimistically appends a user message, then runs
    /// the reducer until the event stream ends or pauses for client-tool
    /// input.
    pub async fn send(
        &mut self,
        trigger_name: &str,
        input: Option<Value>,
        user_message: Option<UserMessageInput>,
    ) -> Result<()> {
        if let Some(user_message) = user_message {
            let message = self.build_user_message(user_message).await?;
            self.messages.push(message);
            self.notify();
        }

        self.last_trigger = Some((trigger_name.to_string(), input.clone()));
        self.status = ChatStatus::Streaming;
        self.error = None;
        self.notify();

        let stream = self.transport.trigger(trigger_name, input, None).await?;
        self.drive(stream).await
    }

    /// Cancels the transport and finalizes the in-progress message. Safe to
    /// call more than once.
    pub async fn stop(&mut self) {
        self.transport.stop().await;
        self.finalize_in_progress();
        self.mediator.clear_pending();
        self.collected_tool_results.clear();
        self.status = ChatStatus::Idle;
        if let Some(on_stop) = &self.on_stop {
            on_stop();
        }
        self.notify();
    }

    /// Resolves one pending interactive client tool. A no-op for an unknown
    /// `tool_call_id`.
    pub async fn submit_client_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        result: Option<Value>,
        error: Option<AgentError>,
    ) -> Result<()> {
        let tool_call_id = tool_call_id.into();
        let tool_result = match (result, error) {
            (Some(output), _) => ToolResult::ok(tool_call_id, output),
            (None, Some(err)) => ToolResult::err(tool_call_id, err),
            (None, None) => ToolResult::ok(tool_call_id, Value::Null),
        };

        self.apply_tool_result(&tool_result);
        self.collected_tool_results.push(tool_result.clone());
        let drained = self.mediator.submit_result(tool_result);
        self.notify();

        if drained {
            self.status = ChatStatus::Streaming;
            let results = std::mem::take(&mut self.collected_tool_results);
            let stream = self.continue_with_results(results).await?;
            self.drive(stream).await?;
        }

        Ok(())
    }

    async fn continue_with_results(&mut self, results: Vec<ToolResult>) -> Result<BoxStreamEvents> {
        let (trigger_name, input) = self
            .last_trigger
            .clone()
            .ok_or_else(|| Error::other("no trigger to continue"))?;
        log::debug!(
            "continuing trigger '{trigger_name}' with {} client tool result(s)",
            results.len()
        );
        self.transport
            .trigger(&trigger_name, input, Some(results))
            .await
    }

    /// Pulls events until the stream ends, swapping in a new stream when an
    /// event hands one back (an automatic-only client-tool continuation).
    async fn drive(&mut self, mut stream: BoxStreamEvents) -> Result<()> {
        loop {
            match stream.next().await {
                Some(Ok(event)) => match self.apply_event(event).await {
                    Ok(Some(next_stream)) => {
                        stream = next_stream;
                        self.notify();
                    }
                    Ok(None) => {
                        self.notify();
                        if self.status != ChatStatus::Streaming {
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        self.fail(err);
                        return Ok(());
                    }
                },
                Some(Err(err)) => {
                    self.fail(err);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    fn fail(&mut self, err: Error) {
        self.finalize_in_progress();
        self.mediator.clear_pending();
        self.collected_tool_results.clear();
        let agent_err = match err {
            Error::Protocol(agent_err) => agent_err,
            other => AgentError::new(ErrorType::UnknownError, other.to_string(), ErrorSource::Platform),
        };
        if let Some(on_error) = &self.on_error {
            on_error(&agent_err);
        }
        self.error = Some(agent_err);
        self.status = ChatStatus::Error;
        self.notify();
    }

    /// Shared by `stop()` and the stream-error catch path: streaming
    /// text/reasoning/object parts become `done`, pending/running
    /// tool-calls and operations become `cancelled`, and an empty
    /// placeholder message is discarded rather than kept.
    fn finalize_in_progress(&mut self) {
        let Some(streaming) = self.streaming.take() else {
            return;
        };
        let Some(message) = self.messages.get_mut(streaming.message_index) else {
            return;
        };

        for part in &mut message.parts {
            match part {
                UIMessagePart::Text { status, .. } | UIMessagePart::Reasoning { status, .. } => {
                    if *status == MessageStatus::Streaming {
                        *status = MessageStatus::Done;
                    }
                }
                UIMessagePart::Object { status, .. } => {
                    if *status == ObjectStatus::Streaming {
                        *status = ObjectStatus::Done;
                    }
                }
                UIMessagePart::ToolCall { status, .. } => {
                    if matches!(status, ToolCallStatus::Pending | ToolCallStatus::Running) {
                        *status = ToolCallStatus::Cancelled;
                    }
                }
                UIMessagePart::Operation { status, .. } => {
                    if *status == OperationStatus::Running {
                        *status = OperationStatus::Cancelled;
                    }
                }
                UIMessagePart::Source { .. } | UIMessagePart::File { .. } => {}
            }
        }

        if message.parts.is_empty() {
            self.messages.remove(streaming.message_index);
        } else {
            message.status = MessageStatus::Done;
        }
    }

    fn ensure_streaming(&mut self) -> &mut StreamingState {
        if self.streaming.is_none() {
            let id = self.next_id("asst");
            let message = UIMessage::new(id, UIRole::Assistant, Self::now_millis());
            self.messages.push(message);
            self.streaming = Some(StreamingState {
                message_index: self.messages.len() - 1,
                ..Default::default()
            });
        }
        self.streaming.as_mut().expect("just ensured")
    }

    fn push_part(&mut self, part: UIMessagePart) -> usize {
        let index = self.ensure_streaming().message_index;
        self.messages[index].parts.push(part);
        self.messages[index].parts.len() - 1
    }

    fn active_thread(&self) -> Option<String> {
        self.streaming
            .as_ref()
            .and_then(|s| s.active_block.as_ref())
            .and_then(|b| b.thread.clone())
    }

    fn active_output_to_chat(&self) -> bool {
        self.streaming
            .as_ref()
            .and_then(|s| s.active_block.as_ref())
            .map(|b| b.output_to_chat)
            .unwrap_or(true)
    }

    fn apply_tool_result(&mut self, result: &ToolResult) {
        let Some(streaming) = &self.streaming else {
            return;
        };
        let message_index = streaming.message_index;
        let Some(&part_index) = streaming.tool_call_parts.get(&result.tool_call_id) else {
            return;
        };
        let Some(part) = self
            .messages
            .get_mut(message_index)
            .and_then(|m| m.parts.get_mut(part_index))
        else {
            return;
        };
        if let UIMessagePart::ToolCall {
            result: slot,
            error,
            status,
            ..
        } = part
        {
            if let Some(output) = &result.output {
                *slot = Some(output.clone());
                *status = ToolCallStatus::Done;
            } else if let Some(err) = &result.error {
                *error = Some(err.clone());
                *status = ToolCallStatus::Error;
            }
        }
    }

    /// §4.E.2: one step of the fold, applied in event-arrival order.
    /// Returns `Some(stream)` when handling the event started a new
    /// transport stream (an automatic-only client-tool continuation) that
    /// `drive` should swap in.
    async fn apply_event(&mut self, event: StreamEvent) -> Result<Option<BoxStreamEvents>> {
        match event {
            StreamEvent::Start => Ok(None),

            StreamEvent::BlockStart {
                block_id,
                block_name,
                block_type,
                display,
                description,
                output_to_chat,
                thread,
            } => {
                let is_operation_block = matches!(
                    block_type.as_str(),
                    "set-resource" | "serialize-thread" | "generate-image"
                );
                if is_operation_block && display != BlockDisplay::Hidden {
                    let name = description.clone().unwrap_or(block_name);
                    let part = UIMessagePart::Operation {
                        operation_id: block_id.clone(),
                        name,
                        operation_type: block_type,
                        status: OperationStatus::Running,
                        thread: thread.clone(),
                    };
                    let index = self.push_part(part);
                    self.ensure_streaming()
                        .operation_parts
                        .insert(block_id.clone(), index);
                }
                let streaming = self.ensure_streaming();
                streaming.active_block = Some(BlockState {
                    block_id,
                    output_to_chat,
                    thread,
                });
                streaming.current_text_index = None;
                streaming.current_reasoning_index = None;
                Ok(None)
            }

            StreamEvent::BlockEnd { block_id } => {
                if let Some(streaming) = &mut self.streaming {
                    if let Some(&index) = streaming.operation_parts.get(&block_id) {
                        if let Some(UIMessagePart::Operation { status, .. }) =
                            self.messages[streaming.message_index].parts.get_mut(index)
                        {
                            if *status == OperationStatus::Running {
                                *status = OperationStatus::Done;
                            }
                        }
                    }
                    if streaming
                        .active_block
                        .as_ref()
                        .is_some_and(|b| b.block_id == block_id)
                    {
                        streaming.active_block = None;
                    }
                }
                Ok(None)
            }

            StreamEvent::ReasoningStart { .. } => {
                let thread = self.active_thread();
                let part = UIMessagePart::Reasoning {
                    text: String::new(),
                    status: MessageStatus::Streaming,
                    thread,
                };
                let index = self.push_part(part);
                self.ensure_streaming().current_reasoning_index = Some(index);
                Ok(None)
            }

            StreamEvent::ReasoningDelta { delta, .. } => {
                if let Some(streaming) = &self.streaming {
                    if let Some(index) = streaming.current_reasoning_index {
                        let message_index = streaming.message_index;
                        if let Some(UIMessagePart::Reasoning { text, .. }) =
                            self.messages[message_index].parts.get_mut(index)
                        {
                            text.push_str(&delta);
                        }
                    }
                }
                Ok(None)
            }

            StreamEvent::ReasoningEnd { .. } => {
                if let Some(streaming) = &mut self.streaming {
                    if let Some(index) = streaming.current_reasoning_index.take() {
                        let message_index = streaming.message_index;
                        if let Some(UIMessagePart::Reasoning { status, .. }) =
                            self.messages[message_index].parts.get_mut(index)
                        {
                            *status = MessageStatus::Done;
                        }
                    }
                }
                Ok(None)
            }

            StreamEvent::TextStart { response_type, .. } => {
                let thread = self.active_thread();
                if !self.active_output_to_chat() && thread.is_none() {
                    return Ok(None);
                }
                if let Some(type_name) = response_type {
                    let part = UIMessagePart::Object {
                        type_name,
                        partial: None,
                        object: None,
                        status: ObjectStatus::Streaming,
                        error: None,
                        thread,
                    };
                    let index = self.push_part(part);
                    let streaming = self.ensure_streaming();
                    streaming.current_object_index = Some(index);
                    streaming.accumulated_json.clear();
                } else {
                    let part = UIMessagePart::Text {
                        text: String::new(),
                        status: MessageStatus::Streaming,
                        thread,
                    };
                    let index = self.push_part(part);
                    self.ensure_streaming().current_text_index = Some(index);
                }
                Ok(None)
            }

            StreamEvent::TextDelta { delta, .. } => {
                if let Some(streaming) = &mut self.streaming {
                    let message_index = streaming.message_index;
                    if let Some(index) = streaming.current_object_index {
                        streaming.accumulated_json.push_str(&delta);
                        if let Some(value) = repair_partial_json(&streaming.accumulated_json) {
                            if let Some(UIMessagePart::Object { partial, .. }) =
                                self.messages[message_index].parts.get_mut(index)
                            {
                                *partial = Some(value);
                            }
                        }
                    } else if let Some(index) = streaming.current_text_index {
                        if let Some(UIMessagePart::Text { text, .. }) =
                            self.messages[message_index].parts.get_mut(index)
                        {
                            text.push_str(&delta);
                        }
                    }
                }
                Ok(None)
            }

            StreamEvent::TextEnd { .. } => {
                if let Some(streaming) = &mut self.streaming {
                    let message_index = streaming.message_index;
                    if let Some(index) = streaming.current_object_index.take() {
                        let parsed = serde_json::from_str::<Value>(&streaming.accumulated_json).ok();
                        if let Some(UIMessagePart::Object {
                            partial,
                            object,
                            status,
                            error,
                            ..
                        }) = self.messages[message_index].parts.get_mut(index)
                        {
                            match parsed {
                                Some(value) => {
                                    *object = Some(value.clone());
                                    *partial = Some(value);
                                    *status = ObjectStatus::Done;
                                }
                                None => {
                                    *status = ObjectStatus::Error;
                                    *error = Some("Failed to parse response as JSON".to_string());
                                }
                            }
                        }
                    } else if let Some(index) = streaming.current_text_index.take() {
                        if let Some(UIMessagePart::Text { status, .. }) =
                            self.messages[message_index].parts.get_mut(index)
                        {
                            *status = MessageStatus::Done;
                        }
                    }
                }
                Ok(None)
            }

            StreamEvent::ToolInputStart {
                tool_call_id,
                tool_name,
                title,
            } => {
                let thread = self.active_thread();
                let part = UIMessagePart::ToolCall {
                    tool_call_id: tool_call_id.clone(),
                    tool_name,
                    display_name: title,
                    args: Some(Value::Object(Default::default())),
                    result: None,
                    error: None,
                    status: ToolCallStatus::Pending,
                    thread,
                };
                let index = self.push_part(part);
                self.ensure_streaming()
                    .tool_call_parts
                    .insert(tool_call_id, index);
                Ok(None)
            }

            StreamEvent::ToolInputDelta {
                tool_call_id,
                delta,
            } => {
                if let Ok(value) = serde_json::from_str::<Value>(&delta) {
                    self.update_tool_call_args(&tool_call_id, value);
                }
                Ok(None)
            }

            StreamEvent::ToolInputEnd { .. } => Ok(None),

            StreamEvent::ToolInputAvailable {
                tool_call_id,
                input,
                ..
            } => {
                self.update_tool_call_args(&tool_call_id, input);
                self.set_tool_call_status(&tool_call_id, ToolCallStatus::Running);
                Ok(None)
            }

            StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            } => {
                self.apply_tool_result(&ToolResult::ok(tool_call_id, output));
                Ok(None)
            }

            StreamEvent::ToolOutputError {
                tool_call_id,
                error,
            } => {
                self.apply_tool_result(&ToolResult::err(tool_call_id, error));
                Ok(None)
            }

            StreamEvent::Source { thread, payload } => {
                self.push_part(UIMessagePart::Source {
                    source: payload,
                    thread,
                });
                Ok(None)
            }

            StreamEvent::FileAvailable { file, thread } => {
                self.push_part(UIMessagePart::File {
                    file: serde_json::to_value(file)?,
                    thread,
                });
                Ok(None)
            }

            StreamEvent::ResourceUpdate { name, value } => {
                if let Some(on_resource_update) = &self.on_resource_update {
                    on_resource_update(&name, &value);
                }
                Ok(None)
            }

            StreamEvent::ToolRequest { .. } => Ok(None),

            StreamEvent::ClientToolRequest { tool_calls } => {
                let requests = tool_calls
                    .into_iter()
                    .map(|call| PendingClientTool {
                        tool_call_id: call.tool_call_id,
                        tool_name: call.tool_name,
                        input: call.args,
                    })
                    .collect();
                let outcome = self.mediator.dispatch(requests).await;
                for result in &outcome.results {
                    self.apply_tool_result(result);
                }
                self.collected_tool_results.extend(outcome.results);

                if outcome.pending.is_empty() {
                    let results = std::mem::take(&mut self.collected_tool_results);
                    let stream = self.continue_with_results(results).await?;
                    Ok(Some(stream))
                } else {
                    Ok(None)
                }
            }

            StreamEvent::Finish { finish_reason } => {
                if finish_reason == FinishReason::ClientToolCalls {
                    if self.mediator.has_pending() {
                        self.status = ChatStatus::AwaitingInput;
                    }
                    return Ok(None);
                }

                self.finalize_in_progress();
                self.status = ChatStatus::Idle;
                if let Some(on_finish) = &self.on_finish {
                    on_finish();
                }
                Ok(None)
            }

            StreamEvent::Error { error } => Err(error.into()),
        }
    }

    fn update_tool_call_args(&mut self, tool_call_id: &str, input: Value) {
        if let Some(streaming) = &self.streaming {
            if let Some(&index) = streaming.tool_call_parts.get(tool_call_id) {
                let message_index = streaming.message_index;
                if let Some(UIMessagePart::ToolCall { args, .. }) =
                    self.messages[message_index].parts.get_mut(index)
                {
                    *args = Some(input);
                }
            }
        }
    }

    fn set_tool_call_status(&mut self, tool_call_id: &str, new_status: ToolCallStatus) {
        if let Some(streaming) = &self.streaming {
            if let Some(&index) = streaming.tool_call_parts.get(tool_call_id) {
                let message_index = streaming.message_index;
                if let Some(UIMessagePart::ToolCall { status, .. }) =
                    self.messages[message_index].parts.get_mut(index)
                {
                    *status = new_status;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ClientToolCallRequest, FinishReason};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedTransport {
        batches: Mutex<Vec<Vec<Result<StreamEvent>>>>,
    }

    impl ScriptedTransport {
        fn new(batches: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                batches: Mutex::new(
                    batches
                        .into_iter()
                        .map(|batch| batch.into_iter().map(Ok).collect())
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn trigger(
            &mut self,
            _trigger_name: &str,
            _input: Option<Value>,
            _client_tool_results: Option<Vec<ToolResult>>,
        ) -> Result<BoxStreamEvents> {
            let mut batches = self.batches.lock().unwrap();
            let events = if batches.is_empty() {
                Vec::new()
            } else {
                batches.remove(0)
            };
            Ok(Box::pin(futures::stream::iter(events)))
        }

        async fn stop(&mut self) {}
    }

    fn chat_with(batches: Vec<Vec<StreamEvent>>) -> Chat {
        let options = ChatOptions::builder()
            .transport(ScriptedTransport::new(batches))
            .build()
            .unwrap();
        Chat::new(options)
    }

    #[tokio::test]
    async fn plain_text_stream_produces_one_done_text_part() {
        let mut chat = chat_with(vec![vec![
            StreamEvent::Start,
            StreamEvent::TextStart {
                id: "t1".into(),
                response_type: None,
            },
            StreamEvent::TextDelta {
                id: "t1".into(),
                delta: "Hel".into(),
            },
            StreamEvent::TextDelta {
                id: "t1".into(),
                delta: "lo".into(),
            },
            StreamEvent::TextEnd { id: "t1".into() },
            StreamEvent::Finish {
                finish_reason: FinishReason::Stop,
            },
        ]]);

        chat.send("respond", None, None).await.unwrap();

        assert_eq!(chat.status(), ChatStatus::Idle);
        assert_eq!(chat.messages().len(), 1);
        match &chat.messages()[0].parts[0] {
            UIMessagePart::Text { text, status, .. } => {
                assert_eq!(text, "Hello");
                assert_eq!(*status, MessageStatus::Done);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn structured_object_repairs_mid_stream_and_finalizes() {
        let mut chat = chat_with(vec![vec![
            StreamEvent::TextStart {
                id: "o1".into(),
                response_type: Some("Greeting".into()),
            },
            StreamEvent::TextDelta {
                id: "o1".into(),
                delta: "{\"msg\":\"hi\"".into(),
            },
            StreamEvent::TextDelta {
                id: "o1".into(),
                delta: "}".into(),
            },
            StreamEvent::TextEnd { id: "o1".into() },
            StreamEvent::Finish {
                finish_reason: FinishReason::Stop,
            },
        ]]);

        chat.send("respond", None, None).await.unwrap();

        match &chat.messages()[0].parts[0] {
            UIMessagePart::Object {
                type_name,
                object,
                status,
                ..
            } => {
                assert_eq!(type_name, "Greeting");
                assert_eq!(object.as_ref().unwrap()["msg"], "hi");
                assert_eq!(*status, ObjectStatus::Done);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn interactive_client_tool_pauses_then_resumes_on_submit() {
        let mut chat = chat_with(vec![
            vec![
                StreamEvent::ToolInputStart {
                    tool_call_id: "c1".into(),
                    tool_name: "ask-name".into(),
                    title: None,
                },
                StreamEvent::ToolInputAvailable {
                    tool_call_id: "c1".into(),
                    tool_name: "ask-name".into(),
                    input: serde_json::json!({}),
                },
                StreamEvent::ClientToolRequest {
                    tool_calls: vec![ClientToolCallRequest {
                        tool_call_id: "c1".into(),
                        tool_name: "ask-name".into(),
                        args: serde_json::json!({}),
                    }],
                },
                StreamEvent::Finish {
                    finish_reason: FinishReason::ClientToolCalls,
                },
            ],
            vec![
                StreamEvent::ToolOutputAvailable {
                    tool_call_id: "c1".into(),
                    output: serde_json::json!({"name": "Ada"}),
                },
                StreamEvent::Finish {
                    finish_reason: FinishReason::Stop,
                },
            ],
        ]);
        chat.mediator_insert_interactive("ask-name");

        chat.send("respond", None, None).await.unwrap();
        assert_eq!(chat.status(), ChatStatus::AwaitingInput);
        assert_eq!(chat.pending_client_tools().len(), 1);

        chat.submit_client_tool_result("c1", Some(serde_json::json!({"name": "Ada"})), None)
            .await
            .unwrap();

        assert_eq!(chat.status(), ChatStatus::Idle);
        match &chat.messages()[0].parts[0] {
            UIMessagePart::ToolCall { status, result, .. } => {
                assert_eq!(*status, ToolCallStatus::Done);
                assert_eq!(result.as_ref().unwrap()["name"], "Ada");
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_mid_stream_finalizes_text_and_is_idempotent() {
        let mut chat = chat_with(vec![vec![
            StreamEvent::TextStart {
                id: "t1".into(),
                response_type: None,
            },
            StreamEvent::TextDelta {
                id: "t1".into(),
                delta: "Hi".into(),
            },
        ]]);

        // Drive just the two buffered events, then stop as the host would
        // after a cooperative cancellation signal.
        chat.send("respond", None, None).await.unwrap();
        chat.stop().await;
        chat.stop().await;

        assert_eq!(chat.status(), ChatStatus::Idle);
        assert_eq!(chat.messages().len(), 1);
        match &chat.messages()[0].parts[0] {
            UIMessagePart::Text { text, status, .. } => {
                assert_eq!(text, "Hi");
                assert_eq!(*status, MessageStatus::Done);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_finalizes_and_sets_error_status() {
        let mut chat = chat_with(vec![vec![
            StreamEvent::TextStart {
                id: "t1".into(),
                response_type: None,
            },
            StreamEvent::TextDelta {
                id: "t1".into(),
                delta: "par".into(),
            },
            StreamEvent::Error {
                error: AgentError::new(
                    ErrorType::RateLimitError,
                    "slow down",
                    ErrorSource::Provider,
                )
                .with_retry_after(30),
            },
        ]]);

        chat.send("respond", None, None).await.unwrap();

        assert_eq!(chat.status(), ChatStatus::Error);
        let error = chat.error().unwrap();
        assert!(error.is_rate_limit_error());
        assert_eq!(error.retry_after, Some(30));
        match &chat.messages()[0].parts[0] {
            UIMessagePart::Text { text, status, .. } => {
                assert_eq!(text, "par");
                assert_eq!(*status, MessageStatus::Done);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    impl Chat {
        /// Test-only helper: registers an interactive handler directly,
        /// bypassing the builder, to keep the scripted-transport tests
        /// focused on the reducer rather than option plumbing.
        fn mediator_insert_interactive(&mut self, tool_name: &str) {
            self.mediator = ToolMediator::new(HashMap::from([(
                tool_name.to_string(),
                ClientToolHandler::Interactive,
            )]));
        }
    }
}
