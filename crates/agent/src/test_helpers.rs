//! Shared test helpers for assembler, compaction, and orchestrator tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use switchyard_core::context::{ContextItem, ContextProvider, MemoryMessage, PromptContext};
use switchyard_core::error::ProviderError;
use switchyard_core::message::{Message, MessageToolCall};
use switchyard_core::provider::{ChatClient, ChatRequest, ChatResponse, InvocationContext, Usage};
use switchyard_core::tool::ToolCall;
use switchyard_history::Exchange;

/// A context provider with fixed answers.
#[derive(Default)]
pub struct StaticProvider {
    memories: Vec<MemoryMessage>,
    items: Vec<ContextItem>,
    polls: AtomicUsize,
}

impl StaticProvider {
    pub fn with_memories(mut self, memories: Vec<MemoryMessage>) -> Self {
        self.memories = memories;
        self
    }

    pub fn with_items(mut self, items: Vec<ContextItem>) -> Self {
        self.items = items;
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn memories(
        &self,
        _context: &PromptContext,
    ) -> Result<Vec<MemoryMessage>, ProviderError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.memories.clone())
    }

    async fn context_items(
        &self,
        _context: &PromptContext,
    ) -> Result<Vec<ContextItem>, ProviderError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.clone())
    }
}

/// A context provider whose backend is down.
pub struct FailingProvider;

#[async_trait]
impl ContextProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn memories(
        &self,
        _context: &PromptContext,
    ) -> Result<Vec<MemoryMessage>, ProviderError> {
        Err(ProviderError::Network("memory store unreachable".into()))
    }

    async fn context_items(
        &self,
        _context: &PromptContext,
    ) -> Result<Vec<ContextItem>, ProviderError> {
        Err(ProviderError::Network("memory store unreachable".into()))
    }
}

/// An unstored exchange with the given request messages and response.
pub fn exchange_with(messages: Vec<Message>, response: Option<ChatResponse>) -> Exchange {
    let now = Utc::now();
    Exchange {
        id: "prior".into(),
        session_id: "session-1".into(),
        request: ChatRequest {
            messages,
            ..Default::default()
        },
        response,
        created_at: now,
        updated_at: now,
        previous_message_id: None,
    }
}

/// One scripted step of a [`ScriptedClient`].
pub enum Step {
    /// Reply with text, reporting the given total token usage
    Text { text: String, total_tokens: Option<u64> },
    /// Ask for tool calls, then reply with text once results are in
    Tools { calls: Vec<MessageToolCall>, then: String },
    /// Start tool calls and stop streaming as soon as the turn is aborted
    ToolsUntilAbort { calls: Vec<MessageToolCall> },
    Fail(ProviderError),
}

impl Step {
    pub fn text(text: &str) -> Self {
        Step::Text {
            text: text.into(),
            total_tokens: Some(15),
        }
    }

    pub fn text_with_usage(text: &str, total_tokens: Option<u64>) -> Self {
        Step::Text {
            text: text.into(),
            total_tokens,
        }
    }
}

/// A chat client that plays back scripted steps in order.
///
/// Panics if more calls are made than steps provided.
pub struct ScriptedClient {
    steps: Mutex<Vec<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
    call_count: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(mut steps: Vec<Step>) -> Self {
        steps.reverse();
        Self {
            steps: Mutex::new(steps),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    fn model_id(&self) -> &str {
        "scripted:model"
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        context: &InvocationContext<'_>,
    ) -> Result<(String, ChatResponse), ProviderError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("ScriptedClient: no more steps (call #{n})"));

        if context.abort.is_cancelled() {
            return Err(ProviderError::Aborted);
        }

        match step {
            Step::Text { text, total_tokens } => {
                let mut response = ChatResponse::assistant(self.model_id(), text.clone());
                response.usage = total_tokens.map(|total| Usage {
                    input_tokens: total.saturating_sub(5),
                    output_tokens: total.min(5),
                    total_tokens: total,
                });
                Ok((text, response))
            }
            Step::Tools { calls, then } => {
                let executor = context
                    .tools
                    .ok_or_else(|| ProviderError::NotConfigured("no tools for this turn".into()))?;
                let results = executor.call_all(&to_tool_calls(&calls)).await;

                let mut asking = Message::assistant("");
                asking.tool_calls = calls.clone();
                let mut messages = vec![asking];
                for (call, result) in calls.iter().zip(results) {
                    messages.push(Message::tool_result(call.id.clone(), result));
                }
                messages.push(Message::assistant(then.clone()));

                let mut response = ChatResponse::assistant(self.model_id(), then.clone());
                response.messages = messages;
                response.usage = Some(Usage::new(10, 5));
                Ok((then, response))
            }
            Step::ToolsUntilAbort { calls } => {
                let executor = context
                    .tools
                    .ok_or_else(|| ProviderError::NotConfigured("no tools for this turn".into()))?;
                let tool_calls = to_tool_calls(&calls);
                tokio::select! {
                    _ = executor.call_all(&tool_calls) => {
                        let reason = "tools finished before the abort";
                        Err(ProviderError::StreamInterrupted(reason.into()))
                    }
                    _ = context.abort.cancelled() => Err(ProviderError::Aborted),
                }
            }
            Step::Fail(error) => Err(error),
        }
    }
}

fn to_tool_calls(calls: &[MessageToolCall]) -> Vec<ToolCall> {
    calls
        .iter()
        .map(|c| {
            ToolCall::new(
                c.id.clone(),
                c.name.clone(),
                serde_json::from_str(&c.arguments).unwrap_or_default(),
            )
        })
        .collect()
}
