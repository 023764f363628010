//! Per-turn configuration.

use serde::Deserialize;
use std::sync::Arc;
use switchyard_config::ChatConfig;
use switchyard_core::context::PromptContext;
use switchyard_core::message::{Message, Role};
use switchyard_core::provider::GenerationParams;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// What the user sent this turn.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TurnInput {
    /// Becomes a single user message
    Text(String),
    /// Used verbatim
    Messages(Vec<Message>),
}

impl TurnInput {
    pub fn is_empty(&self) -> bool {
        match self {
            TurnInput::Text(text) => text.trim().is_empty(),
            TurnInput::Messages(messages) => messages.iter().all(|m| m.content.trim().is_empty()),
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        match self {
            TurnInput::Text(text) => vec![Message::user(text)],
            TurnInput::Messages(messages) => messages,
        }
    }

    /// The input as plain text, for context providers.
    pub fn flatten(&self) -> String {
        match self {
            TurnInput::Text(text) => text.clone(),
            TurnInput::Messages(messages) => messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for TurnInput {
    fn from(text: &str) -> Self {
        TurnInput::Text(text.to_string())
    }
}

impl From<String> for TurnInput {
    fn from(text: String) -> Self {
        TurnInput::Text(text)
    }
}

impl From<Vec<Message>> for TurnInput {
    fn from(messages: Vec<Message>) -> Self {
        TurnInput::Messages(messages)
    }
}

pub type DynamicPrompt = Arc<dyn Fn(&PromptContext) -> String + Send + Sync>;

/// Where the turn's system message comes from.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Message(Message),
    /// Computed from the session context at assembly time
    #[serde(skip)]
    Dynamic(DynamicPrompt),
}

impl SystemPrompt {
    pub fn dynamic(f: impl Fn(&PromptContext) -> String + Send + Sync + 'static) -> Self {
        SystemPrompt::Dynamic(Arc::new(f))
    }

    /// Render into exactly one system message.
    pub fn resolve(&self, context: &PromptContext) -> Message {
        match self {
            SystemPrompt::Text(text) => Message::system(text.clone()),
            SystemPrompt::Message(message) => Message {
                role: Role::System,
                ..message.clone()
            },
            SystemPrompt::Dynamic(f) => Message::system(f(context)),
        }
    }
}

impl Default for SystemPrompt {
    fn default() -> Self {
        SystemPrompt::Text(DEFAULT_SYSTEM_PROMPT.into())
    }
}

impl std::fmt::Debug for SystemPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemPrompt::Text(text) => f.debug_tuple("Text").field(text).finish(),
            SystemPrompt::Message(message) => f.debug_tuple("Message").field(message).finish(),
            SystemPrompt::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Everything that shapes one turn's request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnConfig {
    pub input: TurnInput,

    #[serde(default)]
    pub system_prompt: SystemPrompt,

    /// Continue from the current exchange's messages
    #[serde(default = "default_true")]
    pub include_prior_messages: bool,

    #[serde(default = "default_true")]
    pub include_context_items: bool,

    #[serde(default = "default_true")]
    pub include_tools: bool,

    /// Run tool calls concurrently instead of one at a time
    #[serde(default)]
    pub parallel_tools: bool,

    #[serde(flatten)]
    pub params: GenerationParams,
}

impl TurnConfig {
    pub fn new(input: impl Into<TurnInput>) -> Self {
        Self {
            input: input.into(),
            system_prompt: SystemPrompt::default(),
            include_prior_messages: true,
            include_context_items: true,
            include_tools: true,
            parallel_tools: false,
            params: GenerationParams::default(),
        }
    }

    /// A turn using the configured chat defaults.
    pub fn from_chat_config(chat: &ChatConfig, input: impl Into<TurnInput>) -> Self {
        Self {
            input: input.into(),
            system_prompt: SystemPrompt::Text(chat.system_prompt.clone()),
            include_prior_messages: chat.include_prior_messages,
            include_context_items: chat.include_context_items,
            include_tools: chat.include_tools,
            parallel_tools: chat.parallel_tools,
            params: GenerationParams {
                temperature: chat.temperature,
                top_p: chat.top_p,
                top_k: chat.top_k,
                stop_sequences: chat.stop_sequences.clone(),
                presence_penalty: chat.presence_penalty,
                frequency_penalty: chat.frequency_penalty,
                max_steps: Some(chat.max_steps),
            },
        }
    }

    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_prior_messages(mut self, include: bool) -> Self {
        self.include_prior_messages = include;
        self
    }

    pub fn with_context_items(mut self, include: bool) -> Self {
        self.include_context_items = include;
        self
    }

    pub fn with_tools(mut self, include: bool) -> Self {
        self.include_tools = include;
        self
    }

    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }
}
