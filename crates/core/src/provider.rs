//! Model client traits — the boundary to the model-invocation SDK.
//!
//! A client knows how to send an assembled [`ChatRequest`] to a concrete
//! model and return a normalized [`ChatResponse`]. Provider adapters
//! (authentication, base URLs, wire formats) live outside this workspace;
//! everything here only sees these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::{Message, Role};
use crate::tool::{ToolDefinition, ToolExecutor};

/// Sampling and loop parameters attached to every assembled request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    /// Step budget for the client's tool-call loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
}

/// One fully assembled outbound request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Ordered, role-tagged messages
    pub messages: Vec<Message>,

    /// Sanitized tool name → tool definition
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, ToolDefinition>,

    #[serde(flatten)]
    pub params: GenerationParams,
}

impl ChatRequest {
    /// Number of system messages in the request.
    pub fn system_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_system()).count()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A normalized response from any chat client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Messages produced by the model (assistant turns, tool turns)
    pub messages: Vec<Message>,

    /// Token usage statistics, if the client reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Set when the response records a failed generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// A response consisting of a single assistant message.
    pub fn assistant(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(text)],
            usage: None,
            model: model.into(),
            timestamp: Utc::now(),
            finish_reason: Some("stop".into()),
            error: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Concatenated text of every assistant message.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a client needs besides the request itself.
pub struct InvocationContext<'a> {
    /// Fired by the owning session; only the model stream observes it
    pub abort: CancellationToken,

    /// Tool executor for this turn, when tools were included
    pub tools: Option<&'a dyn ToolExecutor>,

    /// Session the turn belongs to, if one exists yet
    pub session_id: Option<String>,
}

impl<'a> InvocationContext<'a> {
    pub fn new(abort: CancellationToken) -> Self {
        Self {
            abort,
            tools: None,
            session_id: None,
        }
    }

    pub fn with_tools(mut self, tools: &'a dyn ToolExecutor) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// The chat model-invocation interface.
///
/// Every chat backend implements this trait. The orchestrator calls
/// `stream_chat()` without knowing which provider sits behind it.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// The concrete model identifier (e.g. "openai:gpt-4.1-mini").
    fn model_id(&self) -> &str;

    /// Stream a chat completion; returns the full text and the response.
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        context: &InvocationContext<'_>,
    ) -> std::result::Result<(String, ChatResponse), ProviderError>;

    /// Non-streaming chat. Defaults to `stream_chat`.
    async fn text_chat(
        &self,
        request: &ChatRequest,
        context: &InvocationContext<'_>,
    ) -> std::result::Result<(String, ChatResponse), ProviderError> {
        self.stream_chat(request, context).await
    }

    /// Generate a structured object matching `schema`.
    ///
    /// Default implementation returns an error indicating it isn't supported.
    async fn generate_object(
        &self,
        _request: &ChatRequest,
        _schema: &serde_json::Value,
        _context: &InvocationContext<'_>,
    ) -> std::result::Result<(serde_json::Value, ChatResponse), ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Model '{}' does not support structured output",
            self.model_id()
        )))
    }
}

/// Embedding model interface.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    fn model_id(&self) -> &str;

    /// Embed each input text, one vector per input.
    async fn embed(&self, inputs: &[String]) -> std::result::Result<Vec<Vec<f32>>, ProviderError>;
}

/// A generated image, either inline bytes (base64) or a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub media_type: String,
    pub data: String,
}

/// Image generation model interface.
#[async_trait]
pub trait ImageClient: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate_image(
        &self,
        prompt: &str,
        size: Option<&str>,
    ) -> std::result::Result<Vec<GeneratedImage>, ProviderError>;
}

/// Availability probes for a registered model.
///
/// Both probes may be slow (network round trips, local process checks).
/// Callers treat an `Err` the same as `Ok(false)`.
#[async_trait]
pub trait ModelProbe: Send + Sync {
    /// Can this model be invoked at all right now?
    async fn is_available(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }

    /// Is the model already loaded, without a cold-start delay?
    async fn is_hot(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// A probe for hosted models that are always reachable and warm.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAvailable;

impl ModelProbe for AlwaysAvailable {}
