//! In-process clients.
//!
//! [`MockChatClient`] answers without any network traffic, which makes the
//! whole turn pipeline runnable offline. [`UnlinkedClient`] stands in for
//! catalog models whose provider adapter isn't linked into this build: it
//! reports itself unavailable so resolution skips it.

use async_trait::async_trait;
use switchyard_core::error::ProviderError;
use switchyard_core::message::{Message, Role};
use switchyard_core::provider::{
    ChatClient, ChatRequest, ChatResponse, EmbeddingClient, GeneratedImage, ImageClient,
    InvocationContext, ModelProbe, Usage,
};

/// Rough chars-per-token ratio for reported usage.
const CHARS_PER_TOKEN: usize = 4;

/// A chat client that echoes the latest user message back.
#[derive(Debug, Clone)]
pub struct MockChatClient {
    model_id: String,
    prefix: Option<String>,
}

impl MockChatClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prefix: None,
        }
    }

    /// Prepend `prefix` to every reply.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn reply_for(&self, request: &ChatRequest) -> String {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        match &self.prefix {
            Some(prefix) => format!("{prefix}{last_user}"),
            None => last_user.to_string(),
        }
    }
}

fn estimate_tokens(messages: &[Message]) -> u64 {
    let chars: usize = messages.iter().map(|m| m.content.len()).sum();
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

#[async_trait]
impl ChatClient for MockChatClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        context: &InvocationContext<'_>,
    ) -> Result<(String, ChatResponse), ProviderError> {
        if context.abort.is_cancelled() {
            return Err(ProviderError::Aborted);
        }

        let text = self.reply_for(request);
        let usage = Usage::new(
            estimate_tokens(&request.messages),
            text.len().div_ceil(CHARS_PER_TOKEN) as u64,
        );
        let response = ChatResponse::assistant(&self.model_id, text.clone()).with_usage(usage);
        Ok((text, response))
    }
}

impl ModelProbe for MockChatClient {}

/// Placeholder for a catalog model with no linked adapter.
#[derive(Debug, Clone)]
pub struct UnlinkedClient {
    model_id: String,
    provider: String,
}

impl UnlinkedClient {
    pub fn new(model_id: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.into(),
        }
    }

    fn not_configured(&self) -> ProviderError {
        ProviderError::NotConfigured(format!(
            "no adapter for provider '{}' (model '{}')",
            self.provider, self.model_id
        ))
    }
}

#[async_trait]
impl ModelProbe for UnlinkedClient {
    async fn is_available(&self) -> Result<bool, ProviderError> {
        Ok(false)
    }

    async fn is_hot(&self) -> Result<bool, ProviderError> {
        Ok(false)
    }
}

#[async_trait]
impl ChatClient for UnlinkedClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream_chat(
        &self,
        _request: &ChatRequest,
        _context: &InvocationContext<'_>,
    ) -> Result<(String, ChatResponse), ProviderError> {
        Err(self.not_configured())
    }
}

#[async_trait]
impl EmbeddingClient for UnlinkedClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(self.not_configured())
    }
}

#[async_trait]
impl ImageClient for UnlinkedClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_image(
        &self,
        _prompt: &str,
        _size: Option<&str>,
    ) -> Result<Vec<GeneratedImage>, ProviderError> {
        Err(self.not_configured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    fn request(messages: Vec<Message>) -> ChatRequest {
        ChatRequest {
            messages,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn echoes_latest_user_message() {
        let client = MockChatClient::new("mock:echo");
        let ctx = InvocationContext::new(CancellationToken::new());
        let req = request(vec![
            Message::system("be brief"),
            Message::user("first"),
            Message::assistant("first"),
            Message::user("second"),
        ]);

        let (text, response) = client.stream_chat(&req, &ctx).await.unwrap();
        assert_eq!(text, "second");
        assert_eq!(response.model, "mock:echo");
        assert!(response.usage.unwrap().input_tokens > 0);
    }

    #[tokio::test]
    async fn prefix_is_prepended() {
        let client = MockChatClient::new("mock:echo").with_prefix("Echo: ");
        let ctx = InvocationContext::new(CancellationToken::new());
        let (text, _) = client
            .stream_chat(&request(vec![Message::user("hi")]), &ctx)
            .await
            .unwrap();
        assert_eq!(text, "Echo: hi");
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let client = MockChatClient::new("mock:echo");
        let token = CancellationToken::new();
        token.cancel();
        let ctx = InvocationContext::new(token);
        let err = client
            .stream_chat(&request(vec![Message::user("hi")]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Aborted));
    }

    #[tokio::test]
    async fn unlinked_client_is_unavailable() {
        let client = UnlinkedClient::new("openai:gpt-4.1", "openai");
        assert!(!client.is_available().await.unwrap());

        let ctx = InvocationContext::new(CancellationToken::new());
        let err = client.stream_chat(&ChatRequest::default(), &ctx).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
