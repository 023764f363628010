//! Context providers — collaborators that contribute to a turn's messages.
//!
//! A provider may produce long-term *memories* (role-tagged messages mixed
//! into a fresh conversation) and ambient *context items* (text spliced in
//! at a declared placement). Both are polled once per eligible turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, Role};

/// What the assembler knows about the turn being built.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Session of the prior exchange, if the turn continues one
    pub session_id: Option<String>,

    /// Identifier of the prior exchange, if any
    pub prior_exchange_id: Option<String>,

    /// Flattened text of the current input
    pub input: String,
}

/// A memory contributed by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMessage {
    pub role: Role,
    pub content: String,
}

impl MemoryMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn into_message(self) -> Message {
        Message::new(self.role, self.content)
    }
}

/// Where a context item is spliced into the message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    AfterSystemMessage,
    AfterPriorMessages,
    AfterCurrentMessage,
}

/// A piece of ambient context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    pub content: String,
    pub position: Placement,
}

impl ContextItem {
    pub fn new(content: impl Into<String>, position: Placement) -> Self {
        Self {
            content: content.into(),
            position,
        }
    }
}

/// A service that feeds memories and/or context items into turns.
///
/// Both methods default to contributing nothing, so a provider only
/// implements the capability it actually has.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// A short name for logging.
    fn name(&self) -> &str;

    async fn memories(
        &self,
        _context: &PromptContext,
    ) -> std::result::Result<Vec<MemoryMessage>, ProviderError> {
        Ok(Vec::new())
    }

    async fn context_items(
        &self,
        _context: &PromptContext,
    ) -> std::result::Result<Vec<ContextItem>, ProviderError> {
        Ok(Vec::new())
    }
}
