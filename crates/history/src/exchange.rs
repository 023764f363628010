//! One request/response pair in a conversation chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchyard_core::message::Message;
use switchyard_core::provider::{ChatRequest, ChatResponse};

/// A stored exchange. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: String,

    pub session_id: String,

    /// The request exactly as it was sent
    pub request: ChatRequest,

    /// Absent when nothing came back
    #[serde(default)]
    pub response: Option<ChatResponse>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// The exchange this one continued, if any
    #[serde(default)]
    pub previous_message_id: Option<String>,
}

impl Exchange {
    /// Messages produced by the model, or none if there was no response.
    pub fn response_messages(&self) -> &[Message] {
        self.response
            .as_ref()
            .map_or(&[], |r| r.messages.as_slice())
    }

    /// Whether the stored response records a failed generation.
    pub fn is_error(&self) -> bool {
        self.response.as_ref().is_some_and(ChatResponse::is_error)
    }

    /// The request's messages followed by the response's messages.
    pub fn transcript(&self) -> Vec<Message> {
        self.request
            .messages
            .iter()
            .chain(self.response_messages())
            .cloned()
            .collect()
    }
}
