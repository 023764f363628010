//! Context compaction — folding a long conversation into a summary.
//!
//! After a turn whose token usage crosses the threshold, the orchestrator
//! asks a [`CompactionGate`] whether to compact (unless auto-compaction is
//! on) and then hands the current exchange to a [`Compactor`]. The summary
//! is stored as a new exchange and committed as current, so `undo` reverts
//! a compaction like any other turn.

use async_trait::async_trait;
use std::sync::Arc;
use switchyard_core::error::Result;
use switchyard_core::message::{Message, Role};
use switchyard_core::provider::{ChatClient, ChatRequest, ChatResponse, InvocationContext};
use switchyard_history::{ConversationHistory, Exchange};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fraction of the context window that triggers compaction.
pub const DEFAULT_THRESHOLD: f64 = 0.9;

const SUMMARY_INSTRUCTIONS: &str = "Summarize the conversation below so it can replace the full \
transcript. Keep facts, decisions, open questions, and anything the user asked to remember. \
Reply with the summary only.";

const SUMMARY_PREFIX: &str = "Summary of the conversation so far:";

const SUMMARY_ACK: &str = "Understood. I'll continue from this summary.";

/// Whether a turn's token usage calls for compaction.
pub fn needs_compaction(tokens_used: u64, context_length: u64, threshold: f64) -> bool {
    context_length > 0 && tokens_used as f64 > context_length as f64 * threshold
}

/// Asks whether compaction should run when auto-compaction is off.
#[async_trait]
pub trait CompactionGate: Send + Sync {
    async fn confirm(&self, tokens_used: u64, context_length: u64) -> bool;
}

/// Always says yes.
pub struct AlwaysCompact;

#[async_trait]
impl CompactionGate for AlwaysCompact {
    async fn confirm(&self, _tokens_used: u64, _context_length: u64) -> bool {
        true
    }
}

/// Always says no.
pub struct NeverCompact;

#[async_trait]
impl CompactionGate for NeverCompact {
    async fn confirm(&self, _tokens_used: u64, _context_length: u64) -> bool {
        false
    }
}

/// Produces and stores the exchange that replaces a conversation.
#[async_trait]
pub trait Compactor: Send + Sync {
    /// Compact the chain ending at `current`. Returns the stored summary
    /// exchange, not yet committed as current.
    async fn compact(
        &self,
        history: &ConversationHistory,
        current: &Arc<Exchange>,
        client: &dyn ChatClient,
        abort: &CancellationToken,
    ) -> Result<Arc<Exchange>>;
}

/// Summarizes with the same model that served the turn.
#[derive(Debug, Default)]
pub struct SummaryCompactor;

impl SummaryCompactor {
    fn render_transcript(chain: &[Arc<Exchange>]) -> String {
        let mut lines = Vec::new();
        for exchange in chain {
            for message in exchange.transcript() {
                if message.role == Role::System || message.content.trim().is_empty() {
                    continue;
                }
                lines.push(format!("{}: {}", message.role, message.content));
            }
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Compactor for SummaryCompactor {
    async fn compact(
        &self,
        history: &ConversationHistory,
        current: &Arc<Exchange>,
        client: &dyn ChatClient,
        abort: &CancellationToken,
    ) -> Result<Arc<Exchange>> {
        let chain = history.chain(current).await?;
        let transcript = Self::render_transcript(&chain);
        debug!(exchanges = chain.len(), chars = transcript.len(), "Summarizing conversation");

        let request = ChatRequest {
            messages: vec![Message::system(SUMMARY_INSTRUCTIONS), Message::user(transcript)],
            ..Default::default()
        };
        let context = InvocationContext::new(abort.clone())
            .with_session(Some(current.session_id.clone()));
        let (summary, _) = client.text_chat(&request, &context).await?;

        let summary_request = ChatRequest {
            messages: vec![Message::user(format!("{SUMMARY_PREFIX}\n{}", summary.trim()))],
            ..Default::default()
        };
        let ack = ChatResponse::assistant(client.model_id(), SUMMARY_ACK);
        let stored = history
            .store(Some(current.as_ref()), summary_request, Some(ack))
            .await?;

        info!(
            session_id = %stored.session_id,
            compacted = chain.len(),
            "Compacted conversation"
        );
        Ok(stored)
    }
}
