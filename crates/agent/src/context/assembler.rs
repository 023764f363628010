//! Request assembly — the ordered message list for one turn.
//!
//! Five sources feed the list, and the order they are applied in matters:
//!
//! 1. **System prompt**: always exactly one lead system message
//! 2. **Prior exchange** (continuation) *or* **memories** (fresh start)
//! 3. **Current input**
//! 4. **Context items**: spliced at their declared placement
//! 5. **Tools**: attached by sanitized name
//!
//! # Determinism
//!
//! Given the same turn, prior exchange, and provider answers, assembly
//! produces the same request. Providers are polled in construction order.

use serde::Serialize;
use std::sync::Arc;
use switchyard_core::context::{ContextItem, ContextProvider, Placement, PromptContext};
use switchyard_core::error::{Error, Result};
use switchyard_core::message::{Message, Role};
use switchyard_core::provider::ChatRequest;
use switchyard_history::Exchange;
use switchyard_tools::ToolDispatcher;
use tracing::{debug, warn};

use crate::context::token;
use crate::turn::TurnConfig;

/// Where the messages of an assembled request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyStats {
    pub prior_messages: usize,
    pub memories: usize,
    pub context_items: usize,
    /// Items skipped because an identical user message was already present
    pub context_items_deduplicated: usize,
    pub input_messages: usize,
    pub tools: usize,
    pub estimated_tokens: usize,
}

/// An assembled request plus assembly metadata.
#[derive(Debug, Clone)]
pub struct AssembledRequest {
    pub request: ChatRequest,
    pub stats: AssemblyStats,
}

/// Builds outbound requests from a fixed, injected set of context providers.
pub struct RequestAssembler {
    providers: Vec<Arc<dyn ContextProvider>>,
}

impl RequestAssembler {
    pub fn new(providers: Vec<Arc<dyn ContextProvider>>) -> Self {
        Self { providers }
    }

    /// An assembler with no context providers.
    pub fn without_providers() -> Self {
        Self::new(Vec::new())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Assemble the request for `turn`.
    ///
    /// # Algorithm
    ///
    /// 1. Reject empty input before touching anything else
    /// 2. Resolve the system prompt into the lead system message
    /// 3. With continuation and a prior exchange: append the prior request
    ///    minus its leading system message, then the prior response unless
    ///    it records a failed generation.
    ///    Otherwise poll memories: system-role ones go right after the lead
    ///    system message, the rest are appended
    /// 4. Append the current input
    /// 5. If enabled, poll context items and splice each at its placement;
    ///    the first two placements skip items already present as a user
    ///    message
    /// 6. Attach generation parameters and, if enabled, tool definitions
    pub async fn assemble(
        &self,
        turn: &TurnConfig,
        prior: Option<&Exchange>,
        tools: &ToolDispatcher,
    ) -> Result<AssembledRequest> {
        if turn.input.is_empty() {
            return Err(Error::validation("turn input must not be empty"));
        }

        let context = PromptContext {
            session_id: prior.map(|p| p.session_id.clone()),
            prior_exchange_id: prior.map(|p| p.id.clone()),
            input: turn.input.flatten(),
        };
        let mut stats = AssemblyStats::default();

        let mut messages = vec![turn.system_prompt.resolve(&context)];

        match prior.filter(|_| turn.include_prior_messages) {
            Some(prior) => {
                let prior_request = prior.request.messages.iter();
                let skip =
                    usize::from(prior.request.messages.first().is_some_and(Message::is_system));
                messages.extend(prior_request.skip(skip).cloned());
                if !prior.is_error() {
                    messages.extend(prior.response_messages().iter().cloned());
                }
                stats.prior_messages = messages.len() - 1;
            }
            None => {
                let mut system_slot = 1;
                for memory in self.collect_memories(&context).await {
                    stats.memories += 1;
                    if memory.role == Role::System {
                        messages.insert(system_slot, memory.into_message());
                        system_slot += 1;
                    } else {
                        messages.push(memory.into_message());
                    }
                }
            }
        }

        // Everything before this index precedes the current input
        let mut input_start = messages.len();
        let input = turn.input.clone().into_messages();
        stats.input_messages = input.len();
        messages.extend(input);

        if turn.include_context_items {
            let mut after_system = 1;
            for item in self.collect_context_items(&context).await {
                let duplicate = item.position != Placement::AfterCurrentMessage
                    && messages
                        .iter()
                        .any(|m| m.role == Role::User && m.content == item.content);
                if duplicate {
                    debug!(
                        position = ?item.position,
                        "Skipping context item already in conversation"
                    );
                    stats.context_items_deduplicated += 1;
                    continue;
                }

                let message = Message::user(item.content);
                match item.position {
                    Placement::AfterSystemMessage => {
                        messages.insert(after_system, message);
                        after_system += 1;
                        input_start += 1;
                    }
                    Placement::AfterPriorMessages => {
                        messages.insert(input_start, message);
                        input_start += 1;
                    }
                    Placement::AfterCurrentMessage => messages.push(message),
                }
                stats.context_items += 1;
            }
        }

        let mut request = ChatRequest {
            messages,
            params: turn.params.clone(),
            ..Default::default()
        };

        if turn.include_tools {
            request.tools = tools.definitions();
            stats.tools = request.tools.len();
        }

        stats.estimated_tokens = token::estimate_request_tokens(&request);
        debug!(
            messages = request.messages.len(),
            prior = stats.prior_messages,
            memories = stats.memories,
            context_items = stats.context_items,
            tools = stats.tools,
            estimated_tokens = stats.estimated_tokens,
            "Assembled request"
        );

        Ok(AssembledRequest { request, stats })
    }

    async fn collect_memories(
        &self,
        context: &PromptContext,
    ) -> Vec<switchyard_core::context::MemoryMessage> {
        let mut memories = Vec::new();
        for provider in &self.providers {
            match provider.memories(context).await {
                Ok(found) => {
                    if !found.is_empty() {
                        debug!(
                            provider = provider.name(),
                            count = found.len(),
                            "Recalled memories"
                        );
                    }
                    memories.extend(found);
                }
                Err(e) => warn!(provider = provider.name(), "Memory recall failed: {e}"),
            }
        }
        memories
    }

    async fn collect_context_items(&self, context: &PromptContext) -> Vec<ContextItem> {
        let mut items = Vec::new();
        for provider in &self.providers {
            match provider.context_items(context).await {
                Ok(found) => items.extend(found),
                Err(e) => warn!(provider = provider.name(), "Context item lookup failed: {e}"),
            }
        }
        items
    }
}
