//! TurnOrchestrator — one user-to-model round trip.
//!
//! ```text
//! Idle → ResolvingModel → AwaitingResponse → Committing → Idle
//!             │                  │               │
//!             └──────► Failed ◄──┘◄──────────────┘     Committing → Compacting → Idle
//! ```
//!
//! A failed turn is invisible afterwards: the history is restored to the
//! snapshot taken before the turn, and nothing becomes current.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use switchyard_core::error::{Error, Result};
use switchyard_core::event::{DomainEvent, EventBus};
use switchyard_core::provider::{ChatClient, ChatResponse, InvocationContext, Usage};
use switchyard_core::tool::Tool;
use switchyard_history::{ConversationHistory, Exchange, HistorySnapshot};
use switchyard_providers::{ModelQuery, ModelRegistry, RankedModel};
use switchyard_tools::{ExecutionPolicy, ToolDispatcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compaction::{
    CompactionGate, Compactor, DEFAULT_THRESHOLD, NeverCompact, SummaryCompactor, needs_compaction,
};
use crate::context::assembler::{AssemblyStats, RequestAssembler};
use crate::context::token;
use crate::turn::TurnConfig;

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    ResolvingModel,
    AwaitingResponse,
    Committing,
    Compacting,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::ResolvingModel => "resolving_model",
            TurnState::AwaitingResponse => "awaiting_response",
            TurnState::Committing => "committing",
            TurnState::Compacting => "compacting",
            TurnState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compaction policy for a session.
#[derive(Debug, Clone, Copy)]
pub struct CompactionSettings {
    /// Compact without asking the gate
    pub auto_compact: bool,
    /// Fraction of the context window that triggers compaction
    pub threshold: f64,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            auto_compact: false,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// One turn's inputs.
pub struct TurnRequest {
    /// Model requirement (name or `provider:conditions`)
    pub model: ModelQuery,
    pub config: TurnConfig,
    /// Tools active for this turn
    pub tools: Vec<Arc<dyn Tool>>,
    /// Fired by the session to abort the model stream
    pub abort: CancellationToken,
}

impl TurnRequest {
    pub fn new(model: impl Into<ModelQuery>, config: TurnConfig) -> Self {
        Self {
            model: model.into(),
            config,
            tools: Vec::new(),
            abort: CancellationToken::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_abort(mut self, abort: CancellationToken) -> Self {
        self.abort = abort;
        self
    }
}

/// What a successful turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_id: String,
    /// The committed exchange for this turn
    pub exchange: Arc<Exchange>,
    /// Text returned by the model
    pub text: String,
    /// Registered name of the model that answered
    pub model_name: String,
    /// Reported usage, or an estimate when the client reported none
    pub usage: Usage,
    pub stats: AssemblyStats,
    /// The summary exchange, when compaction ran
    pub compacted: Option<Arc<Exchange>>,
}

impl TurnOutcome {
    /// The response stored with this turn.
    pub fn response(&self) -> Option<&ChatResponse> {
        self.exchange.response.as_ref()
    }
}

pub struct TurnOrchestrator {
    registry: Arc<ModelRegistry<dyn ChatClient>>,
    history: Arc<ConversationHistory>,
    assembler: RequestAssembler,
    compactor: Arc<dyn Compactor>,
    gate: Arc<dyn CompactionGate>,
    compaction: CompactionSettings,
    events: Arc<EventBus>,
    state: Mutex<TurnState>,
}

impl TurnOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry<dyn ChatClient>>,
        history: Arc<ConversationHistory>,
        assembler: RequestAssembler,
    ) -> Self {
        Self {
            registry,
            history,
            assembler,
            compactor: Arc::new(SummaryCompactor),
            gate: Arc::new(NeverCompact),
            compaction: CompactionSettings::default(),
            events: Arc::new(EventBus::default()),
            state: Mutex::new(TurnState::Idle),
        }
    }

    pub fn with_compaction(mut self, settings: CompactionSettings) -> Self {
        self.compaction = settings;
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn CompactionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_compactor(mut self, compactor: Arc<dyn Compactor>) -> Self {
        self.compactor = compactor;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn history(&self) -> &Arc<ConversationHistory> {
        &self.history
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn state(&self) -> TurnState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, turn_id: &str, next: TurnState) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, next)
        };
        debug!(turn_id, from = %previous, to = %next, "Turn state changed");
        self.events.publish(DomainEvent::TurnStateChanged {
            turn_id: turn_id.to_string(),
            state: next.as_str().to_string(),
            timestamp: Utc::now(),
        });
    }

    fn fail(&self, turn_id: &str, snapshot: Option<HistorySnapshot>, error: Error) -> Error {
        if let Some(snapshot) = snapshot {
            self.history.restore(snapshot);
        }
        warn!(turn_id, error = %error, "Turn failed");
        self.events.publish(DomainEvent::ErrorOccurred {
            context: format!("turn {turn_id}"),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
        self.transition(turn_id, TurnState::Failed);
        error
    }

    /// Run one turn end to end.
    ///
    /// Validation happens before any state change. Resolution failures
    /// leave the history untouched; invocation and storage failures
    /// restore the pre-turn snapshot before the error is returned.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome> {
        let TurnRequest {
            model,
            config,
            tools,
            abort,
        } = request;

        if model.to_string().trim().is_empty()
            || matches!(&model, ModelQuery::Structured(m) if m.is_empty())
        {
            return Err(Error::validation("model requirement must not be empty"));
        }
        if config.input.is_empty() {
            return Err(Error::validation("turn input must not be empty"));
        }

        let turn_id = Uuid::new_v4().to_string();
        info!(turn_id = %turn_id, model = %model, "Starting turn");

        // ── Resolve ──
        self.transition(&turn_id, TurnState::ResolvingModel);
        let selected = match self.registry.resolve_first_online(model).await {
            Ok(selected) => selected,
            Err(e) => return Err(self.fail(&turn_id, None, e)),
        };
        self.events.publish(DomainEvent::ModelResolved {
            turn_id: turn_id.clone(),
            name: selected.name.clone(),
            model_id: selected.entry.client.model_id().to_string(),
            timestamp: Utc::now(),
        });

        let snapshot = self.history.snapshot();
        let prior = self.history.current();
        let session_id = prior.as_ref().map(|p| p.session_id.clone());

        let dispatcher =
            ToolDispatcher::new(tools, ExecutionPolicy::from_parallel_flag(config.parallel_tools))
            .with_session(session_id.clone())
            .with_events(self.events.clone());

        let assembled = match self
            .assembler
            .assemble(&config, prior.as_deref(), &dispatcher)
            .await
        {
            Ok(assembled) => assembled,
            Err(e) => return Err(self.fail(&turn_id, Some(snapshot), e)),
        };

        // ── Invoke ──
        self.transition(&turn_id, TurnState::AwaitingResponse);
        let client = selected.client();
        let mut context = InvocationContext::new(abort.clone()).with_session(session_id);
        if config.include_tools && !dispatcher.is_empty() {
            context = context.with_tools(&dispatcher);
        }

        let (text, response) = match client.stream_chat(&assembled.request, &context).await {
            Ok(result) => result,
            Err(e) => return Err(self.fail(&turn_id, Some(snapshot), e.into())),
        };

        // ── Commit ──
        self.transition(&turn_id, TurnState::Committing);
        let usage = response.usage.unwrap_or_else(|| {
            let input = token::estimate_request_tokens(&assembled.request) as u64;
            let output = token::estimate_messages_tokens(&response.messages) as u64;
            Usage::new(input, output)
        });

        let exchange = match self
            .history
            .store(prior.as_deref(), assembled.request, Some(response))
            .await
        {
            Ok(exchange) => exchange,
            Err(e) => return Err(self.fail(&turn_id, Some(snapshot), e)),
        };
        self.history.set_current(Some(exchange.clone()));

        self.events.publish(DomainEvent::ResponseGenerated {
            session_id: exchange.session_id.clone(),
            model: selected.name.clone(),
            tokens_used: usage.total_tokens,
            timestamp: Utc::now(),
        });

        let compacted = self
            .maybe_compact(&turn_id, &selected, &exchange, usage.total_tokens, &abort)
            .await;

        self.transition(&turn_id, TurnState::Idle);
        info!(
            turn_id = %turn_id,
            model = %selected.name,
            tokens = usage.total_tokens,
            compacted = compacted.is_some(),
            "Turn complete"
        );

        Ok(TurnOutcome {
            turn_id,
            exchange,
            text,
            model_name: selected.name,
            usage,
            stats: assembled.stats,
            compacted,
        })
    }

    /// Compact when usage crossed the threshold and the policy allows it.
    ///
    /// The turn itself is already committed, so a failed compaction is
    /// logged and the turn still succeeds.
    async fn maybe_compact(
        &self,
        turn_id: &str,
        selected: &RankedModel<dyn ChatClient>,
        exchange: &Arc<Exchange>,
        tokens_used: u64,
        abort: &CancellationToken,
    ) -> Option<Arc<Exchange>> {
        let context_length = selected.context_length()?;
        if !needs_compaction(tokens_used, context_length, self.compaction.threshold) {
            return None;
        }

        info!(turn_id, tokens_used, context_length, "Context window nearly full");
        let proceed =
            self.compaction.auto_compact || self.gate.confirm(tokens_used, context_length).await;
        if !proceed {
            debug!(turn_id, "Compaction declined");
            return None;
        }

        self.transition(turn_id, TurnState::Compacting);
        let client = selected.client();
        match self
            .compactor
            .compact(&self.history, exchange, client.as_ref(), abort)
            .await
        {
            Ok(summary) => {
                self.history.set_current(Some(summary.clone()));
                self.events.publish(DomainEvent::ContextCompacted {
                    session_id: summary.session_id.clone(),
                    tokens_before: tokens_used,
                    timestamp: Utc::now(),
                });
                Some(summary)
            }
            Err(e) => {
                warn!(turn_id, error = %e, "Compaction failed, keeping full history");
                None
            }
        }
    }
}
