//! ToolDispatcher — one turn's tool set and its execution policy.
//!
//! A dispatcher is built per turn and handed to the client alongside the
//! request. It owns the serialization gate for that turn, so two turns
//! never share ordering state.
//!
//! Every call runs on its own task. A client that stops waiting (an aborted
//! stream drops the `call` future) detaches the task rather than cancelling
//! it, so a tool never stops halfway through a side effect.

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use regex_lite::Regex;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use switchyard_core::error::ToolError;
use switchyard_core::event::{DomainEvent, EventBus};
use switchyard_core::tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolExecutor};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// How a batch of tool calls is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionPolicy {
    /// One call at a time, in request order
    #[default]
    Serial,
    /// All calls at once; no ordering between them
    Parallel,
}

impl ExecutionPolicy {
    pub fn from_parallel_flag(parallel: bool) -> Self {
        if parallel {
            ExecutionPolicy::Parallel
        } else {
            ExecutionPolicy::Serial
        }
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("tool name regex is valid"))
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_tool_name(name: &str) -> String {
    unsafe_chars().replace_all(name, "_").into_owned()
}

pub struct ToolDispatcher {
    /// Sanitized name → tool
    tools: BTreeMap<String, Arc<dyn Tool>>,
    policy: ExecutionPolicy,
    /// Single-permit FIFO gate used under the serial policy
    gate: Arc<Mutex<()>>,
    session_id: Option<String>,
    events: Option<Arc<EventBus>>,
}

impl ToolDispatcher {
    /// Build a dispatcher. When two tools sanitize to the same name the
    /// later one wins.
    pub fn new(tools: impl IntoIterator<Item = Arc<dyn Tool>>, policy: ExecutionPolicy) -> Self {
        let mut by_name = BTreeMap::new();
        for tool in tools {
            let sanitized = sanitize_tool_name(tool.name());
            if by_name.insert(sanitized.clone(), tool).is_some() {
                debug!(tool = %sanitized, "Tool name collision, keeping the later tool");
            }
        }

        Self {
            tools: by_name,
            policy,
            gate: Arc::new(Mutex::new(())),
            session_id: None,
            events: None,
        }
    }

    /// A dispatcher with no tools.
    pub fn empty() -> Self {
        Self::new(Vec::new(), ExecutionPolicy::default())
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Sanitized name → definition, as attached to the outbound request.
    pub fn definitions(&self) -> BTreeMap<String, ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, tool)| {
                let mut definition = tool.to_definition();
                definition.name = name.clone();
                (name.clone(), definition)
            })
            .collect()
    }

    /// Run `call` on a spawned task and wait for its text.
    ///
    /// `permit`, when given, is held until the task finishes, even if the
    /// caller has stopped waiting.
    async fn execute(&self, call: &ToolCall, permit: Option<OwnedMutexGuard<()>>) -> String {
        let name = sanitize_tool_name(&call.name);
        let tool = self.tools.get(&name).cloned();
        let context = ToolContext {
            session_id: self.session_id.clone(),
            call_id: call.id.clone(),
        };
        let events = self.events.clone();
        let owned_call = call.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            run_call(tool, name, owned_call, context, events).await
        });

        match handle.await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    error = %e,
                    "Tool task did not finish"
                );
                format!("Error calling tool {}: {e}", call.name)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

/// Execute one call, turning errors and panics into the text the model sees.
async fn run_call(
    tool: Option<Arc<dyn Tool>>,
    name: String,
    call: ToolCall,
    context: ToolContext,
    events: Option<Arc<EventBus>>,
) -> String {
    let start = Instant::now();

    let result = match tool {
        Some(tool) => {
            match AssertUnwindSafe(tool.execute(call.arguments.clone(), &context))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => Err(ToolError::ExecutionFailed {
                    tool_name: call.name.clone(),
                    reason: format!("panicked: {}", panic_message(panic.as_ref())),
                }),
            }
        }
        None => Err(ToolError::NotFound(call.name.clone())),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let success = result.is_ok();
    let output = match result {
        Ok(output) => {
            info!(tool = %name, call_id = %call.id, duration_ms, "Tool executed");
            output.into_text()
        }
        Err(e) => {
            warn!(tool = %name, call_id = %call.id, error = %e, "Tool call failed");
            format!("Error calling tool {}: {e}", call.name)
        }
    };

    if let Some(events) = events {
        events.publish(DomainEvent::ToolExecuted {
            tool_name: name,
            success,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    output
}

#[async_trait]
impl ToolExecutor for ToolDispatcher {
    async fn call(&self, call: &ToolCall) -> String {
        match self.policy {
            ExecutionPolicy::Serial => {
                let permit = self.gate.clone().lock_owned().await;
                self.execute(call, Some(permit)).await
            }
            ExecutionPolicy::Parallel => self.execute(call, None).await,
        }
    }

    async fn call_all(&self, calls: &[ToolCall]) -> Vec<String> {
        match self.policy {
            ExecutionPolicy::Serial => {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(self.call(call).await);
                }
                results
            }
            ExecutionPolicy::Parallel => join_all(calls.iter().map(|call| self.call(call))).await,
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}
