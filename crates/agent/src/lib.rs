//! The turn loop for Switchyard.
//!
//! A turn follows a fixed path:
//!
//! 1. **Resolve** a model from the requirement via the registry
//! 2. **Assemble** the request (system prompt, prior exchange or memories,
//!    input, context items, tools)
//! 3. **Invoke** the client with a per-turn tool dispatcher
//! 4. **Commit** the exchange to the conversation history
//! 5. **Compact** if the context window is nearly full
//!
//! Any failure before the commit leaves the history as it was.

pub mod compaction;
pub mod context;
pub mod orchestrator;
pub mod turn;

#[cfg(test)]
mod test_helpers;

pub use compaction::{AlwaysCompact, CompactionGate, Compactor, NeverCompact, SummaryCompactor};
pub use context::{AssembledRequest, AssemblyStats, RequestAssembler};
pub use orchestrator::{CompactionSettings, TurnOrchestrator, TurnOutcome, TurnRequest, TurnState};
pub use turn::{SystemPrompt, TurnConfig, TurnInput};
