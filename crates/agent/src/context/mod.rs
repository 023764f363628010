//! Request assembly: turning a turn configuration, the prior exchange, and
//! contributed context into one outbound [`ChatRequest`](switchyard_core::ChatRequest).

pub mod assembler;
pub mod token;

pub use assembler::{AssembledRequest, AssemblyStats, RequestAssembler};
