//! Conversation history for Switchyard.
//!
//! A conversation is a chain of [`Exchange`]s, each pointing back at the one
//! it continued. [`ConversationHistory`] tracks which exchange is current and
//! keeps superseded ones on an undo stack.

pub mod exchange;
pub mod history;
pub mod stack;
pub mod storage;

pub use exchange::Exchange;
pub use history::{ConversationHistory, HistorySnapshot};
pub use stack::HistoryStack;
pub use storage::{ExchangeStorage, InMemoryExchangeStorage};
