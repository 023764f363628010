//! # Switchyard Core
//!
//! Domain types, traits, and error definitions for the Switchyard model
//! router. This crate has **no framework dependencies**: it defines the
//! domain model that the registry, history, tools, and agent crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator boundary is a trait here:
//! - [`ChatClient`] and friends are the model-invocation SDK surface
//! - [`ModelProbe`] answers "is this model reachable / warm right now?"
//! - [`Tool`] is a side-effecting capability the model can call
//! - [`ContextProvider`] contributes memories and context items to a turn
//!
//! Implementations live in their respective crates (or outside the
//! workspace entirely), which keeps tests free to use mocks everywhere.

pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{ContextItem, ContextProvider, MemoryMessage, Placement, PromptContext};
pub use error::{Error, ProviderError, ResolutionError, Result, StorageError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    AlwaysAvailable, ChatClient, ChatRequest, ChatResponse, EmbeddingClient, GeneratedImage,
    GenerationParams, ImageClient, InvocationContext, ModelProbe, Usage,
};
pub use tool::{Tool, ToolCall, ToolContext, ToolDefinition, ToolExecutor, ToolOutput};
