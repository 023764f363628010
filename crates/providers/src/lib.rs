//! Model registry for Switchyard.
//!
//! Providers register concrete model entries under logical names; turns ask
//! for a model by *requirements* (`"openai:contextLength>=100000"`) and the
//! registry answers with the matching entries ranked by estimated price.
//!
//! - [`entry`] — the immutable per-model record
//! - [`query`] — the requirement grammar and its comparison semantics
//! - [`ranking`] — price estimation used to order matches
//! - [`registry`] — registration, resolution, and online selection
//! - [`catalog`] — registering the declarative catalog from config
//! - [`mock`] — in-process clients for dry runs and tests

pub mod catalog;
pub mod entry;
pub mod mock;
pub mod query;
pub mod ranking;
pub mod registry;

pub use catalog::register_catalog;
pub use entry::{ModelCategory, ModelEntry, ModelSpec};
pub use mock::{MockChatClient, UnlinkedClient};
pub use query::{CompareOp, Condition, ModelQuery, Requirements};
pub use ranking::{FALLBACK_COST_PER_MILLION, estimate_price};
pub use registry::{ModelRegistries, ModelRegistry, OnlinePolicy, RankedModel};
