//! Tool dispatch for Switchyard.
//!
//! Tools give the model the ability to act. A [`ToolDispatcher`] turns the
//! tools active for one turn into an executor the client can call,
//! enforcing a serial or parallel [`ExecutionPolicy`] and turning every
//! failure into text the model can read.

pub mod dispatcher;

pub use dispatcher::{ExecutionPolicy, ToolDispatcher, sanitize_tool_name};
