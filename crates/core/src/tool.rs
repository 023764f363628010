//! Tool trait — the abstraction over side-effecting capabilities.
//!
//! Tools give a model the ability to act: look something up, write a file,
//! call another service. The dispatcher in `switchyard-tools` turns a set of
//! tools into an executor for one turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// The tool name (sanitized when attached to a request)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's input
    pub input_schema: serde_json::Value,
}

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// What a tool returns: plain text or a structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Json(serde_json::Value),
}

impl ToolOutput {
    /// Render the output as the string the model will see.
    pub fn into_text(self) -> String {
        match self {
            ToolOutput::Text(text) => text,
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for ToolOutput {
    fn from(value: serde_json::Value) -> Self {
        ToolOutput::Json(value)
    }
}

/// Per-call context handed to a tool.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The session the calling turn belongs to
    pub session_id: Option<String>,

    /// The call ID the model assigned
    pub call_id: String,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (may contain characters that get sanitized).
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Executes tool calls on behalf of a model client during one turn.
///
/// Implementations never fail: errors come back as text the model can read.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a single call and return the text the model will see.
    async fn call(&self, call: &ToolCall) -> String;

    /// Execute a batch of calls, returning results in call order.
    async fn call_all(&self, calls: &[ToolCall]) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
            _context: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Ok(arguments["text"].as_str().unwrap_or("").into())
        }
    }

    #[test]
    fn definition_uses_tool_metadata() {
        let def = EchoTool.to_definition();
        assert_eq!(def.name, "echo");
        assert_eq!(def.input_schema["required"][0], "text");
    }

    #[tokio::test]
    async fn execute_returns_text() {
        let out = EchoTool
            .execute(serde_json::json!({"text": "hi"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out.into_text(), "hi");
    }

    #[test]
    fn json_output_renders_compact() {
        let out = ToolOutput::from(serde_json::json!({"ok": true}));
        assert_eq!(out.into_text(), r#"{"ok":true}"#);
    }
}
