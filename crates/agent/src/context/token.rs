//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Good enough
//! for compaction decisions when a client doesn't report usage.

use switchyard_core::message::Message;
use switchyard_core::provider::ChatRequest;
use switchyard_core::tool::ToolDefinition;

/// Per-message overhead for role names and delimiters.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let tool_calls: usize = message
        .tool_calls
        .iter()
        .map(|tc| estimate_tokens(&tc.name) + estimate_tokens(&tc.arguments))
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.content) + tool_calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for a tool definition (serialized as JSON).
pub fn estimate_tool_tokens(tool: &ToolDefinition) -> usize {
    let json = serde_json::to_string(tool).unwrap_or_default();
    estimate_tokens(&json)
}

/// Estimate tokens for a whole outbound request.
pub fn estimate_request_tokens(request: &ChatRequest) -> usize {
    estimate_messages_tokens(&request.messages)
        + request.tools.values().map(estimate_tool_tokens).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::message::MessageToolCall;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user("test"); // 1 token + 4 overhead
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn tool_calls_count_toward_message() {
        let mut msg = Message::assistant("");
        msg.tool_calls.push(MessageToolCall {
            id: "c1".into(),
            name: "calc".into(),
            arguments: r#"{"x":1}"#.into(),
        });
        assert_eq!(estimate_message_tokens(&msg), 4 + 1 + 2);
    }

    #[test]
    fn request_counts_messages_and_tools() {
        let mut request = ChatRequest {
            messages: vec![Message::user("hello"), Message::assistant("world")],
            ..Default::default()
        };
        assert_eq!(estimate_request_tokens(&request), 12);

        request.tools.insert(
            "search".into(),
            ToolDefinition {
                name: "search".into(),
                description: "Search the web".into(),
                input_schema: serde_json::json!({"type": "object"}),
            },
        );
        assert!(estimate_request_tokens(&request) > 12);
    }
}
