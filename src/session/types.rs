//! Session types for tabby.
//!
//! This module defines the core types for conversation history: messages,
//! roles, tool calls, and tool results. These are the exact shapes persisted
//! to the session log, one JSON object per line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and synthetic compaction summaries
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call requested by the assistant.
///
/// The `id` is opaque and generated by the model-completion layer; it pairs
/// the call with its result in the following tool-role message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use tabby::session::ToolCall;
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_123", "web_search", json!({"query": "rust"}));
    /// assert_eq!(call.name, "web_search");
    /// ```
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }
}

/// The result of a single tool execution, paired to its call by `call_id`.
///
/// Content is always a string; non-string tool outputs are stringified
/// before they get here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// The id of the tool call this result answers
    pub call_id: String,
    /// Name of the tool that produced this result
    pub name: String,
    /// The tool output (or an `Error: …` string)
    pub content: String,
}

impl ToolResult {
    /// Create a new tool result.
    pub fn new(call_id: &str, name: &str, content: &str) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A single message in a conversation.
///
/// An assistant message carries either text content, tool calls, or both.
/// A tool message carries one result per call of the assistant message it
/// answers, in the original call order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls made by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool results answering a previous assistant message (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    /// When this message was created. Metadata only, never sent to the model.
    #[serde(default = "now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use tabby::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant message with text content only.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant message with tool calls and optional text.
    ///
    /// # Example
    /// ```
    /// use tabby::session::{Message, ToolCall};
    /// use serde_json::json;
    ///
    /// let call = ToolCall::new("call_1", "search", json!({"query": "rust"}));
    /// let msg = Message::assistant_with_tools(Some("Searching...".into()), vec![call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message (prompt text or a compaction summary).
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a tool message holding all results of one turn, in call order.
    ///
    /// # Example
    /// ```
    /// use tabby::session::{Message, Role, ToolResult};
    ///
    /// let msg = Message::tool_results(vec![ToolResult::new("call_1", "echo", "hi")]);
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_results.len(), 1);
    /// ```
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Tool,
            content: None,
            tool_calls: Vec::new(),
            tool_results: results,
            timestamp: Utc::now(),
        }
    }

    /// Check if this message carries tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Check if this is a tool-result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && !self.tool_results.is_empty()
    }

    /// The text content, or an empty string when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
        assert!(msg.tool_calls.is_empty());
        assert!(msg.tool_results.is_empty());
    }

    #[test]
    fn test_message_assistant() {
        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.as_deref(), Some("Hi there"));
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_message_system() {
        let msg = Message::system("You are helpful");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.text(), "You are helpful");
    }

    #[test]
    fn test_message_with_tool_calls() {
        let call = ToolCall::new("call_1", "search", json!({"q": "test"}));
        let msg = Message::assistant_with_tools(Some("Searching...".into()), vec![call]);

        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].name, "search");
    }

    #[test]
    fn test_message_tool_results() {
        let msg = Message::tool_results(vec![
            ToolResult::new("call_1", "echo", "one"),
            ToolResult::new("call_2", "echo", "two"),
        ]);
        assert_eq!(msg.role, Role::Tool);
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_results[0].call_id, "call_1");
        assert_eq!(msg.tool_results[1].call_id, "call_2");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_role_serialize() {
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, r#""user""#);

        let parsed: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Role::User);
    }

    #[test]
    fn test_message_serialization_skips_empty() {
        let msg = Message::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();

        // tool_calls and tool_results should not appear when empty
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_results"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_message_roundtrip_with_tools() {
        let call = ToolCall::new("call_9", "read_file", json!({"path": "a.txt"}));
        let msg = Message::assistant_with_tools(None, vec![call]);

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.role, Role::Assistant);
        assert!(parsed.content.is_none());
        assert_eq!(parsed.tool_calls, msg.tool_calls);
    }

    #[test]
    fn test_message_deserialize_without_timestamp() {
        // Log lines written by older builds carry no timestamp field
        let parsed: Message = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(parsed.role, Role::User);
        assert_eq!(parsed.text(), "hi");
    }

    #[test]
    fn test_tool_call_new() {
        let call = ToolCall::new("call_123", "web_search", json!({"query": "rust"}));
        assert_eq!(call.id, "call_123");
        assert_eq!(call.name, "web_search");
        assert_eq!(call.arguments["query"], "rust");
    }
}
