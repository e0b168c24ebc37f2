//! Tool types for tabby.
//!
//! Defines the `Tool` trait that all tools implement and the `ToolContext`
//! struct that carries execution context to them.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Trait that all tools must implement.
///
/// Tools are executable functions the model can call during a turn. A tool's
/// error is not fatal to the turn: the registry renders it as an `Error: …`
/// string and feeds it back to the model as an observation.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use tabby::tools::{Tool, ToolContext};
/// use tabby::error::Result;
///
/// struct MyTool;
///
/// #[async_trait]
/// impl Tool for MyTool {
///     fn name(&self) -> &str { "my_tool" }
///     fn description(&self) -> &str { "Does something useful" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": {},
///             "required": []
///         })
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
///         Ok("Done!".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool name. Identifies the tool when the model requests it; must be
    /// unique within a registry (last registration wins).
    fn name(&self) -> &str;

    /// Human-readable description, sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters, including its `required` list.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// # Arguments
    /// * `args` - The JSON arguments passed by the model
    /// * `ctx` - The execution context (workspace, originating chat)
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}

/// Context provided to tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The channel name the request came from (e.g., "cli", "feishu")
    pub channel: Option<String>,
    /// The chat/conversation ID within the channel
    pub chat_id: Option<String>,
    /// The workspace directory for file operations
    pub workspace: Option<String>,
}

impl ToolContext {
    /// Create a new empty tool context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel and chat ID.
    ///
    /// # Example
    /// ```
    /// use tabby::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_channel("cli", "local");
    /// assert_eq!(ctx.channel.as_deref(), Some("cli"));
    /// assert_eq!(ctx.chat_id.as_deref(), Some("local"));
    /// ```
    pub fn with_channel(mut self, channel: &str, chat_id: &str) -> Self {
        self.channel = Some(channel.to_string());
        self.chat_id = Some(chat_id.to_string());
        self
    }

    /// Set the workspace directory.
    pub fn with_workspace(mut self, workspace: &str) -> Self {
        self.workspace = Some(workspace.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_context_new() {
        let ctx = ToolContext::new();
        assert!(ctx.channel.is_none());
        assert!(ctx.chat_id.is_none());
        assert!(ctx.workspace.is_none());
    }

    #[test]
    fn test_tool_context_builder_chain() {
        let ctx = ToolContext::new()
            .with_channel("feishu", "oc_123")
            .with_workspace("/tmp/workspace");

        assert_eq!(ctx.channel.as_deref(), Some("feishu"));
        assert_eq!(ctx.chat_id.as_deref(), Some("oc_123"));
        assert_eq!(ctx.workspace.as_deref(), Some("/tmp/workspace"));
    }

    #[test]
    fn test_tool_context_clone() {
        let ctx1 = ToolContext::new().with_workspace("/test");
        let ctx2 = ctx1.clone();
        assert_eq!(ctx1.workspace, ctx2.workspace);
    }
}
