//! Tools module - tool definitions and execution for model function calling.
//!
//! - `Tool` trait: the interface all tools implement
//! - `ToolContext`: execution context (workspace, originating chat)
//! - `ToolRegistry`: central registry for managing and executing tools
//!
//! Built-in tools:
//!
//! - `EchoTool`: echo back a message (testing)
//! - `ReadFileTool` / `WriteFileTool` / `ListDirTool`: workspace file access
//! - `ExecShellTool`: run a shell command with a per-call timeout
//!
//! # Example
//!
//! ```rust
//! use tabby::tools::{ToolRegistry, ToolContext, EchoTool};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.register(Box::new(EchoTool));
//!
//! let result = registry
//!     .execute("echo", json!({"message": "Hello!"}), &ToolContext::new())
//!     .await;
//! assert_eq!(result, "Hello!");
//! # });
//! ```

pub mod filesystem;
mod registry;
pub mod shell;
mod types;

pub use filesystem::{ListDirTool, ReadFileTool, WriteFileTool};
pub use registry::ToolRegistry;
pub use shell::ExecShellTool;
pub use types::{Tool, ToolContext};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A simple echo tool for testing purposes.
///
/// # Example
///
/// ```rust
/// use tabby::tools::{Tool, ToolContext, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let tool = EchoTool;
/// let result = tool.execute(json!({"message": "Hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap(), "Hello");
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(message.to_string())
    }
}

/// All built-in tools, ready to register.
pub fn builtin_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(ReadFileTool),
        Box::new(WriteFileTool),
        Box::new(ListDirTool),
        Box::new(ExecShellTool),
    ]
}
