//! Tool registry for tabby.
//!
//! The registry owns the `name → Tool` mapping and executes tools by name.
//! Execution never raises: an unknown tool or a failing handler comes back as
//! an `Error: …` string that is fed to the model as an observation.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::TabbyError;
use crate::providers::ToolDefinition;

use super::{Tool, ToolContext};

/// A registry that holds and manages tools.
///
/// # Example
///
/// ```rust
/// use tabby::tools::{ToolRegistry, ToolContext, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(EchoTool));
///
/// assert!(registry.has("echo"));
///
/// let result = registry
///     .execute("echo", json!({"message": "hello"}), &ToolContext::new())
///     .await;
/// assert_eq!(result, "hello");
/// # });
/// ```
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name replaces the previous one.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            warn!(tool = %name, "Replacing previously registered tool");
        } else {
            info!(tool = %name, "Registering tool");
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Execute a tool by name, returning the result as a string.
    ///
    /// Never fails from the caller's perspective:
    /// - an unregistered name yields `Error: unknown tool '<name>'`
    /// - a handler error yields `Error: <message>`
    ///
    /// # Example
    /// ```
    /// use tabby::tools::{ToolRegistry, ToolContext};
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let registry = ToolRegistry::new();
    /// let result = registry
    ///     .execute("nonexistent", json!({}), &ToolContext::new())
    ///     .await;
    /// assert_eq!(result, "Error: unknown tool 'nonexistent'");
    /// # });
    /// ```
    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return format!("Error: unknown tool '{}'", name);
        };

        let start = Instant::now();
        match tool.execute(args, ctx).await {
            Ok(result) => {
                debug!(
                    tool = name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                result
            }
            Err(e) => {
                warn!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                match e {
                    TabbyError::Tool(msg) => format!("Error: {}", msg),
                    other => format!("Error: {}", other),
                }
            }
        }
    }

    /// All tool definitions for model exposure, sorted by name so the order
    /// is deterministic on every call.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a tool exists in the registry.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::EchoTool;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}, "required": []})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> crate::error::Result<String> {
            Err(TabbyError::Tool("deliberate failure".into()))
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        assert!(registry.has("echo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert!(registry.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn test_registry_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let result = registry
            .execute("echo", json!({"message": "hello"}), &ToolContext::new())
            .await;
        assert_eq!(result, "hello");
    }

    #[tokio::test]
    async fn test_unknown_tool_literal_error() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute("nonexistent", json!({}), &ToolContext::new())
            .await;
        assert_eq!(result, "Error: unknown tool 'nonexistent'");
    }

    #[tokio::test]
    async fn test_handler_error_becomes_result_text() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));

        let result = registry
            .execute("failing", json!({}), &ToolContext::new())
            .await;
        assert_eq!(result, "Error: deliberate failure");
    }

    #[test]
    fn test_registry_replace_tool_last_wins() {
        struct OtherEcho;

        #[async_trait]
        impl Tool for OtherEcho {
            fn name(&self) -> &str {
                "echo"
            }
            fn description(&self) -> &str {
                "A different echo"
            }
            fn parameters(&self) -> Value {
                json!({"type": "object", "properties": {}, "required": []})
            }
            async fn execute(
                &self,
                _args: Value,
                _ctx: &ToolContext,
            ) -> crate::error::Result<String> {
                Ok("replaced".into())
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(OtherEcho));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "A different echo");
    }

    #[test]
    fn test_definitions_sorted_and_deterministic() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));
        registry.register(Box::new(EchoTool));

        let first = registry.definitions();
        let second = registry.definitions();

        let names: Vec<&str> = first.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "failing"]);
        assert_eq!(
            first.iter().map(|d| &d.name).collect::<Vec<_>>(),
            second.iter().map(|d| &d.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_definitions_carry_schema() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "echo");
        assert!(definitions[0].parameters.is_object());
        assert_eq!(definitions[0].parameters["type"], "object");
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FailingTool));
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.names(), vec!["echo", "failing"]);
    }
}
