//! Shell tool for tabby.
//!
//! Runs a command under `sh -c` with a per-call timeout. The timeout is the
//! only cancellation primitive in the runtime: when it fires, the child
//! process is killed and the tool reports the timeout as result text.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::{Result, TabbyError};

use super::{Tool, ToolContext};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tool for executing shell commands.
///
/// # Parameters
/// - `command`: The shell command to execute (required)
/// - `timeout`: Maximum seconds to wait, default 30 (optional)
/// - `working_dir`: Working directory, defaults to the workspace (optional)
///
/// # Example
/// ```rust
/// use tabby::tools::{Tool, ToolContext, ExecShellTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let tool = ExecShellTool;
/// let result = tool.execute(json!({"command": "echo hello"}), &ToolContext::new()).await;
/// assert_eq!(result.unwrap().trim(), "hello");
/// # });
/// ```
pub struct ExecShellTool;

#[async_trait]
impl Tool for ExecShellTool {
    fn name(&self) -> &str {
        "exec_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum seconds to wait (default: 30)"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Optional working directory"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TabbyError::Tool("missing 'command' argument".into()))?;

        let timeout_secs = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let working_dir = args
            .get("working_dir")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| ctx.workspace.clone());

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            // Dropping the future on timeout must take the process with it
            .kill_on_drop(true);
        if let Some(dir) = &working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| TabbyError::Tool(format!("failed to spawn command: {}", e)))?;

        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(TabbyError::Tool(format!("command failed: {}", e)));
            }
            Err(_) => {
                return Ok(format!("Error: command timed out after {}s", timeout_secs));
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(stderr);
        }

        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            return Ok(format!("Exit code {}:\n{}", code, text));
        }
        if text.is_empty() {
            return Ok("(no output)".to_string());
        }
        Ok(text)
    }
}
