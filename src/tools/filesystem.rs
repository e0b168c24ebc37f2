//! Filesystem tools for tabby.
//!
//! Reading, writing, and listing files. Relative paths resolve against the
//! workspace directory in the tool context; absolute paths are used as given.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Result, TabbyError};

use super::{Tool, ToolContext};

fn resolve_path(path: &str, ctx: &ToolContext) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match &ctx.workspace {
        Some(workspace) => Path::new(workspace).join(p),
        None => p.to_path_buf(),
    }
}

/// Tool for reading file contents.
///
/// # Parameters
/// - `path`: The path to the file to read (required)
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read (absolute or workspace-relative)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TabbyError::Tool("missing 'path' argument".into()))?;

        let full_path = resolve_path(path, ctx);
        tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|e| TabbyError::Tool(format!("failed to read {}: {}", full_path.display(), e)))
    }
}

/// Tool for writing content to a file, creating parent directories as needed.
///
/// # Parameters
/// - `path`: The path to the file to write (required)
/// - `content`: The text content to write (required)
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to"
                },
                "content": {
                    "type": "string",
                    "description": "The text content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TabbyError::Tool("missing 'path' argument".into()))?;
        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TabbyError::Tool("missing 'content' argument".into()))?;

        let full_path = resolve_path(path, ctx);
        if let Some(parent) = full_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    TabbyError::Tool(format!("failed to create parent directories: {}", e))
                })?;
            }
        }

        tokio::fs::write(&full_path, content).await.map_err(|e| {
            TabbyError::Tool(format!("failed to write {}: {}", full_path.display(), e))
        })?;

        Ok(format!("Written {} bytes to {}", content.len(), path))
    }
}

/// Tool for listing directory contents. Directories sort before files.
///
/// # Parameters
/// - `path`: The directory path to list (required)
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the contents of a directory"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory path to list"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TabbyError::Tool("missing 'path' argument".into()))?;

        let full_path = resolve_path(path, ctx);
        let mut read_dir = tokio::fs::read_dir(&full_path).await.map_err(|e| {
            TabbyError::Tool(format!("failed to list {}: {}", full_path.display(), e))
        })?;

        let mut entries: Vec<(bool, String)> = Vec::new();
        while let Ok(Some(entry)) = read_dir.next_entry().await {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push((is_dir, entry.file_name().to_string_lossy().to_string()));
        }
        entries.sort_by(|a, b| (!a.0, &a.1).cmp(&(!b.0, &b.1)));

        if entries.is_empty() {
            return Ok("(empty)".to_string());
        }
        let lines: Vec<String> = entries
            .iter()
            .map(|(is_dir, name)| {
                if *is_dir {
                    format!("[DIR] {}", name)
                } else {
                    format!("      {}", name)
                }
            })
            .collect();
        Ok(lines.join("\n"))
    }
}
