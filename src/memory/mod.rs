//! Workspace memory - identity files and long-term facts.
//!
//! Two-layer memory rooted in a workspace directory:
//!
//! - `SOUL.md` / `AGENTS.md`: identity and standing instructions, loaded into
//!   the system prompt every turn.
//! - `memory/MEMORY.md`: long-term facts, loaded every turn, updatable by
//!   section.
//! - `memory/HISTORY.md`: append-only event log, substring-searchable, never
//!   loaded automatically.
//!
//! Reads are synchronous (they happen on the prompt-building path and the
//! files are small); writes are async.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::Result;

/// Workspace-backed memory for an agent.
#[derive(Debug, Clone)]
pub struct Memory {
    workspace: PathBuf,
}

impl Memory {
    /// Create a memory rooted at the given workspace directory.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// The workspace directory.
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn memory_path(&self) -> PathBuf {
        self.workspace.join("memory").join("MEMORY.md")
    }

    fn history_path(&self) -> PathBuf {
        self.workspace.join("memory").join("HISTORY.md")
    }

    /// Create workspace directories and default files if missing.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(self.workspace.join("memory"))?;

        let memory_path = self.memory_path();
        if !memory_path.exists() {
            std::fs::write(&memory_path, "# Long-term Memory\n\n(No memories yet.)\n")?;
        }
        let history_path = self.history_path();
        if !history_path.exists() {
            std::fs::write(&history_path, "# History Log\n\n")?;
        }
        debug!(workspace = %self.workspace.display(), "Memory initialized");
        Ok(())
    }

    fn read_optional(&self, path: &Path) -> String {
        match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read memory file");
                String::new()
            }
        }
    }

    /// Read `SOUL.md` (agent identity/personality). Empty when absent.
    pub fn soul(&self) -> String {
        self.read_optional(&self.workspace.join("SOUL.md"))
    }

    /// Read `AGENTS.md` (standing instructions). Empty when absent.
    pub fn agents_md(&self) -> String {
        self.read_optional(&self.workspace.join("AGENTS.md"))
    }

    /// Identity text for the system prompt: SOUL.md and AGENTS.md, joined.
    pub fn identity_text(&self) -> String {
        let parts: Vec<String> = [self.soul(), self.agents_md()]
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        parts.join("\n\n")
    }

    /// Read `MEMORY.md` (long-term facts). Empty when absent.
    pub fn memory_text(&self) -> String {
        self.read_optional(&self.memory_path())
    }

    /// Overwrite `MEMORY.md`.
    pub async fn write_memory(&self, content: &str) -> Result<()> {
        let path = self.memory_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    /// Replace a named `## <section>` in `MEMORY.md`, or append it.
    pub async fn update_section(&self, section: &str, content: &str) -> Result<()> {
        let current = self.memory_text();
        let heading = format!("## {}", section);

        let updated = if current.contains(&heading) {
            let mut lines = Vec::new();
            let mut in_section = false;
            for line in current.lines() {
                if line.starts_with(&heading) {
                    in_section = true;
                    lines.push(heading.clone());
                    lines.push(content.to_string());
                    continue;
                }
                if in_section && line.starts_with("## ") {
                    in_section = false;
                }
                if !in_section {
                    lines.push(line.to_string());
                }
            }
            lines.join("\n")
        } else {
            format!("{}\n\n{}\n{}\n", current.trim_end(), heading, content)
        };

        self.write_memory(&updated).await
    }

    /// Append a timestamped entry to `HISTORY.md`.
    pub async fn append_history(&self, entry: &str) -> Result<()> {
        let path = self.history_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let ts = Utc::now().format("%Y-%m-%d %H:%M UTC");
        let block = format!("\n## {}\n{}\n", ts, entry.trim());

        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        Ok(())
    }

    /// Search `HISTORY.md` for lines containing the pattern, case-insensitive.
    pub fn grep_history(&self, pattern: &str, max_results: usize) -> Vec<String> {
        let text = self.read_optional(&self.history_path());
        let pattern = pattern.to_lowercase();
        text.lines()
            .filter(|line| line.to_lowercase().contains(&pattern))
            .take(max_results)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_default_files() {
        let dir = TempDir::new().unwrap();
        let memory = Memory::new(dir.path());
        memory.init().unwrap();

        assert!(memory.memory_text().contains("Long-term Memory"));
        assert!(dir.path().join("memory/HISTORY.md").exists());
    }

    #[test]
    fn test_missing_files_read_empty() {
        let dir = TempDir::new().unwrap();
        let memory = Memory::new(dir.path());
        assert_eq!(memory.soul(), "");
        assert_eq!(memory.agents_md(), "");
        assert_eq!(memory.memory_text(), "");
        assert_eq!(memory.identity_text(), "");
    }

    #[test]
    fn test_identity_text_joins_present_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("SOUL.md"), "Be kind.\n").unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "Reply tersely.\n").unwrap();

        let memory = Memory::new(dir.path());
        assert_eq!(memory.identity_text(), "Be kind.\n\nReply tersely.");
    }

    #[tokio::test]
    async fn test_update_section_appends_then_replaces() {
        let dir = TempDir::new().unwrap();
        let memory = Memory::new(dir.path());
        memory.init().unwrap();

        memory.update_section("Preferences", "Likes tea.").await.unwrap();
        assert!(memory.memory_text().contains("## Preferences\nLikes tea."));

        memory.update_section("Preferences", "Likes coffee.").await.unwrap();
        let text = memory.memory_text();
        assert!(text.contains("Likes coffee."));
        assert!(!text.contains("Likes tea."));
        assert_eq!(text.matches("## Preferences").count(), 1);
    }

    #[tokio::test]
    async fn test_history_append_and_grep() {
        let dir = TempDir::new().unwrap();
        let memory = Memory::new(dir.path());
        memory.init().unwrap();

        memory.append_history("Deployed the new build").await.unwrap();
        memory.append_history("User asked about invoices").await.unwrap();

        let hits = memory.grep_history("INVOICE", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].contains("invoices"));

        assert!(memory.grep_history("nothing-here", 10).is_empty());
    }

    #[tokio::test]
    async fn test_grep_history_respects_limit() {
        let dir = TempDir::new().unwrap();
        let memory = Memory::new(dir.path());
        memory.init().unwrap();

        for i in 0..5 {
            memory.append_history(&format!("event {}", i)).await.unwrap();
        }
        assert_eq!(memory.grep_history("event", 3).len(), 3);
    }
}
