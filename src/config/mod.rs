//! Configuration for tabby.
//!
//! One TOML file with a section per subsystem, every field defaulted so a
//! missing or partial file still yields a working configuration. Secrets
//! (API keys) never live in the file — they come from the environment.
//!
//! Default location: `~/.tabby/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::AgentConfig;
use crate::error::{Result, TabbyError};
use crate::gateway::GatewayConfig;

/// Which model backend to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Pick from available API keys (Anthropic first)
    Auto,
    Anthropic,
    Openai,
}

/// Provider selection and endpoint overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Backend to use
    pub kind: ProviderKind,
    /// Model override applied to the chosen backend; empty keeps its default
    pub model: String,
    /// Custom base URL for OpenAI-compatible endpoints
    pub api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Auto,
            model: String::new(),
            api_base: String::new(),
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory for session logs
    pub dir: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: "~/.tabby/sessions".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable text
    Pretty,
    /// Structured JSON lines for log aggregators
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default level filter (overridden by `RUST_LOG`)
    pub level: String,
    /// Optional log file; stderr when absent
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Rate limiting applied as gateway middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Messages per sender per minute; 0 disables the middleware
    pub per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_minute: 20 }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub gateway: GatewayConfig,
    pub provider: ProviderConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// The tabby home directory (`~/.tabby`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tabby")
    }

    /// Default config file path (`~/.tabby/config.toml`).
    pub fn default_path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load configuration from the given path, or the default path.
    ///
    /// A missing file yields `Config::default()`; a malformed file is an
    /// error (silently ignoring a broken config hides real mistakes).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| TabbyError::Config(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// The resolved session directory.
    pub fn session_dir(&self) -> PathBuf {
        expand_tilde(&self.session.dir)
    }

    /// The resolved workspace directory.
    pub fn workspace_dir(&self) -> PathBuf {
        expand_tilde(&self.agent.workspace_dir)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_turns, 10);
        assert_eq!(config.agent.compaction_keep_last, 10);
        assert!((config.agent.compaction_threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.gateway.max_concurrent_per_chat, 1);
        assert_eq!(config.provider.kind, ProviderKind::Auto);
        assert_eq!(config.rate_limit.per_minute, 20);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("missing.toml"))).unwrap();
        assert_eq!(config.agent.agent_id, "main");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent]
agent_id = "helper"
max_turns = 5

[provider]
kind = "openai"
model = "gpt-4o"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.agent.agent_id, "helper");
        assert_eq!(config.agent.max_turns, 5);
        // Unspecified fields keep defaults
        assert_eq!(config.agent.max_tokens, 4096);
        assert_eq!(config.provider.kind, ProviderKind::Openai);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.rate_limit.per_minute, 20);
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "agent = not toml at all [").unwrap();

        let result = Config::load(Some(&path));
        assert!(matches!(result, Err(TabbyError::Config(_))));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.agent.agent_id = "roundtrip".to_string();
        config.gateway.daily_reset = true;

        let toml_text = toml::to_string(&config).unwrap();
        let restored: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(restored.agent.agent_id, "roundtrip");
        assert!(restored.gateway.daily_reset);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("rel/path"), PathBuf::from("rel/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x"), home.join("x"));
            assert_eq!(expand_tilde("~"), home);
        }
    }
}
