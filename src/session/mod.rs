//! Session module - durable conversation state.
//!
//! A [`Session`] is an ordered message history under a canonical key, backed
//! by an append-only JSONL file: one JSON object per line, appended as
//! messages arrive and never rewritten in place. Compaction is the single
//! exception — it atomically rewrites the whole log as a metadata record
//! followed by the compacted message sequence. Replaying the log always
//! reconstructs the in-memory history exactly.
//!
//! The [`SessionStore`] caches sessions by key and hands out
//! `Arc<Mutex<Session>>` handles so that callers holding the
//! per-conversation lock can append with line-level durability.
//!
//! # Example
//!
//! ```
//! use tabby::session::{SessionStore, Message};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SessionStore::new_memory();
//!     let session = store.get("agent:main:cli:direct:local", false).await;
//!
//!     let mut session = session.lock().await;
//!     session.append(Message::user("Hello!")).await;
//!     session.append(Message::assistant("Hi there!")).await;
//!     assert_eq!(session.messages.len(), 2);
//! }
//! ```

mod key;
pub mod types;

pub use key::{is_group_session, make_session_key, parse_session_key, ChatType, SessionKeyParts};
pub use types::{Message, Role, ToolCall, ToolResult};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::Result;

/// A conversation session backed by an append-only JSONL file.
///
/// Persistence discipline:
/// - `append` writes exactly one new line; prior lines are never touched,
///   so a crash mid-write leaves the log consistent up to the last line.
/// - `compact` is the only operation allowed to rewrite the file.
/// - Write failures are logged and swallowed; the in-memory history stays
///   authoritative for the lifetime of the process.
#[derive(Debug)]
pub struct Session {
    /// Canonical session key (see [`make_session_key`])
    pub key: String,
    /// Ordered message history
    pub messages: Vec<Message>,
    /// Number of original messages folded into summaries so far
    pub compacted_count: usize,
    /// Backing file; `None` for memory-only sessions
    path: Option<PathBuf>,
}

impl Session {
    /// Create a memory-only session (no persistence).
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            messages: Vec::new(),
            compacted_count: 0,
            path: None,
        }
    }

    /// Create a session backed by a JSONL file. Call [`Session::load`] to
    /// read any existing log.
    pub fn with_path(key: &str, path: PathBuf) -> Self {
        Self {
            key: key.to_string(),
            messages: Vec::new(),
            compacted_count: 0,
            path: Some(path),
        }
    }

    /// The backing file path, if this session is persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load messages from the backing log.
    ///
    /// A missing file yields an empty session. Read failures degrade to an
    /// empty session rather than failing the request; malformed lines are
    /// skipped with a warning. A metadata line restores `compacted_count`
    /// (absent metadata loads as 0).
    pub async fn load(&mut self) {
        self.messages.clear();
        self.compacted_count = 0;

        let Some(path) = &self.path else { return };
        if !path.exists() {
            return;
        }

        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                warn!(session = %self.key, error = %e, "Failed to read session log, starting empty");
                return;
            }
        };

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) if value.get("_type").and_then(Value::as_str) == Some("meta") => {
                    self.compacted_count = value
                        .get("compacted_count")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as usize;
                }
                Ok(value) => match serde_json::from_value::<Message>(value) {
                    Ok(msg) => self.messages.push(msg),
                    Err(e) => {
                        warn!(session = %self.key, error = %e, "Skipping malformed log line");
                    }
                },
                Err(e) => {
                    warn!(session = %self.key, error = %e, "Skipping malformed log line");
                }
            }
        }

        debug!(session = %self.key, messages = self.messages.len(), "Session loaded");
    }

    /// Append a message to the in-memory history and persist it as one new
    /// log line. Persistence failures are logged and swallowed.
    pub async fn append(&mut self, message: Message) {
        let line = serde_json::to_value(&message).ok();
        self.messages.push(message);
        if let Some(line) = line {
            if let Err(e) = self.append_line(&line).await {
                warn!(session = %self.key, error = %e, "Failed to persist message");
            }
        }
    }

    async fn append_line(&self, value: &Value) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("{}\n", value).as_bytes()).await?;
        Ok(())
    }

    /// Fold all but the last `keep_last` messages into a single system-role
    /// summary message, then rewrite the durable log to match.
    ///
    /// No-op when the history holds `keep_last` messages or fewer. The
    /// summary message carries the count of folded messages; the rewrite is
    /// the only operation that replaces the log file, and it goes through a
    /// temp-file rename so a crash cannot leave a half-written log.
    pub async fn compact(&mut self, summary: &str, keep_last: usize) {
        if self.messages.len() <= keep_last {
            return;
        }

        let split = self.messages.len() - keep_last;
        let tail = self.messages.split_off(split);
        let folded = self.messages.len();

        let summary_msg = Message::system(&format!(
            "[Summary of {} earlier messages]\n{}",
            folded, summary
        ));
        self.messages = std::iter::once(summary_msg).chain(tail).collect();
        self.compacted_count += folded;

        if let Err(e) = self.rewrite_log().await {
            warn!(session = %self.key, error = %e, "Compaction rewrite failed");
        } else {
            info!(
                session = %self.key,
                folded = folded,
                kept = keep_last,
                "Session compacted"
            );
        }
    }

    async fn rewrite_log(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut content = format!(
            "{}\n",
            serde_json::json!({"_type": "meta", "compacted_count": self.compacted_count})
        );
        for msg in &self.messages {
            content.push_str(&serde_json::to_string(msg)?);
            content.push('\n');
        }

        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Clear the in-memory history and delete the backing log.
    pub async fn reset(&mut self) {
        self.messages.clear();
        self.compacted_count = 0;
        if let Some(path) = &self.path {
            if path.exists() {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!(session = %self.key, error = %e, "Failed to delete session log");
                } else {
                    info!(session = %self.key, "Session reset");
                }
            }
        }
    }

    /// Cheap token estimate used to decide when to compact.
    ///
    /// Character-count based, not model-exact; the only contractual property
    /// is monotonicity (more content never lowers the estimate).
    pub fn estimate_tokens(&self) -> usize {
        let mut total = 0;
        for msg in &self.messages {
            if let Some(content) = &msg.content {
                total += content.len() / 4;
            }
            for call in &msg.tool_calls {
                total += call.arguments.to_string().len() / 4 + 10;
            }
            for result in &msg.tool_results {
                total += result.content.len() / 4 + 10;
            }
        }
        total
    }

    /// Number of messages in this session.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if this session has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Store of sessions keyed by canonical session key.
///
/// The cache map is shared and concurrency-safe; each cached session is
/// wrapped in its own `Mutex` so only the per-session lock, not the map,
/// serializes conversation processing.
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<Session>>>>>,
    base_dir: Option<PathBuf>,
}

impl SessionStore {
    /// Create a store persisting sessions under `dir` (created if missing).
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            base_dir: Some(dir),
        })
    }

    /// Create an in-memory store without persistence. Useful for tests and
    /// throwaway sessions.
    pub fn new_memory() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            base_dir: None,
        }
    }

    /// Get a cached session, or load it from disk (creating an empty one if
    /// no log exists) and cache it.
    ///
    /// With `daily_reset`, a session whose log was last written on a previous
    /// calendar day is cleared before being returned.
    pub async fn get(&self, key: &str, daily_reset: bool) -> Arc<Mutex<Session>> {
        let cached = { self.sessions.read().await.get(key).cloned() };

        let entry = match cached {
            Some(entry) => entry,
            None => {
                let session = match &self.base_dir {
                    Some(dir) => {
                        let mut s = Session::with_path(key, Self::log_path(dir, key));
                        s.load().await;
                        s
                    }
                    None => Session::new(key),
                };
                // Another task may have inserted while we loaded; keep theirs.
                let mut sessions = self.sessions.write().await;
                sessions
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(session)))
                    .clone()
            }
        };

        if daily_reset {
            let mut session = entry.lock().await;
            if session.path().map(modified_before_today).unwrap_or(false) {
                info!(session = %key, "Daily rollover, resetting session");
                session.reset().await;
            }
        }

        entry
    }

    /// Delete a session from both the cache and disk.
    pub async fn delete(&self, key: &str) {
        let entry = { self.sessions.write().await.remove(key) };
        if let Some(entry) = entry {
            entry.lock().await.reset().await;
        } else if let Some(dir) = &self.base_dir {
            let path = Self::log_path(dir, key);
            if path.exists() {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(session = %key, error = %e, "Failed to delete session log");
                }
            }
        }
    }

    /// List all known session keys, cached and on-disk, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions.keys().cloned().collect()
        };

        if let Some(dir) = &self.base_dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            let key = unsanitize_key(stem);
                            if !keys.contains(&key) {
                                keys.push(key);
                            }
                        }
                    }
                }
            }
        }

        keys.sort();
        keys
    }

    /// Number of sessions currently cached in memory.
    pub async fn cache_size(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn log_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.jsonl", sanitize_key(key)))
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            base_dir: self.base_dir.clone(),
        }
    }
}

/// True when the file was last modified on an earlier local calendar day.
fn modified_before_today(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = metadata.modified() else {
        return false;
    };
    let modified: chrono::DateTime<Local> = modified.into();
    modified.date_naive() < Local::now().date_naive()
}

/// Sanitize a session key for use as a filename.
///
/// Percent-encodes characters that are problematic in filenames so the
/// mapping is bijective; different keys never collide on disk.
pub fn sanitize_key(key: &str) -> String {
    let mut result = String::with_capacity(key.len() * 3);
    for c in key.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            c => result.push(c),
        }
    }
    result
}

/// Reverse [`sanitize_key`], recovering the original session key.
pub fn unsanitize_key(sanitized: &str) -> String {
    let mut result = String::with_capacity(sanitized.len());
    let mut chars = sanitized.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    result.push(byte as char);
                    continue;
                }
            }
            result.push('%');
            result.push_str(&hex);
        } else {
            result.push(c);
        }
    }
    result
}
