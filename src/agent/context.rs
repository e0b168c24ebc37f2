//! System-prompt construction.
//!
//! The `ContextBuilder` assembles the system prompt from its sections in a
//! fixed order:
//!
//! 1. base instructions
//! 2. identity text (SOUL.md / AGENTS.md)
//! 3. `## Memory` (long-term facts)
//! 4. `## Authorized Senders` (only when a sender is given)
//! 5. `## Current Date & Time`
//! 6. caller-supplied extra context
//!
//! Empty sources produce no section. The ordering is part of the contract —
//! callers and tests may rely on it.

use chrono::Utc;

/// Builder for the agent's system prompt.
///
/// # Example
///
/// ```rust
/// use tabby::agent::ContextBuilder;
///
/// let system = ContextBuilder::new("You are a helpful assistant.")
///     .with_memory("User prefers short answers.")
///     .build("user_42", "");
/// assert!(system.starts_with("You are a helpful assistant."));
/// assert!(system.contains("## Memory"));
/// assert!(system.contains("## Authorized Senders\nuser_42"));
/// ```
pub struct ContextBuilder {
    base_prompt: String,
    identity: Option<String>,
    memory: Option<String>,
    timezone: String,
}

impl ContextBuilder {
    /// Create a builder with the base instruction text.
    pub fn new(base_prompt: &str) -> Self {
        Self {
            base_prompt: base_prompt.to_string(),
            identity: None,
            memory: None,
            timezone: String::new(),
        }
    }

    /// Set identity text (agent personality and standing instructions),
    /// placed directly after the base instructions.
    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = Some(identity.to_string());
        self
    }

    /// Set long-term memory text, rendered under a `## Memory` heading.
    pub fn with_memory(mut self, memory: &str) -> Self {
        self.memory = Some(memory.to_string());
        self
    }

    /// Set the timezone label for the date/time section. Empty means UTC.
    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = timezone.to_string();
        self
    }

    /// Assemble the prompt. `sender_id` and `extra` are skipped when empty.
    pub fn build(&self, sender_id: &str, extra: &str) -> String {
        let mut parts: Vec<String> = vec![self.base_prompt.clone()];

        if let Some(identity) = &self.identity {
            let identity = identity.trim();
            if !identity.is_empty() {
                parts.push(identity.to_string());
            }
        }

        if let Some(memory) = &self.memory {
            let memory = memory.trim();
            if !memory.is_empty() {
                parts.push(format!("## Memory\n{}", memory));
            }
        }

        if !sender_id.is_empty() {
            parts.push(format!("## Authorized Senders\n{}", sender_id));
        }

        let tz = if self.timezone.is_empty() {
            "UTC"
        } else {
            &self.timezone
        };
        let now = Utc::now().format("%Y-%m-%d %H:%M UTC");
        parts.push(format!("## Current Date & Time\n{} ({})", now, tz));

        if !extra.is_empty() {
            parts.push(extra.to_string());
        }

        parts.join("\n\n")
    }
}
