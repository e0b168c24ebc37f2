//! Canonical session keys.
//!
//! A session key groups messages into one conversation. Format:
//!
//! ```text
//! agent:<agentId>:<channel>:<type>:<id>
//! ```
//!
//! Examples: `agent:main:feishu:direct:ou_abc123`,
//! `agent:main:cli:direct:local`, `agent:main:cron:cron:daily_report`.
//! Two messages map to the same session if and only if their derived keys
//! are equal.

use serde::{Deserialize, Serialize};

/// The kind of conversation a session key identifies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-on-one direct message
    Direct,
    /// Group chat
    Group,
    /// Broadcast channel
    Channel,
    /// Scheduled job
    Cron,
    /// Delegated sub-agent run
    Subagent,
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatType::Direct => write!(f, "direct"),
            ChatType::Group => write!(f, "group"),
            ChatType::Channel => write!(f, "channel"),
            ChatType::Cron => write!(f, "cron"),
            ChatType::Subagent => write!(f, "subagent"),
        }
    }
}

impl std::str::FromStr for ChatType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "direct" => Ok(ChatType::Direct),
            "group" => Ok(ChatType::Group),
            "channel" => Ok(ChatType::Channel),
            "cron" => Ok(ChatType::Cron),
            "subagent" => Ok(ChatType::Subagent),
            _ => Err(()),
        }
    }
}

/// Build a canonical session key.
///
/// # Example
/// ```
/// use tabby::session::{make_session_key, ChatType};
///
/// let key = make_session_key("main", "cli", ChatType::Direct, "local");
/// assert_eq!(key, "agent:main:cli:direct:local");
/// ```
pub fn make_session_key(agent_id: &str, channel: &str, chat_type: ChatType, chat_id: &str) -> String {
    format!("agent:{}:{}:{}:{}", agent_id, channel, chat_type, chat_id)
}

/// Parsed components of a session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeyParts {
    pub agent_id: String,
    pub channel: String,
    pub chat_type: ChatType,
    pub chat_id: String,
}

/// Parse a session key into components. Returns `None` if the key is not in
/// canonical form. The chat id may itself contain colons.
pub fn parse_session_key(key: &str) -> Option<SessionKeyParts> {
    let mut parts = key.splitn(5, ':');
    if parts.next()? != "agent" {
        return None;
    }
    let agent_id = parts.next()?.to_string();
    let channel = parts.next()?.to_string();
    let chat_type: ChatType = parts.next()?.parse().ok()?;
    let chat_id = parts.next()?.to_string();
    Some(SessionKeyParts {
        agent_id,
        channel,
        chat_type,
        chat_id,
    })
}

/// Whether a key identifies a group or broadcast-channel conversation.
pub fn is_group_session(key: &str) -> bool {
    matches!(
        parse_session_key(key).map(|p| p.chat_type),
        Some(ChatType::Group) | Some(ChatType::Channel)
    )
}
