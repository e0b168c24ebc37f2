//! Channel trait and message types.
//!
//! A channel is a transport adapter: it receives platform messages, hands
//! them to the gateway via its handler callback, and sends replies back out.
//! Platform-specific concerns — group-mention filtering, duplicate-message-id
//! detection, attachment handling — live inside the channel; a message that
//! reaches the handler is meant to be processed.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The channel this message came from (e.g., "cli", "feishu")
    pub channel: String,
    /// Unique identifier of the sender
    pub sender_id: String,
    /// Unique identifier of the chat/conversation
    pub chat_id: String,
    /// The text content of the message
    pub content: String,
    /// Whether this message came from a group conversation
    pub is_group: bool,
    /// Group identifier, when `is_group`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Thread identifier, for threaded platforms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Platform message id this message replies to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// Additional platform metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl InboundMessage {
    /// Create a new direct (non-group) inbound message.
    ///
    /// # Example
    /// ```
    /// use tabby::channels::InboundMessage;
    ///
    /// let msg = InboundMessage::new("cli", "user", "local", "Hello!");
    /// assert!(!msg.is_group);
    /// ```
    pub fn new(channel: &str, sender_id: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender_id: sender_id.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            is_group: false,
            group_id: None,
            thread_id: None,
            reply_to_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Mark this message as coming from a group (builder pattern).
    pub fn with_group(mut self, group_id: &str) -> Self {
        self.is_group = true;
        self.group_id = Some(group_id.to_string());
        self
    }

    /// Set the thread id (builder pattern).
    pub fn with_thread(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_string());
        self
    }

    /// Set the replied-to message id (builder pattern).
    pub fn with_reply_to(mut self, reply_to_id: &str) -> Self {
        self.reply_to_id = Some(reply_to_id.to_string());
        self
    }

    /// Add a metadata key-value pair (builder pattern).
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// A message to send through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// The channel to send through
    pub channel: String,
    /// The chat/conversation to send to
    pub chat_id: String,
    /// The text content to send
    pub content: String,
    /// Thread to post into, for threaded platforms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Platform message id to reply to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl OutboundMessage {
    /// Create a new outbound message.
    pub fn new(channel: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            thread_id: None,
            reply_to_id: None,
        }
    }

    /// Create a reply to an inbound message, preserving thread and reply ids.
    ///
    /// # Example
    /// ```
    /// use tabby::channels::{InboundMessage, OutboundMessage};
    ///
    /// let inbound = InboundMessage::new("cli", "user", "local", "Hi").with_thread("t1");
    /// let reply = OutboundMessage::reply_to(&inbound, "Hello back!");
    /// assert_eq!(reply.chat_id, "local");
    /// assert_eq!(reply.thread_id.as_deref(), Some("t1"));
    /// ```
    pub fn reply_to(msg: &InboundMessage, content: &str) -> Self {
        Self {
            channel: msg.channel.clone(),
            chat_id: msg.chat_id.clone(),
            content: content.to_string(),
            thread_id: msg.thread_id.clone(),
            reply_to_id: msg.reply_to_id.clone(),
        }
    }
}

/// Async callback a channel invokes for every accepted inbound message.
pub type MessageHandler = Arc<dyn Fn(InboundMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// The interface all transport adapters implement.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name (e.g., "cli", "feishu"), used for routing replies.
    fn name(&self) -> &str;

    /// Start the channel and deliver inbound messages to `handler`. Blocks
    /// until the channel shuts down.
    async fn start(&self, handler: MessageHandler) -> Result<()>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> Result<()>;

    /// Send an outbound message. Returns `true` when the message was sent.
    async fn send(&self, msg: OutboundMessage) -> Result<bool>;
}
