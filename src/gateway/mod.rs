//! Gateway module - routes channel messages to the agent.
//!
//! The gateway owns the processing pipeline for one incoming message:
//!
//! 1. admission check (send policy) — denials are silent drops
//! 2. middleware chain (first registered = outermost)
//! 3. per-conversation serialization (semaphore keyed by session key)
//! 4. session resolution (with optional daily reset)
//! 5. agent invocation — errors become a user-visible `Error: …` reply
//! 6. dispatch of a non-empty reply through the originating channel
//!
//! Messages for different session keys are processed fully concurrently;
//! messages for the same key never overlap.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tabby::gateway::{Gateway, GatewayConfig, RateLimitMiddleware};
//! use tabby::channels::CliChannel;
//! use tabby::session::SessionStore;
//!
//! let mut gateway = Gateway::new(agent, GatewayConfig::default(), SessionStore::new_memory());
//! gateway
//!     .add_channel(Arc::new(CliChannel::new()))
//!     .use_middleware(Arc::new(RateLimitMiddleware::per_minute(20)));
//! Arc::new(gateway).run().await?;
//! ```

mod middleware;

pub use middleware::{
    AllowSendersMiddleware, LoggingMiddleware, Middleware, Next, RateLimitMiddleware,
    RATE_LIMIT_NOTICE,
};

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::agent::Agent;
use crate::channels::{Channel, InboundMessage, MessageHandler, OutboundMessage};
use crate::error::{Result, TabbyError};
use crate::session::{make_session_key, ChatType, SessionStore};

/// Global admission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    /// Process messages unless another rule denies them
    Allow,
    /// Drop everything
    Deny,
}

/// Admission policy evaluated before any processing.
///
/// A denied message is dropped silently: no reply, no middleware, no session
/// access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendPolicy {
    /// Global allow/deny switch
    pub mode: PolicyMode,
    /// Channels whose messages are always dropped
    pub deny_channels: Vec<String>,
    /// When non-empty, only these senders are admitted
    pub allow_senders: Vec<String>,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Allow,
            deny_channels: Vec::new(),
            allow_senders: Vec::new(),
        }
    }
}

impl SendPolicy {
    /// Whether a message passes the admission check.
    pub fn permits(&self, msg: &InboundMessage) -> bool {
        if self.mode == PolicyMode::Deny {
            return false;
        }
        if self.deny_channels.contains(&msg.channel) {
            return false;
        }
        if !self.allow_senders.is_empty() && !self.allow_senders.contains(&msg.sender_id) {
            return false;
        }
        true
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Agent identity used in derived session keys
    pub agent_id: String,
    /// Clear sessions on the first message of a new calendar day
    pub daily_reset: bool,
    /// Admission policy
    pub send_policy: SendPolicy,
    /// Max concurrent agent runs per conversation
    pub max_concurrent_per_chat: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            agent_id: "main".to_string(),
            daily_reset: false,
            send_policy: SendPolicy::default(),
            max_concurrent_per_chat: 1,
        }
    }
}

/// Connects channels to the agent with session management and middleware.
pub struct Gateway {
    agent: Arc<Agent>,
    config: GatewayConfig,
    channels: HashMap<String, Arc<dyn Channel>>,
    middleware: Vec<Arc<dyn Middleware>>,
    sessions: SessionStore,
    /// Per-session-key admission gates; the session's own mutex is the
    /// data-safety backstop when capacity is raised above 1.
    chat_locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Gateway {
    /// Create a gateway. Register channels and middleware before calling
    /// [`Gateway::run`].
    pub fn new(agent: Arc<Agent>, config: GatewayConfig, sessions: SessionStore) -> Self {
        Self {
            agent,
            config,
            channels: HashMap::new(),
            middleware: Vec::new(),
            sessions,
            chat_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a channel. Returns `&mut self` for chaining.
    pub fn add_channel(&mut self, channel: Arc<dyn Channel>) -> &mut Self {
        info!(channel = %channel.name(), "Channel registered");
        self.channels.insert(channel.name().to_string(), channel);
        self
    }

    /// Append a middleware to the chain. The first registered middleware is
    /// the outermost wrapper. Returns `&mut self` for chaining.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// The session store backing this gateway.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Derive the canonical session key for a message.
    ///
    /// Deterministic in (channel, sender-or-group identity, configured agent
    /// id); the message content plays no part.
    pub fn derive_session_key(&self, msg: &InboundMessage) -> String {
        let (chat_type, id) = if msg.is_group {
            let id = msg
                .group_id
                .clone()
                .unwrap_or_else(|| msg.chat_id.clone());
            (ChatType::Group, id)
        } else {
            let id = if msg.sender_id.is_empty() {
                msg.chat_id.clone()
            } else {
                msg.sender_id.clone()
            };
            (ChatType::Direct, id)
        };
        make_session_key(&self.config.agent_id, &msg.channel, chat_type, &id)
    }

    /// Process one incoming message and return the reply, if any.
    ///
    /// This is the direct entry point shared by live channels and batch
    /// callers (cron jobs, one-shot CLI). Dispatching the reply back through
    /// a channel is the transport path's job ([`Gateway::run`] wires that
    /// up); direct callers just get the reply.
    pub async fn process(&self, msg: &InboundMessage) -> Result<Option<String>> {
        if !self.config.send_policy.permits(msg) {
            debug!(
                channel = %msg.channel,
                sender = %msg.sender_id,
                "Message dropped by send policy"
            );
            return Ok(None);
        }

        let request_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "request",
            request_id = %request_id,
            channel = %msg.channel,
            chat_id = %msg.chat_id,
            sender = %msg.sender_id,
        );
        self.run_chain(0, msg).instrument(span).await
    }

    /// Walk the middleware chain starting at `index`; past the end, invoke
    /// the agent.
    pub(crate) fn run_chain<'a>(
        &'a self,
        index: usize,
        msg: &'a InboundMessage,
    ) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            match self.middleware.get(index) {
                Some(mw) => {
                    let next = Next {
                        gateway: self,
                        index: index + 1,
                    };
                    mw.handle(msg, next).await
                }
                None => self.run_agent(msg).await,
            }
        })
    }

    async fn run_agent(&self, msg: &InboundMessage) -> Result<Option<String>> {
        let key = self.derive_session_key(msg);

        let semaphore = {
            let mut locks = self.chat_locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| {
                    Arc::new(Semaphore::new(self.config.max_concurrent_per_chat.max(1)))
                })
                .clone()
        };
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|_| TabbyError::Session("conversation gate closed".into()))?;

        let session = self.sessions.get(&key, self.config.daily_reset).await;
        let mut session = session.lock().await;

        info!(session = %key, content_len = msg.content.len(), "Dispatching to agent");
        match self
            .agent
            .run(&msg.content, &mut session, "", &msg.sender_id)
            .await
        {
            Ok(reply) => Ok(Some(reply)),
            Err(e) => {
                error!(session = %key, error = %e, "Agent run failed");
                Ok(Some(format!("Error: {}", e)))
            }
        }
    }

    /// Transport path: process a message, then send any non-empty reply back
    /// through the originating channel.
    async fn handle_message(&self, msg: InboundMessage) {
        match self.process(&msg).await {
            Ok(Some(reply)) if !reply.is_empty() => self.dispatch(&msg, &reply).await,
            Ok(_) => {}
            Err(e) => {
                error!(channel = %msg.channel, error = %e, "Message processing failed");
            }
        }
    }

    async fn dispatch(&self, original: &InboundMessage, reply: &str) {
        let Some(channel) = self.channels.get(&original.channel) else {
            warn!(channel = %original.channel, "No channel registered for reply");
            return;
        };
        let out = OutboundMessage::reply_to(original, reply);
        match channel.send(out).await {
            Ok(true) => {}
            Ok(false) => warn!(channel = %original.channel, "Channel declined to send reply"),
            Err(e) => error!(channel = %original.channel, error = %e, "Failed to send reply"),
        }
    }

    /// Start all registered channels and block until the first one exits.
    ///
    /// # Errors
    /// Returns an error when no channels are registered, or when a channel
    /// fails.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        if self.channels.is_empty() {
            return Err(TabbyError::Channel(
                "no channels registered; call add_channel() first".into(),
            ));
        }

        let mut tasks = tokio::task::JoinSet::new();
        for channel in self.channels.values() {
            let channel = Arc::clone(channel);
            let gateway = Arc::clone(self);
            let handler: MessageHandler = Arc::new(move |msg: InboundMessage| {
                let gateway = Arc::clone(&gateway);
                Box::pin(async move { gateway.handle_message(msg).await })
            });
            tasks.spawn(async move {
                let name = channel.name().to_string();
                (name, channel.start(handler).await)
            });
        }
        info!(channels = self.channels.len(), "Gateway started");

        let outcome = tasks.join_next().await;
        self.stop().await;
        tasks.abort_all();

        match outcome {
            Some(Ok((name, Ok(())))) => {
                info!(channel = %name, "Channel exited, gateway shutting down");
                Ok(())
            }
            Some(Ok((name, Err(e)))) => {
                error!(channel = %name, error = %e, "Channel failed");
                Err(e)
            }
            Some(Err(e)) => Err(TabbyError::Channel(format!("channel task panicked: {}", e))),
            None => Ok(()),
        }
    }

    /// Stop all registered channels.
    pub async fn stop(&self) {
        for channel in self.channels.values() {
            if let Err(e) = channel.stop().await {
                warn!(channel = %channel.name(), error = %e, "Error stopping channel");
            }
        }
    }
}
