//! Middleware chain for the gateway.
//!
//! A middleware wraps message processing: it can short-circuit (return a
//! reply or no reply without calling `next`) or delegate to the rest of the
//! chain. The first middleware registered with [`Gateway::use_middleware`] is
//! the outermost wrapper.
//!
//! [`Gateway::use_middleware`]: super::Gateway::use_middleware

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::channels::InboundMessage;
use crate::error::Result;

use super::Gateway;

/// Reply sent to a sender who exceeded the rate limit.
pub const RATE_LIMIT_NOTICE: &str = "Rate limit exceeded. Please wait a moment.";

/// A link to the rest of the processing chain.
///
/// Calling [`Next::run`] invokes the next middleware, or the agent itself
/// once the chain is exhausted. Not calling it short-circuits the message.
pub struct Next<'a> {
    pub(crate) gateway: &'a Gateway,
    pub(crate) index: usize,
}

impl Next<'_> {
    /// Continue with the rest of the chain.
    pub async fn run(self, msg: &InboundMessage) -> Result<Option<String>> {
        self.gateway.run_chain(self.index, msg).await
    }
}

/// A gateway middleware.
///
/// Return values: `Ok(Some(reply))` answers the sender, `Ok(None)` drops the
/// message silently. Either can come from the middleware itself
/// (short-circuit) or from delegating to `next`.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, msg: &InboundMessage, next: Next<'_>) -> Result<Option<String>>;
}

/// Sliding-window rate limiter keyed by sender id.
///
/// Over-limit messages short-circuit with [`RATE_LIMIT_NOTICE`]. The
/// timestamp map is independent shared state with its own lock — it is
/// intentionally not tied to the per-conversation locks.
pub struct RateLimitMiddleware {
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitMiddleware {
    /// Allow `limit` messages per sender per `window`. A limit of 0 means
    /// unlimited.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Allow `limit` messages per sender per minute.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Record an arrival; returns false when the sender is over the limit.
    pub fn check(&self, sender_id: &str) -> bool {
        if self.limit == 0 {
            return true;
        }

        let now = Instant::now();
        let cutoff = now - self.window;
        let mut entries = self.entries.lock().unwrap();

        let timestamps = entries.entry(sender_id.to_string()).or_default();
        while timestamps.front().is_some_and(|&t| t <= cutoff) {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.limit as usize {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Drop senders with no activity inside the window (call periodically).
    pub fn sweep(&self) {
        let now = Instant::now();
        let cutoff = now - self.window;
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, timestamps| {
            while timestamps.front().is_some_and(|&t| t <= cutoff) {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(&self, msg: &InboundMessage, next: Next<'_>) -> Result<Option<String>> {
        if !self.check(&msg.sender_id) {
            warn!(sender = %msg.sender_id, limit = self.limit, "Sender over rate limit");
            return Ok(Some(RATE_LIMIT_NOTICE.to_string()));
        }
        next.run(msg).await
    }
}

/// Allow-list middleware: messages from unlisted senders are dropped with no
/// reply and without reaching the agent.
pub struct AllowSendersMiddleware {
    allowed: HashSet<String>,
}

impl AllowSendersMiddleware {
    pub fn new(sender_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: sender_ids.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Middleware for AllowSendersMiddleware {
    async fn handle(&self, msg: &InboundMessage, next: Next<'_>) -> Result<Option<String>> {
        if !self.allowed.contains(&msg.sender_id) {
            debug!(sender = %msg.sender_id, "Sender not in allow-list, dropping");
            return Ok(None);
        }
        next.run(msg).await
    }
}

/// Logging middleware: logs every message before and after processing and
/// always delegates.
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, msg: &InboundMessage, next: Next<'_>) -> Result<Option<String>> {
        info!(
            channel = %msg.channel,
            chat_id = %msg.chat_id,
            sender = %msg.sender_id,
            content_len = msg.content.len(),
            "Message received"
        );
        let result = next.run(msg).await;
        match &result {
            Ok(Some(reply)) => info!(reply_len = reply.len(), "Reply produced"),
            Ok(None) => info!("No reply produced"),
            Err(e) => warn!(error = %e, "Processing failed"),
        }
        result
    }
}
