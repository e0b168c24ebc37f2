//! Channels module - transport adapters.
//!
//! A channel connects a chat platform to the gateway: it listens for
//! platform events, converts them to [`InboundMessage`]s, hands them to the
//! gateway's handler, and delivers [`OutboundMessage`]s back to the platform.
//!
//! Implementing a new channel means implementing the [`Channel`] trait:
//!
//! ```ignore
//! use async_trait::async_trait;
//! use tabby::channels::{Channel, InboundMessage, MessageHandler, OutboundMessage};
//! use tabby::error::Result;
//!
//! struct MyChannel;
//!
//! #[async_trait]
//! impl Channel for MyChannel {
//!     fn name(&self) -> &str { "my_platform" }
//!
//!     async fn start(&self, handler: MessageHandler) -> Result<()> {
//!         // Subscribe to platform events; for each accepted message:
//!         // handler(InboundMessage::new(self.name(), sender, chat, text)).await;
//!         Ok(())
//!     }
//!
//!     async fn stop(&self) -> Result<()> { Ok(()) }
//!
//!     async fn send(&self, msg: OutboundMessage) -> Result<bool> {
//!         // Deliver msg.content to msg.chat_id via the platform API
//!         Ok(true)
//!     }
//! }
//! ```
//!
//! Deduplication of platform message ids and group-mention filtering belong
//! here, before the handler is invoked — the gateway processes every message
//! it receives.

mod cli;
mod types;

pub use cli::CliChannel;
pub use types::{Channel, InboundMessage, MessageHandler, OutboundMessage};
