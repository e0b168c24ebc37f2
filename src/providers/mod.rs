//! Providers module - model-completion backends.
//!
//! This module defines the `LLMProvider` trait and common types for talking
//! to model APIs. Each backend (Anthropic, OpenAI-compatible) implements the
//! trait so the rest of the runtime sees a single `complete()` interface.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabby::providers::{AnthropicProvider, ChatOptions, LLMProvider};
//! use tabby::session::Message;
//!
//! async fn example() {
//!     let provider = AnthropicProvider::new("your-api-key");
//!     let messages = vec![Message::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider
//!         .complete(&messages, Some("You are helpful."), &[], &options)
//!         .await
//!         .unwrap();
//!     println!("{}", response.content.unwrap_or_default());
//! }
//! ```

pub mod anthropic;
pub mod openai;
mod types;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;
pub use types::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
