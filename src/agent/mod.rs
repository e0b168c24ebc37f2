//! Agent module - the core turn loop and its context building.
//!
//! The agent is responsible for:
//!
//! - Compacting the session when it outgrows its context budget
//! - Building the system prompt (base + identity + memory + sender + time)
//! - Calling the model provider with full history and tool definitions
//! - Executing requested tool calls concurrently and feeding results back
//! - Producing the final reply and firing observer hooks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Gateway   │────>│    Agent    │────>│ LLMProvider │
//! │             │     │  (turn loop)│     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │
//!                            ▼                   ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │   Session   │     │    Tools    │
//!                     │   (JSONL)   │     │  Registry   │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod compaction;
mod context;
mod r#loop;

pub use context::ContextBuilder;
pub use r#loop::{Agent, AgentConfig, AgentObserver};
