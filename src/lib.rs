//! tabby - lightweight conversational-agent runtime with durable sessions

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentConfig, AgentObserver};
pub use channels::{Channel, CliChannel, InboundMessage, OutboundMessage};
pub use config::Config;
pub use error::{Result, TabbyError};
pub use gateway::{Gateway, GatewayConfig, Middleware, SendPolicy};
pub use providers::{
    AnthropicProvider, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, OpenAIProvider,
    ToolDefinition, Usage,
};
pub use session::{Message, Role, Session, SessionStore, ToolCall, ToolResult};
pub use tools::{Tool, ToolContext, ToolRegistry};
