//! Error types for tabby.
//!
//! One crate-wide error enum built with `thiserror`. Model-backend failures
//! are propagated up to the gateway, which renders them as a user-visible
//! `Error: …` reply; tool failures never reach this type at all (they are
//! returned to the model as textual tool results).

use thiserror::Error;

/// The primary error type for tabby operations.
#[derive(Error, Debug)]
pub enum TabbyError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors (API failures, rate limits, model errors, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Channel errors (connection failures, message routing issues, etc.)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session management errors (invalid state, persistence failures, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource not found (sessions, tools, channels, etc.)
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A specialized `Result` type for tabby operations.
pub type Result<T> = std::result::Result<T, TabbyError>;
