//! Error types for sqlguard.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for sqlguard operations.
#[derive(Error, Debug)]
pub enum SqlGuardError {
    /// Database connection errors (host unreachable, auth failed, pool exhausted, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, missing relations, timeouts, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// LLM API errors (rate limits, auth, timeouts, error-marked responses, etc.)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration errors (invalid config file, unknown provider, missing keys, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected by the safety filter before anything was generated or executed.
    #[error("Unsafe input: {0}")]
    Unsafe(String),

    /// Caller exceeded its admission window.
    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds.")]
    RateLimited { retry_after_secs: u64 },

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SqlGuardError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an LLM error with the given message.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a safety rejection with the given message.
    pub fn unsafe_input(msg: impl Into<String>) -> Self {
        Self::Unsafe(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Llm(_) => "LLM Error",
            Self::Config(_) => "Configuration Error",
            Self::Unsafe(_) => "Safety Rejection",
            Self::RateLimited { .. } => "Rate Limited",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Connection(_))
    }
}

/// Result type alias using SqlGuardError.
pub type Result<T> = std::result::Result<T, SqlGuardError>;
