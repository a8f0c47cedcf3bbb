//! Error types for the command center.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Top-level result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error, aggregating every subsystem.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Environment variable {key} is not valid UTF-8")]
    NotUnicode { key: String },
}

/// Record store errors.
///
/// `RateLimited` is the classified rate-limit signal (HTTP 429 semantics) the
/// request gate recovers from; everything else is propagated to the caller.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("Rate limited by backend{}", .reset.map(|r| format!(" until {}", r.to_rfc3339())).unwrap_or_default())]
    RateLimited {
        /// Server-provided reset time, if any.
        reset: Option<DateTime<Utc>>,
    },

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// Whether this is a rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Model provider errors.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited {
        provider: String,
        retry_after: Option<std::time::Duration>,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),
}

/// Chat orchestration errors.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("Failed to persist chat message: {0}")]
    Persistence(#[from] DatabaseError),
}

/// Pipeline state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("Pipeline {0} is already finished")]
    AlreadyFinished(String),

    #[error("No stage is currently running in pipeline {0}")]
    NoRunningStage(String),

    #[error("Stage {stage} cannot move from {from} to {to}")]
    InvalidTransition {
        stage: String,
        from: String,
        to: String,
    },

    #[error("Pipeline has no stages")]
    NoStages,

    #[error("Pipeline task ended unexpectedly: {0}")]
    Join(String),
}
