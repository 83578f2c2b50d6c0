//! Error types for the inbox responder.
//!
//! Every mail, LLM and pipeline error maps onto a [`FailureKind`], which is
//! what the poll loop uses to decide between stopping, retrying next cycle,
//! giving up on a message, falling back to a template, or backing off.

use std::time::Duration;

/// How the loop should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad mailbox or API credentials. Fatal at startup.
    Auth,
    /// Timeouts and connection problems. Retried on the next poll.
    Transient,
    /// The reply can never be delivered (bad address, 5xx rejection).
    /// The message is recorded as skipped.
    Permanent,
    /// Reply generation failed. A fallback template is sent instead.
    GenerationUnavailable,
    /// Remote quota exhausted. Generation backs off.
    RateLimitExceeded,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Mailbox (IMAP/SMTP) errors.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mailbox authentication failed on {server}: {reason}")]
    AuthFailed { server: String, reason: String },

    #[error("Connection to {server} failed: {reason}")]
    Connection { server: String, reason: String },

    #[error("Operation on {server} timed out")]
    Timeout { server: String },

    #[error("Unexpected IMAP response: {0}")]
    Protocol(String),

    #[error("Invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Failed to send reply to {to}: {reason}")]
    SendFailed { to: String, reason: String },

    #[error("Reply to {to} permanently rejected: {reason}")]
    Rejected { to: String, reason: String },
}

impl MailError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthFailed { .. } => FailureKind::Auth,
            Self::InvalidAddress { .. } | Self::Build(_) | Self::Rejected { .. } => {
                FailureKind::Permanent
            }
            _ => FailureKind::Transient,
        }
    }

    /// Classify an `std::io::Error` from a socket operation.
    pub fn from_io(server: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout {
                server: server.to_string(),
            },
            _ => Self::Connection {
                server: server.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

impl LlmError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } => FailureKind::RateLimitExceeded,
            Self::AuthFailed { .. } => FailureKind::Auth,
            _ => FailureKind::GenerationUnavailable,
        }
    }
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mailbox fetch failed: {0}")]
    Fetch(MailError),

    #[error("Reply send failed: {0}")]
    Send(MailError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] DatabaseError),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch(e) | Self::Send(e) => e.kind(),
            Self::Tracker(_) => FailureKind::Transient,
            Self::Generation(e) => e.kind(),
        }
    }
}
