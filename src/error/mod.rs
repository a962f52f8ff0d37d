//! Error types for realtime sessions.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::types::{ResponseStatus, ServerError};

/// Primary error type for all realtime operations.
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Connection is not open (state: {0})")]
    ConnectionNotOpen(crate::transport::ConnectionState),

    #[error("Connection closed while waiting for {0}")]
    ConnectionClosed(String),

    #[error("Server error: {0}")]
    Protocol(#[source] ServerError),

    #[error("Response {response_id} ended with status {status}: {reason}")]
    ResponseFailed {
        response_id: String,
        status: ResponseStatus,
        reason: String,
    },

    #[error("Timeout after {after_ms}ms waiting for {event_type}")]
    Timeout { event_type: String, after_ms: u64 },

    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("Deserialization error: {message}")]
    Deserialization {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl RealtimeError {
    /// Create a connection failure from a plain message.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failure wrapping the underlying cause.
    pub fn connection_failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a deserialization error for an inbound frame.
    pub fn deserialization(source: serde_json::Error) -> Self {
        Self::Deserialization {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// The structured server error, when this failure came from an `error` event.
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Protocol(error) => Some(error),
            _ => None,
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionClosed(_) | Self::Transport(_) => {
                ErrorCategory::Connection
            }
            Self::ConnectionNotOpen(_) | Self::InvalidState(_) => ErrorCategory::State,
            Self::Protocol(_) | Self::ResponseFailed { .. } => ErrorCategory::Server,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
            Self::Deserialization { .. } | Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Authentication(_) => ErrorCategory::Authentication,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Protocol(error) => error.is_rate_limit(),
            _ => matches!(
                self.category(),
                ErrorCategory::Connection | ErrorCategory::Timeout
            ),
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::Connection => RecoverySuggestion::Reconnect,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::State => RecoverySuggestion::CheckSessionState,
            ErrorCategory::Server if self.is_retryable() => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Cancelled => RecoverySuggestion::None,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, RealtimeError>;
