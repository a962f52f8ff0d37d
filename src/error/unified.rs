//! Unified error classification and recovery.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    Connection,
    State,
    Server,
    Timeout,
    Cancelled,
    Serialization,
    Configuration,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    Reconnect,
    CheckCredentials,
    CheckConfiguration,
    CheckSessionState,
    IncreaseTimeout,
    ContactSupport,
    None,
}
