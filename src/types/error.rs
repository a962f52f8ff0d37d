//! Structured error description sent by the server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error details carried by an `error` event or a failed response.
#[derive(Error, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[error("{message} ({error_type})")]
pub struct ServerError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// The client event that caused this error, when the server knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl ServerError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn is_rate_limit(&self) -> bool {
        self.error_type == "rate_limit_error"
            || self.code.as_deref() == Some("rate_limit_exceeded")
    }
}
