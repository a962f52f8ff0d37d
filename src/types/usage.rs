//! Token usage reported on completed responses.

use serde::{Deserialize, Serialize};

/// Token usage for one response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_token_details: Option<InputTokenDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_token_details: Option<OutputTokenDetails>,
}

/// Breakdown of input tokens.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InputTokenDetails {
    #[serde(default)]
    pub cached_tokens: u32,
    #[serde(default)]
    pub text_tokens: u32,
    #[serde(default)]
    pub audio_tokens: u32,
}

/// Breakdown of output tokens.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputTokenDetails {
    #[serde(default)]
    pub text_tokens: u32,
    #[serde(default)]
    pub audio_tokens: u32,
}

impl Usage {
    /// Merge another usage into this one (accumulate).
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
        if let Some(details) = &other.input_token_details {
            let total = self.input_token_details.get_or_insert_with(Default::default);
            total.cached_tokens += details.cached_tokens;
            total.text_tokens += details.text_tokens;
            total.audio_tokens += details.audio_tokens;
        }
        if let Some(details) = &other.output_token_details {
            let total = self.output_token_details.get_or_insert_with(Default::default);
            total.text_tokens += details.text_tokens;
            total.audio_tokens += details.audio_tokens;
        }
    }
}
