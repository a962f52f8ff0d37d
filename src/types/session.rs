//! Negotiated session configuration.

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::audio::{AudioFormat, InputAudioTranscription, Modality, Voice};
use super::response::MaxOutputTokens;
use super::tool::ToolDefinition;
use super::turn_detection::{deserialize_present, VoiceActivityDetectionSettings};
use crate::error::RealtimeError;

/// Session options, both as requested in `session.update` and as reported
/// by `session.created` / `session.updated`.
///
/// Unset fields are omitted on the wire so an update only touches what the
/// caller set.
///
/// ```
/// use openai_realtime::types::{SessionOptions, Modality, Voice};
///
/// let options = SessionOptions::builder()
///     .model("gpt-4o-realtime-preview")
///     .modalities(vec![Modality::Text, Modality::Audio])
///     .voice(Voice::Alloy)
///     .build();
/// assert_eq!(options.voice.as_deref(), Some("alloy"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
pub struct SessionOptions {
    #[builder(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[builder(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<Modality>>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub turn_detection: Option<VoiceActivityDetectionSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_response_output_tokens: Option<MaxOutputTokens>,
}

impl SessionOptions {
    /// Check values the server would reject.
    pub fn validate(&self) -> Result<(), RealtimeError> {
        if let Some(temperature) = self.temperature {
            if !(0.6..=1.2).contains(&temperature) {
                return Err(RealtimeError::Configuration(format!(
                    "temperature must be within 0.6..=1.2, got {temperature}"
                )));
            }
        }
        if let Some(turn_detection) = &self.turn_detection {
            turn_detection.validate()?;
        }
        Ok(())
    }
}

impl From<Voice> for String {
    fn from(voice: Voice) -> Self {
        voice.to_string()
    }
}
