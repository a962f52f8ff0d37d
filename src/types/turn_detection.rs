//! Server-side turn detection (voice activity detection) settings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::RealtimeError;

/// Detection mode used by the server to find speech boundaries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnDetectionType {
    #[default]
    ServerVad,
    SemanticVad,
    Disabled,
}

/// How eagerly semantic detection ends a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Eagerness {
    Low,
    Medium,
    High,
    Auto,
}

/// Turn detection configuration.
///
/// Only the fields that belong to the chosen mode are ever populated:
/// `threshold` and the padding values exist for `server_vad`, `eagerness`
/// for `semantic_vad`, and a disabled setting carries nothing and is
/// written as JSON `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceActivityDetectionSettings {
    detection_type: TurnDetectionType,
    threshold: Option<f32>,
    prefix_padding_ms: Option<u32>,
    silence_duration_ms: Option<u32>,
    eagerness: Option<Eagerness>,
}

impl VoiceActivityDetectionSettings {
    /// Build settings for `detection_type`, dropping fields the mode does not use.
    pub fn new(
        detection_type: TurnDetectionType,
        threshold: Option<f32>,
        prefix_padding_ms: Option<u32>,
        silence_duration_ms: Option<u32>,
    ) -> Self {
        match detection_type {
            TurnDetectionType::ServerVad => {
                Self::server_vad(threshold, prefix_padding_ms, silence_duration_ms)
            }
            TurnDetectionType::SemanticVad => Self::semantic_vad(None),
            TurnDetectionType::Disabled => Self::disabled(),
        }
    }

    /// Amplitude based detection.
    pub fn server_vad(
        threshold: Option<f32>,
        prefix_padding_ms: Option<u32>,
        silence_duration_ms: Option<u32>,
    ) -> Self {
        Self {
            detection_type: TurnDetectionType::ServerVad,
            threshold,
            prefix_padding_ms,
            silence_duration_ms,
            eagerness: None,
        }
    }

    /// Model based detection.
    pub fn semantic_vad(eagerness: Option<Eagerness>) -> Self {
        Self {
            detection_type: TurnDetectionType::SemanticVad,
            eagerness,
            ..Self::default()
        }
    }

    /// No server-side detection; the client commits the buffer itself.
    pub fn disabled() -> Self {
        Self {
            detection_type: TurnDetectionType::Disabled,
            ..Self::default()
        }
    }

    pub fn detection_type(&self) -> TurnDetectionType {
        self.detection_type
    }

    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }

    pub fn prefix_padding_ms(&self) -> Option<u32> {
        self.prefix_padding_ms
    }

    pub fn silence_duration_ms(&self) -> Option<u32> {
        self.silence_duration_ms
    }

    pub fn eagerness(&self) -> Option<Eagerness> {
        self.eagerness
    }

    /// Whether the server commits the input buffer on its own.
    ///
    /// With detection enabled the server issues `input_audio_buffer.committed`
    /// without a client `input_audio_buffer.commit`.
    pub fn server_commits(&self) -> bool {
        self.detection_type != TurnDetectionType::Disabled
    }

    /// Reject out-of-range parameters before they reach the server.
    pub fn validate(&self) -> Result<(), RealtimeError> {
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(RealtimeError::Configuration(format!(
                    "turn detection threshold must be within 0.0..=1.0, got {threshold}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TurnDetectionWire {
    ServerVad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    SemanticVad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eagerness: Option<Eagerness>,
    },
}

impl Serialize for VoiceActivityDetectionSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.detection_type {
            TurnDetectionType::Disabled => serializer.serialize_none(),
            TurnDetectionType::ServerVad => TurnDetectionWire::ServerVad {
                threshold: self.threshold,
                prefix_padding_ms: self.prefix_padding_ms,
                silence_duration_ms: self.silence_duration_ms,
            }
            .serialize(serializer),
            TurnDetectionType::SemanticVad => TurnDetectionWire::SemanticVad {
                eagerness: self.eagerness,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for VoiceActivityDetectionSettings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<TurnDetectionWire>::deserialize(deserializer)? {
            None => Self::disabled(),
            Some(TurnDetectionWire::ServerVad {
                threshold,
                prefix_padding_ms,
                silence_duration_ms,
            }) => Self::server_vad(threshold, prefix_padding_ms, silence_duration_ms),
            Some(TurnDetectionWire::SemanticVad { eagerness }) => Self::semantic_vad(eagerness),
        })
    }
}

/// Keep an explicit `null` distinct from an absent field.
pub(crate) fn deserialize_present<'de, D>(
    deserializer: D,
) -> Result<Option<VoiceActivityDetectionSettings>, D::Error>
where
    D: Deserializer<'de>,
{
    VoiceActivityDetectionSettings::deserialize(deserializer).map(Some)
}
