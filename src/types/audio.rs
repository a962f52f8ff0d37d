//! Audio-related types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Wire audio format for input and output buffers.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AudioFormat {
    #[default]
    Pcm16,
    G711Ulaw,
    G711Alaw,
}

/// Built-in voices the model can answer with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Voice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

/// Output modality of a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Modality {
    Text,
    Audio,
}

/// Input audio transcription settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputAudioTranscription {
    pub model: String,
}

impl Default for InputAudioTranscription {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
        }
    }
}

/// Encode raw audio bytes for an `input_audio_buffer.append` payload.
pub fn encode_audio(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a base64 audio payload from an `response.audio.delta` event.
pub fn decode_audio(payload: &str) -> Option<Vec<u8>> {
    STANDARD.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_format_uses_snake_case_names() {
        assert_eq!(
            serde_json::to_string(&AudioFormat::G711Ulaw).unwrap(),
            "\"g711_ulaw\""
        );
        assert_eq!("pcm16".parse::<AudioFormat>().unwrap(), AudioFormat::Pcm16);
        assert_eq!(Voice::Shimmer.to_string(), "shimmer");
    }

    #[test]
    fn audio_payload_decodes_what_was_encoded() {
        let pcm = [0u8, 1, 2, 250, 255];
        let encoded = encode_audio(&pcm);
        assert_eq!(decode_audio(&encoded).unwrap(), pcm.to_vec());
        assert!(decode_audio("not base64!").is_none());
    }
}
