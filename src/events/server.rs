//! Events received from the realtime server.
//!
//! Each wire tag maps to one [`ServerEvent`] variant wrapping a payload
//! struct. Payload structs double as filters for
//! [`RealtimeSession::receive_updates`](crate::session::RealtimeSession::receive_updates).

use serde::{Deserialize, Serialize};

use super::{FragmentKind, RealtimeEvent, RealtimeUpdate};
use crate::error::RealtimeError;
use crate::types::{
    ContentPart, ConversationItem, RealtimeResponseResource, ServerError, SessionOptions,
};

macro_rules! server_events {
    ($( $(#[$doc:meta])* $tag:literal => $variant:ident($payload:ty), )+) => {
        /// All events the realtime server can send.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum ServerEvent {
            $( $(#[$doc])* #[serde(rename = $tag)] $variant($payload), )+
        }

        impl ServerEvent {
            /// Wire type tag (e.g. `"response.text.delta"`).
            pub fn event_type(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => $tag, )+
                }
            }

            /// Server-assigned event id.
            pub fn event_id(&self) -> Option<&str> {
                match self {
                    $( Self::$variant(payload) => payload.event_id.as_deref(), )+
                }
            }
        }

        /// Every type tag the server is known to send.
        pub const SERVER_EVENT_TYPES: &[&str] = &[$( $tag, )+];
    };
}

macro_rules! impl_update {
    ($payload:ty => $($variant:ident)|+) => {
        impl RealtimeUpdate for $payload {
            fn extract(event: RealtimeEvent) -> Result<Self, RealtimeEvent> {
                match event {
                    $( RealtimeEvent::Server(ServerEvent::$variant(payload)) => Ok(payload), )+
                    other => Err(other),
                }
            }
        }
    };
}

server_events! {
    /// The server rejected a client event or hit an internal failure.
    "error" => Error(ErrorEvent),
    "session.created" => SessionCreated(SessionEvent),
    "session.updated" => SessionUpdated(SessionEvent),
    "conversation.created" => ConversationCreated(ConversationCreatedEvent),
    "conversation.item.created" => ConversationItemCreated(ItemCreatedEvent),
    "conversation.item.input_audio_transcription.completed" =>
        InputAudioTranscriptionCompleted(TranscriptionCompletedEvent),
    "conversation.item.input_audio_transcription.failed" =>
        InputAudioTranscriptionFailed(TranscriptionFailedEvent),
    "conversation.item.truncated" => ConversationItemTruncated(ItemTruncatedEvent),
    "conversation.item.deleted" => ConversationItemDeleted(ItemDeletedEvent),
    "input_audio_buffer.committed" => InputAudioBufferCommitted(BufferCommittedEvent),
    "input_audio_buffer.cleared" => InputAudioBufferCleared(BufferClearedEvent),
    "input_audio_buffer.speech_started" => InputAudioBufferSpeechStarted(SpeechStartedEvent),
    "input_audio_buffer.speech_stopped" => InputAudioBufferSpeechStopped(SpeechStoppedEvent),
    "response.created" => ResponseCreated(ResponseEvent),
    "response.done" => ResponseDone(ResponseEvent),
    "response.output_item.added" => ResponseOutputItemAdded(OutputItemEvent),
    "response.output_item.done" => ResponseOutputItemDone(OutputItemEvent),
    "response.content_part.added" => ResponseContentPartAdded(ContentPartEvent),
    "response.content_part.done" => ResponseContentPartDone(ContentPartEvent),
    "response.text.delta" => ResponseTextDelta(TextDeltaEvent),
    "response.text.done" => ResponseTextDone(TextDoneEvent),
    "response.audio_transcript.delta" => ResponseAudioTranscriptDelta(AudioTranscriptDeltaEvent),
    "response.audio_transcript.done" => ResponseAudioTranscriptDone(AudioTranscriptDoneEvent),
    "response.audio.delta" => ResponseAudioDelta(AudioDeltaEvent),
    "response.audio.done" => ResponseAudioDone(AudioDoneEvent),
    "response.function_call_arguments.delta" =>
        ResponseFunctionCallArgumentsDelta(FunctionCallArgumentsDeltaEvent),
    "response.function_call_arguments.done" =>
        ResponseFunctionCallArgumentsDone(FunctionCallArgumentsDoneEvent),
    "rate_limits.updated" => RateLimitsUpdated(RateLimitsEvent),
}

impl ServerEvent {
    /// Parse one inbound text frame. Unknown tags are errors.
    pub fn from_json(text: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(text).map_err(RealtimeError::deserialization)
    }

    /// Delta or done fragment, judged by the tag suffix.
    pub fn fragment_kind(&self) -> Option<FragmentKind> {
        FragmentKind::from_event_type(self.event_type())
    }

    pub fn is_delta(&self) -> bool {
        self.fragment_kind() == Some(FragmentKind::Delta)
    }

    pub fn is_done(&self) -> bool {
        self.fragment_kind() == Some(FragmentKind::Done)
    }

    /// The response carried by `response.created` / `response.done`.
    pub fn response(&self) -> Option<&RealtimeResponseResource> {
        match self {
            Self::ResponseCreated(event) | Self::ResponseDone(event) => Some(&event.response),
            _ => None,
        }
    }

    /// The session carried by `session.created` / `session.updated`.
    pub fn session(&self) -> Option<&SessionOptions> {
        match self {
            Self::SessionCreated(event) | Self::SessionUpdated(event) => Some(&event.session),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub error: ServerError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub session: SessionOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCreatedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub conversation: Conversation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCreatedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    pub item: ConversationItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionCompletedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub item_id: String,
    #[serde(default)]
    pub content_index: u32,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionFailedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub item_id: String,
    #[serde(default)]
    pub content_index: u32,
    pub error: ServerError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTruncatedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub item_id: String,
    #[serde(default)]
    pub content_index: u32,
    #[serde(default)]
    pub audio_end_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDeletedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferCommittedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_item_id: Option<String>,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferClearedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechStartedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Milliseconds since session start when speech was detected.
    #[serde(default)]
    pub audio_start_ms: u32,
    /// The user message item that will be created when speech stops.
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechStoppedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub audio_end_ms: u32,
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response: RealtimeResponseResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputItemEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    #[serde(default)]
    pub output_index: u32,
    pub item: ConversationItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPartEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub part: ContentPart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDeltaEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDoneEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTranscriptDeltaEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTranscriptDoneEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub transcript: String,
}

/// Base64 audio chunk in the session output format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDeltaEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDoneEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    #[serde(default)]
    pub content_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallArgumentsDeltaEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    pub call_id: String,
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallArgumentsDoneEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub response_id: String,
    pub item_id: String,
    #[serde(default)]
    pub output_index: u32,
    pub call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub name: String,
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitsEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
}

impl_update!(ErrorEvent => Error);
impl_update!(SessionEvent => SessionCreated | SessionUpdated);
impl_update!(ConversationCreatedEvent => ConversationCreated);
impl_update!(ItemCreatedEvent => ConversationItemCreated);
impl_update!(TranscriptionCompletedEvent => InputAudioTranscriptionCompleted);
impl_update!(TranscriptionFailedEvent => InputAudioTranscriptionFailed);
impl_update!(ItemTruncatedEvent => ConversationItemTruncated);
impl_update!(ItemDeletedEvent => ConversationItemDeleted);
impl_update!(BufferCommittedEvent => InputAudioBufferCommitted);
impl_update!(BufferClearedEvent => InputAudioBufferCleared);
impl_update!(SpeechStartedEvent => InputAudioBufferSpeechStarted);
impl_update!(SpeechStoppedEvent => InputAudioBufferSpeechStopped);
impl_update!(ResponseEvent => ResponseCreated | ResponseDone);
impl_update!(OutputItemEvent => ResponseOutputItemAdded | ResponseOutputItemDone);
impl_update!(ContentPartEvent => ResponseContentPartAdded | ResponseContentPartDone);
impl_update!(TextDeltaEvent => ResponseTextDelta);
impl_update!(TextDoneEvent => ResponseTextDone);
impl_update!(AudioTranscriptDeltaEvent => ResponseAudioTranscriptDelta);
impl_update!(AudioTranscriptDoneEvent => ResponseAudioTranscriptDone);
impl_update!(AudioDeltaEvent => ResponseAudioDelta);
impl_update!(AudioDoneEvent => ResponseAudioDone);
impl_update!(FunctionCallArgumentsDeltaEvent => ResponseFunctionCallArgumentsDelta);
impl_update!(FunctionCallArgumentsDoneEvent => ResponseFunctionCallArgumentsDone);
impl_update!(RateLimitsEvent => RateLimitsUpdated);
