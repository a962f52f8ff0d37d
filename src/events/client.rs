//! Events sent from the client to the realtime server.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::error::RealtimeError;
use crate::types::{encode_audio, ConversationItem, ResponseConfig, SessionOptions};

/// All client events that can be sent to the realtime server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update the session configuration.
    #[serde(rename = "session.update")]
    SessionUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        session: SessionOptions,
    },

    /// Append base64 audio to the input buffer. Never acknowledged.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        audio: String,
    },

    /// Turn the buffered audio into a user message item.
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },

    /// Discard buffered audio.
    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: ConversationItem,
    },

    /// Cut an assistant audio message at `audio_end_ms`.
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        item_id: String,
        content_index: u32,
        audio_end_ms: u32,
    },

    #[serde(rename = "conversation.item.delete")]
    ConversationItemDelete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        item_id: String,
    },

    /// Ask the model for a response.
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    /// Stop the response currently in progress.
    #[serde(rename = "response.cancel")]
    ResponseCancel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
}

/// Discriminant of a [`ClientEvent`], displayed as its wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ClientEventKind {
    #[strum(serialize = "session.update")]
    SessionUpdate,
    #[strum(serialize = "input_audio_buffer.append")]
    InputAudioBufferAppend,
    #[strum(serialize = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
    #[strum(serialize = "input_audio_buffer.clear")]
    InputAudioBufferClear,
    #[strum(serialize = "conversation.item.create")]
    ConversationItemCreate,
    #[strum(serialize = "conversation.item.truncate")]
    ConversationItemTruncate,
    #[strum(serialize = "conversation.item.delete")]
    ConversationItemDelete,
    #[strum(serialize = "response.create")]
    ResponseCreate,
    #[strum(serialize = "response.cancel")]
    ResponseCancel,
}

impl ClientEventKind {
    /// Whether the server answers this kind with a completion event.
    ///
    /// Audio appends are streamed and never acknowledged.
    pub fn expects_completion(self) -> bool {
        !matches!(self, Self::InputAudioBufferAppend)
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl ClientEvent {
    pub fn kind(&self) -> ClientEventKind {
        match self {
            Self::SessionUpdate { .. } => ClientEventKind::SessionUpdate,
            Self::InputAudioBufferAppend { .. } => ClientEventKind::InputAudioBufferAppend,
            Self::InputAudioBufferCommit { .. } => ClientEventKind::InputAudioBufferCommit,
            Self::InputAudioBufferClear { .. } => ClientEventKind::InputAudioBufferClear,
            Self::ConversationItemCreate { .. } => ClientEventKind::ConversationItemCreate,
            Self::ConversationItemTruncate { .. } => ClientEventKind::ConversationItemTruncate,
            Self::ConversationItemDelete { .. } => ClientEventKind::ConversationItemDelete,
            Self::ResponseCreate { .. } => ClientEventKind::ResponseCreate,
            Self::ResponseCancel { .. } => ClientEventKind::ResponseCancel,
        }
    }

    /// Wire type tag (e.g. `"session.update"`).
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::SessionUpdate { event_id, .. }
            | Self::InputAudioBufferAppend { event_id, .. }
            | Self::InputAudioBufferCommit { event_id }
            | Self::InputAudioBufferClear { event_id }
            | Self::ConversationItemCreate { event_id, .. }
            | Self::ConversationItemTruncate { event_id, .. }
            | Self::ConversationItemDelete { event_id, .. }
            | Self::ResponseCreate { event_id, .. }
            | Self::ResponseCancel { event_id } => event_id.as_deref(),
        }
    }

    /// Return the correlation token, generating one if the caller left it unset.
    pub fn ensure_event_id(&mut self) -> &str {
        self.event_id_slot()
            .get_or_insert_with(|| format!("evt_{}", Uuid::new_v4().simple()))
            .as_str()
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        *self.event_id_slot() = Some(event_id.into());
        self
    }

    pub fn to_json(&self) -> Result<String, RealtimeError> {
        serde_json::to_string(self).map_err(RealtimeError::from)
    }

    fn event_id_slot(&mut self) -> &mut Option<String> {
        match self {
            Self::SessionUpdate { event_id, .. }
            | Self::InputAudioBufferAppend { event_id, .. }
            | Self::InputAudioBufferCommit { event_id }
            | Self::InputAudioBufferClear { event_id }
            | Self::ConversationItemCreate { event_id, .. }
            | Self::ConversationItemTruncate { event_id, .. }
            | Self::ConversationItemDelete { event_id, .. }
            | Self::ResponseCreate { event_id, .. }
            | Self::ResponseCancel { event_id } => event_id,
        }
    }
}

impl ClientEvent {
    pub fn session_update(session: SessionOptions) -> Self {
        Self::SessionUpdate {
            event_id: None,
            session,
        }
    }

    /// Append already base64 encoded audio.
    pub fn audio_append(audio: impl Into<String>) -> Self {
        Self::InputAudioBufferAppend {
            event_id: None,
            audio: audio.into(),
        }
    }

    /// Append raw audio bytes in the session's input format.
    pub fn audio_append_bytes(bytes: &[u8]) -> Self {
        Self::audio_append(encode_audio(bytes))
    }

    pub fn audio_commit() -> Self {
        Self::InputAudioBufferCommit { event_id: None }
    }

    pub fn audio_clear() -> Self {
        Self::InputAudioBufferClear { event_id: None }
    }

    pub fn item_create(item: ConversationItem) -> Self {
        Self::ConversationItemCreate {
            event_id: None,
            previous_item_id: None,
            item,
        }
    }

    pub fn item_create_after(previous_item_id: impl Into<String>, item: ConversationItem) -> Self {
        Self::ConversationItemCreate {
            event_id: None,
            previous_item_id: Some(previous_item_id.into()),
            item,
        }
    }

    pub fn item_truncate(item_id: impl Into<String>, content_index: u32, audio_end_ms: u32) -> Self {
        Self::ConversationItemTruncate {
            event_id: None,
            item_id: item_id.into(),
            content_index,
            audio_end_ms,
        }
    }

    pub fn item_delete(item_id: impl Into<String>) -> Self {
        Self::ConversationItemDelete {
            event_id: None,
            item_id: item_id.into(),
        }
    }

    pub fn response_create() -> Self {
        Self::ResponseCreate {
            event_id: None,
            response: None,
        }
    }

    pub fn response_create_with(config: ResponseConfig) -> Self {
        Self::ResponseCreate {
            event_id: None,
            response: Some(config),
        }
    }

    pub fn response_cancel() -> Self {
        Self::ResponseCancel { event_id: None }
    }
}
