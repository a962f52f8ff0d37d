//! Conversation items exchanged with the realtime server.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of a conversation item.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemType {
    #[default]
    Message,
    FunctionCall,
    FunctionCallOutput,
}

/// Completion status of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    InProgress,
    Incomplete,
}

/// Author of a message item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A content part of a message item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText {
        text: String,
    },
    InputAudio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    Text {
        text: String,
    },
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    ItemReference {
        id: String,
    },
}

impl ContentPart {
    /// Text carried by this part, falling back to the audio transcript.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::InputText { text } | Self::Text { text } => Some(text),
            Self::InputAudio { transcript, .. } | Self::Audio { transcript, .. } => {
                transcript.as_deref()
            }
            Self::ItemReference { .. } => None,
        }
    }
}

/// An item in the server-side conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(rename = "type", default)]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    fn message(role: Role, part: ContentPart) -> Self {
        Self {
            item_type: ItemType::Message,
            role: Some(role),
            content: vec![part],
            ..Default::default()
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::message(Role::User, ContentPart::InputText { text: text.into() })
    }

    pub fn system_text(text: impl Into<String>) -> Self {
        Self::message(Role::System, ContentPart::InputText { text: text.into() })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::message(Role::Assistant, ContentPart::Text { text: text.into() })
    }

    /// A user message carrying base64 encoded audio.
    pub fn user_audio(audio: impl Into<String>) -> Self {
        Self::message(
            Role::User,
            ContentPart::InputAudio {
                audio: Some(audio.into()),
                transcript: None,
            },
        )
    }

    /// The result of a function call the model asked for.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::FunctionCallOutput,
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }

    /// Concatenated text of all content parts.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentPart::text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_text_serializes_without_unset_fields() {
        let item = ConversationItem::user_text("hello");
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "type": "message",
                "role": "user",
                "content": [{"type": "input_text", "text": "hello"}]
            })
        );
    }

    #[test]
    fn text_prefers_text_then_transcript() {
        let item: ConversationItem = serde_json::from_value(json!({
            "id": "item_1",
            "type": "message",
            "role": "assistant",
            "status": "completed",
            "content": [
                {"type": "audio", "transcript": "Hi "},
                {"type": "text", "text": "there"}
            ]
        }))
        .unwrap();
        assert_eq!(item.text(), "Hi there");
        assert_eq!(item.status, Some(ItemStatus::Completed));
    }
}
