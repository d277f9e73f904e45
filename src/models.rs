use serde::{Deserialize, Serialize};
use serde_json::Value;

// Number of message characters shown in a history preview
const PREVIEW_CHARS: usize = 100;

// A stored interaction: user message, optional image and the received response
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: i64,
    pub timestamp: i64, // Milliseconds since epoch
    pub message: String,
    pub image: Option<String>, // Data URI
    pub image_filename: Option<String>,
    pub response: Value, // Opaque API payload, stored verbatim
}

impl Conversation {
    /// Short form of the message for history listings.
    pub fn preview(&self) -> String {
        let mut chars = self.message.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

// What a caller hands to the store. Any `id` in imported JSON is dropped here
// since the struct has no such field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationInput {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub response: Value,
    // Stamped by the store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ConversationInput {
    pub fn new(message: impl Into<String>, response: Value) -> Self {
        Self {
            message: message.into(),
            response,
            ..Default::default()
        }
    }

    pub fn with_image(mut self, data_uri: String, filename: Option<String>) -> Self {
        self.image = Some(data_uri);
        self.image_filename = filename;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<Conversation> for ConversationInput {
    fn from(conversation: Conversation) -> Self {
        Self {
            message: conversation.message,
            image: conversation.image,
            image_filename: conversation.image_filename,
            response: conversation.response,
            timestamp: Some(conversation.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation(message: &str) -> Conversation {
        Conversation {
            id: 1,
            timestamp: 1_700_000_000_000,
            message: message.to_string(),
            image: None,
            image_filename: None,
            response: Value::Null,
        }
    }

    #[test]
    fn preview_keeps_short_messages_whole() {
        assert_eq!(conversation("hello").preview(), "hello");
        assert_eq!(conversation(&"a".repeat(100)).preview(), "a".repeat(100));
    }

    #[test]
    fn preview_truncates_long_messages_on_char_boundaries() {
        let message = "é".repeat(150);
        let preview = conversation(&message).preview();
        assert_eq!(preview, format!("{}...", "é".repeat(100)));
    }

    #[test]
    fn serializes_with_camel_case_fields_and_nulls() {
        let value = serde_json::to_value(conversation("hi")).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 1,
                "timestamp": 1_700_000_000_000i64,
                "message": "hi",
                "image": null,
                "imageFilename": null,
                "response": null
            })
        );
    }

    #[test]
    fn input_ignores_id_and_fills_defaults() {
        let input: ConversationInput =
            serde_json::from_str(r#"{"id": 42, "imageFilename": "cat.png", "extra": true}"#).unwrap();
        assert_eq!(input.message, "");
        assert_eq!(input.image, None);
        assert_eq!(input.image_filename.as_deref(), Some("cat.png"));
        assert_eq!(input.response, Value::Null);
        assert_eq!(input.timestamp, None);
    }

    #[test]
    fn input_from_conversation_keeps_timestamp() {
        let mut stored = conversation("hi");
        stored.image = Some("data:image/png;base64,AA==".to_string());
        let input = ConversationInput::from(stored.clone());
        assert_eq!(input.timestamp, Some(stored.timestamp));
        assert_eq!(input.image, stored.image);
        assert!(stored.has_image());
    }
}
