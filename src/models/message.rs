use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
    Link,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
            MessageType::Link => "link",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageType::Text),
            "image" => Some(MessageType::Image),
            "file" => Some(MessageType::File),
            "link" => Some(MessageType::Link),
            _ => None,
        }
    }
}

/// Display status derived from the mutation timestamps. Deletion outranks
/// edited-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Edited,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub url: String,
    pub mime_type: Option<String>,
    pub original_name: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub reply_to: Option<Uuid>,
    pub attachments: Vec<Attachment>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Original send time; never changes on edit or delete.
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn derive_status(
        deleted_at: Option<DateTime<Utc>>,
        edited_at: Option<DateTime<Utc>>,
    ) -> MessageStatus {
        if deleted_at.is_some() {
            MessageStatus::Deleted
        } else if edited_at.is_some() {
            MessageStatus::Edited
        } else {
            MessageStatus::Sent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_outranks_edited_in_derived_status() {
        let now = Utc::now();
        assert_eq!(Message::derive_status(None, None), MessageStatus::Sent);
        assert_eq!(
            Message::derive_status(None, Some(now)),
            MessageStatus::Edited
        );
        assert_eq!(
            Message::derive_status(Some(now), Some(now)),
            MessageStatus::Deleted
        );
        assert_eq!(
            Message::derive_status(Some(now), None),
            MessageStatus::Deleted
        );
    }

    #[test]
    fn message_type_round_trips_as_str() {
        for t in [
            MessageType::Text,
            MessageType::Image,
            MessageType::File,
            MessageType::Link,
        ] {
            assert_eq!(MessageType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MessageType::parse("audio"), None);
    }
}
