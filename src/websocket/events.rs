use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Events pushed to clients. Delivery is best-effort and at-least-once;
/// the REST history endpoint is the durable fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage {
        message: Message,
    },
    MessageEdited {
        message: Message,
    },
    MessageDeleted {
        message_id: Uuid,
        conversation_id: Uuid,
    },
    UserTyping {
        conversation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
}

/// Events accepted from clients. Typing and presence are relayed only,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        conversation_id: Uuid,
    },
    Typing {
        conversation_id: Uuid,
        is_typing: bool,
    },
    SetOnlineStatus {
        is_online: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_from_tagged_json() {
        let conversation_id = Uuid::new_v4();
        let raw = serde_json::json!({
            "type": "typing",
            "conversation_id": conversation_id,
            "is_typing": true
        })
        .to_string();
        let evt: ClientEvent = serde_json::from_str(&raw).unwrap();
        match evt {
            ClientEvent::Typing {
                conversation_id: c,
                is_typing,
            } => {
                assert_eq!(c, conversation_id);
                assert!(is_typing);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_client_event_is_an_error() {
        let raw = r#"{"type":"shutdown_server"}"#;
        assert!(serde_json::from_str::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn message_deleted_carries_id_only() {
        let evt = ServerEvent::MessageDeleted {
            message_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
        };
        let value = serde_json::to_value(&evt).unwrap();
        assert_eq!(value["type"], "message_deleted");
        assert!(value.get("message").is_none());
    }
}
