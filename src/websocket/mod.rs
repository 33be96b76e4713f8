use axum::extract::ws::Message as WsMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod events;
pub mod handlers;

use events::ServerEvent;

/// Server-side grouping of connections. User rooms give "deliver to user X"
/// semantics no matter how many sockets that user has open; conversation
/// rooms carry typing fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    User(Uuid),
    Conversation(Uuid),
}

#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<Room, Vec<UnboundedSender<WsMessage>>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(&self, room: Room, tx: UnboundedSender<WsMessage>) {
        let mut guard = self.inner.write().await;
        guard.entry(room).or_default().push(tx);
    }

    pub async fn leave(&self, room: Room, tx: &UnboundedSender<WsMessage>) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&room) {
            list.retain(|sender| !sender.same_channel(tx));
            if list.is_empty() {
                guard.remove(&room);
            }
        }
    }

    /// Best-effort fan-out; senders whose connection is gone are pruned.
    pub async fn broadcast(&self, room: Room, msg: WsMessage) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&room) {
            list.retain(|sender| sender.send(msg.clone()).is_ok());
            if list.is_empty() {
                guard.remove(&room);
            }
        }
    }

    pub async fn connection_count(&self, room: Room) -> usize {
        self.inner.read().await.get(&room).map_or(0, Vec::len)
    }
}

/// Realtime delivery handle. Constructed once at startup and handed to the
/// services so they can emit events without a global registry.
#[derive(Default, Clone)]
pub struct ChatGateway {
    registry: ConnectionRegistry,
}

impl ChatGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn emit_to_user(&self, user_id: Uuid, event: &ServerEvent) {
        self.emit(Room::User(user_id), event).await;
    }

    pub async fn emit_to_conversation(&self, conversation_id: Uuid, event: &ServerEvent) {
        self.emit(Room::Conversation(conversation_id), event).await;
    }

    async fn emit(&self, room: Room, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                self.registry
                    .broadcast(room, WsMessage::Text(payload))
                    .await;
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize realtime event"),
        }
    }
}
