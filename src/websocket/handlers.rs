use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::guards::Participant;
use crate::services::identity::Identity;
use crate::state::AppState;
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::Room;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Credential presented at handshake time; realtime connections do not
    /// use cookies or headers.
    pub token: Option<String>,
}

/// Upgrade handler. Authentication happens before the upgrade completes:
/// a missing, invalid, or slow-to-verify credential never reaches a room.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = match params.token {
        Some(t) => t,
        None => {
            warn!("realtime connection rejected: no credential");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let deadline = Duration::from_secs(state.config.ws_auth_timeout_secs);
    let identity = match tokio::time::timeout(deadline, state.verifier.verify(&token)).await {
        Ok(Ok(identity)) => identity,
        Ok(Err(_)) => {
            warn!("realtime connection rejected: invalid credential");
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Err(_) => {
            warn!("realtime connection rejected: identity verifier timed out");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, identity, socket))
}

async fn handle_socket(state: AppState, identity: Identity, socket: WebSocket) {
    let user_id = identity.user_id;
    let registry = state.gateway.registry().clone();
    let (tx, mut rx) = unbounded_channel::<WsMessage>();

    // Every connection lands in its own user room first; conversation rooms
    // are joined on request.
    let mut joined: Vec<Room> = vec![Room::User(user_id)];
    registry.join(Room::User(user_id), tx.clone()).await;
    debug!(%user_id, "realtime connection joined");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Ok(event) = serde_json::from_str::<ClientEvent>(&text) {
                            handle_client_event(&state, user_id, &tx, &mut joined, event).await;
                        }
                        // Malformed frames are ignored; they must not take
                        // down the connection handler.
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    for room in joined {
        registry.leave(room, &tx).await;
    }
    debug!(%user_id, "realtime connection disconnected");
}

async fn handle_client_event(
    state: &AppState,
    user_id: Uuid,
    tx: &tokio::sync::mpsc::UnboundedSender<WsMessage>,
    joined: &mut Vec<Room>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinRoom { conversation_id } => {
            // Membership is decided server-side, not by the room name the
            // client asked for.
            match Participant::verify(&state.db, user_id, conversation_id).await {
                Ok(_) => {
                    let room = Room::Conversation(conversation_id);
                    if !joined.contains(&room) {
                        state.gateway.registry().join(room, tx.clone()).await;
                        joined.push(room);
                    }
                }
                Err(_) => {
                    warn!(%user_id, %conversation_id, "join_room refused: not a participant");
                }
            }
        }
        ClientEvent::Typing {
            conversation_id,
            is_typing,
        } => {
            // Relayed verbatim to the conversation room, never persisted.
            if !joined.contains(&Room::Conversation(conversation_id)) {
                return;
            }
            state
                .gateway
                .emit_to_conversation(
                    conversation_id,
                    &ServerEvent::UserTyping {
                        conversation_id,
                        user_id,
                        is_typing,
                    },
                )
                .await;
        }
        ClientEvent::SetOnlineStatus { is_online } => {
            // Advisory only; no presence store is maintained.
            debug!(%user_id, is_online, "presence signal");
        }
    }
}
