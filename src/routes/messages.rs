use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::{Message, MessageType};
use crate::services::message_service::{MessageService, NewAttachment, NewMessage};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    /// Message-id cursor; pages strictly older than it are returned.
    pub before: Option<Uuid>,
}

pub async fn get_message_history(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = MessageService::list(
        &state.db,
        user.id,
        conversation_id,
        params.limit,
        params.before,
    )
    .await?;
    Ok(Json(messages))
}

/// Send a message. The body is multipart/form-data: `content`, `type` and
/// `reply_to` text fields plus up to five file parts. File bytes are handed
/// to the out-of-scope upload pipeline; only the metadata is recorded here.
pub async fn send_message(
    State(state): State<AppState>,
    user: User,
    Path(conversation_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Message>, AppError> {
    let mut content: Option<String> = None;
    let mut message_type = MessageType::Text;
    let mut reply_to: Option<Uuid> = None;
    let mut attachments: Vec<NewAttachment> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        if let Some(file_name) = field.file_name() {
            let original_name = file_name.to_string();
            let mime_type = field.content_type().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("unreadable attachment: {e}")))?;
            if attachments.len() >= state.config.max_attachments_per_message {
                return Err(AppError::Validation(format!(
                    "at most {} attachments per message",
                    state.config.max_attachments_per_message
                )));
            }
            let url = format!("{}/{}", state.config.uploads_base_url, Uuid::new_v4());
            attachments.push(NewAttachment {
                url,
                mime_type,
                original_name,
                size_bytes: bytes.len() as i64,
            });
            continue;
        }

        match field.name() {
            Some("content") => {
                content = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("malformed content field: {e}"))
                })?);
            }
            Some("type") => {
                let raw = field.text().await.map_err(|e| {
                    AppError::Validation(format!("malformed type field: {e}"))
                })?;
                message_type = MessageType::parse(&raw)
                    .ok_or_else(|| AppError::Validation(format!("unknown message type {raw:?}")))?;
            }
            Some("reply_to") => {
                let raw = field.text().await.map_err(|e| {
                    AppError::Validation(format!("malformed reply_to field: {e}"))
                })?;
                reply_to = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::Validation("reply_to must be a message id".into()))?,
                );
            }
            _ => {}
        }
    }

    let message = MessageService::send(
        &state.db,
        &state.gateway,
        user.id,
        conversation_id,
        NewMessage {
            content,
            message_type,
            reply_to,
            attachments,
        },
    )
    .await?;
    Ok(Json(message))
}

#[derive(Deserialize)]
pub struct UpdateMessageRequest {
    pub content: String,
}

pub async fn update_message(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
    Json(body): Json<UpdateMessageRequest>,
) -> Result<Json<Message>, AppError> {
    let message =
        MessageService::edit(&state.db, &state.gateway, user.id, message_id, body.content).await?;
    Ok(Json(message))
}

#[derive(Serialize)]
pub struct DeleteMessageResponse {
    pub deleted: bool,
}

pub async fn delete_message(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
) -> Result<Json<DeleteMessageResponse>, AppError> {
    MessageService::soft_delete(&state.db, &state.gateway, user.id, message_id).await?;
    Ok(Json(DeleteMessageResponse { deleted: true }))
}

pub async fn mark_message_read(
    State(state): State<AppState>,
    user: User,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Message>, AppError> {
    let message = MessageService::mark_read(&state.db, user.id, message_id).await?;
    Ok(Json(message))
}
