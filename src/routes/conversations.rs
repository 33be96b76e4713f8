use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::{Conversation, ConversationStatus};
use crate::services::conversation_service::{ConversationListing, ConversationService};
use crate::services::message_service::MessageService;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub participant_id: Uuid,
}

#[derive(Deserialize)]
pub struct ListConversationsParams {
    #[serde(default)]
    pub exclude_blocked: bool,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    user: User,
    Query(params): Query<ListConversationsParams>,
) -> Result<Json<Vec<ConversationListing>>, AppError> {
    let listings =
        ConversationService::list_for_user(&state.db, user.id, params.exclude_blocked).await?;
    Ok(Json(listings))
}

/// Create-or-get: 201 when this call created the pair's conversation,
/// 200 when it already existed.
pub async fn create_conversation(
    State(state): State<AppState>,
    user: User,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    let (conversation, created) =
        ConversationService::create_or_get(&state.db, state.users.as_ref(), user.id, body.participant_id)
            .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(conversation)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = ConversationService::get_for_participant(&state.db, user.id, id).await?;
    Ok(Json(conversation))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub marked_read: u64,
}

pub async fn mark_conversation_read(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let marked_read = MessageService::mark_conversation_read(&state.db, user.id, id).await?;
    Ok(Json(MarkReadResponse { marked_read }))
}

pub async fn archive_conversation(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    let conversation =
        ConversationService::set_status(&state.db, user.id, id, ConversationStatus::Archived)
            .await?;
    Ok(Json(conversation))
}

pub async fn block_conversation(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    let conversation =
        ConversationService::set_status(&state.db, user.id, id, ConversationStatus::Blocked)
            .await?;
    Ok(Json(conversation))
}

pub async fn unblock_conversation(
    State(state): State<AppState>,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, AppError> {
    let conversation =
        ConversationService::set_status(&state.db, user.id, id, ConversationStatus::Active)
            .await?;
    Ok(Json(conversation))
}
