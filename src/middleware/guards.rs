//! Authorization guards that carry the permission check in the type, so a
//! handler cannot accidentally skip it.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Conversation;
use crate::services::conversation_service::ConversationService;
use crate::services::identity::Identity;

/// The authenticated caller, extracted from the identity the auth
/// middleware placed in request extensions.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub role: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)?;
        Ok(User {
            id: identity.user_id,
            role: identity.role,
        })
    }
}

/// A caller verified to be one of the two participants of a conversation.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: Uuid,
    pub conversation: Conversation,
}

impl Participant {
    pub async fn verify(
        db: &PgPool,
        user_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<Self, AppError> {
        let conversation =
            ConversationService::get_for_participant(db, user_id, conversation_id).await?;
        Ok(Participant {
            user_id,
            conversation,
        })
    }

    /// The other side of the pair.
    pub fn peer(&self) -> Uuid {
        // verify() guarantees membership, so the other side exists.
        self.conversation
            .other_participant(self.user_id)
            .unwrap_or(self.user_id)
    }
}
