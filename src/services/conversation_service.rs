use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::canonical_pair;
use crate::models::{Conversation, ConversationStatus, UserSummary};
use crate::services::identity::UserDirectory;

/// One entry in a user's inbox: the conversation, the other participant's
/// display info, and how many messages addressed to the caller are unread.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConversationListing {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other: UserSummary,
    pub unread_count: i64,
}

pub struct ConversationService;

impl ConversationService {
    fn from_row(row: &PgRow) -> AppResult<Conversation> {
        let status_str: String = row.get("status");
        let status = ConversationStatus::parse(&status_str).ok_or(AppError::Internal)?;
        Ok(Conversation {
            id: row.get("id"),
            participant_low: row.get("participant_low"),
            participant_high: row.get("participant_high"),
            status,
            last_message_id: row.get("last_message_id"),
            last_message_at: row.get("last_message_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Idempotent create-or-get for the conversation between `caller_id` and
    /// `other_user_id`. Returns the conversation and whether this call
    /// created it.
    ///
    /// Two racing creators both hit the unique (participant_low,
    /// participant_high) index; the loser's insert is a no-op and it reads
    /// the winner's row instead of surfacing a duplicate-key error.
    pub async fn create_or_get(
        db: &PgPool,
        users: &dyn UserDirectory,
        caller_id: Uuid,
        other_user_id: Uuid,
    ) -> AppResult<(Conversation, bool)> {
        if other_user_id == caller_id {
            return Err(AppError::Validation(
                "cannot start a conversation with yourself".into(),
            ));
        }
        if !users.exists(other_user_id).await? {
            return Err(AppError::NotFound);
        }

        let (low, high) = canonical_pair(caller_id, other_user_id);
        let result = sqlx::query(
            "INSERT INTO conversations (id, participant_low, participant_high) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (participant_low, participant_high) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(low)
        .bind(high)
        .execute(db)
        .await?;
        let created = result.rows_affected() > 0;

        let row = sqlx::query(
            "SELECT id, participant_low, participant_high, status, last_message_id, \
                    last_message_at, created_at, updated_at \
             FROM conversations \
             WHERE participant_low = $1 AND participant_high = $2",
        )
        .bind(low)
        .bind(high)
        .fetch_one(db)
        .await?;

        Ok((Self::from_row(&row)?, created))
    }

    pub async fn get_by_id(db: &PgPool, conversation_id: Uuid) -> AppResult<Conversation> {
        let row = sqlx::query(
            "SELECT id, participant_low, participant_high, status, last_message_id, \
                    last_message_at, created_at, updated_at \
             FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        Self::from_row(&row)
    }

    /// Fetch a conversation the caller participates in. Existence is checked
    /// before authorization so the 404/403 decision is uniform.
    pub async fn get_for_participant(
        db: &PgPool,
        caller_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = Self::get_by_id(db, conversation_id).await?;
        if !conversation.is_participant(caller_id) {
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }

    /// Inbox listing ordered by most recent activity (conversation creation
    /// time when no message has been sent yet).
    pub async fn list_for_user(
        db: &PgPool,
        caller_id: Uuid,
        exclude_blocked: bool,
    ) -> AppResult<Vec<ConversationListing>> {
        let blocked_filter = if exclude_blocked {
            "AND c.status <> 'blocked'"
        } else {
            ""
        };
        let query_sql = format!(
            "SELECT c.id, c.participant_low, c.participant_high, c.status, \
                    c.last_message_id, c.last_message_at, c.created_at, c.updated_at, \
                    u.id AS other_id, u.display_name, u.avatar_url, \
                    (SELECT COUNT(*) FROM messages m \
                      WHERE m.conversation_id = c.id \
                        AND m.recipient_id = $1 \
                        AND m.read_at IS NULL \
                        AND m.deleted_at IS NULL) AS unread_count \
             FROM conversations c \
             JOIN users u ON u.id = CASE WHEN c.participant_low = $1 \
                                         THEN c.participant_high \
                                         ELSE c.participant_low END \
             WHERE (c.participant_low = $1 OR c.participant_high = $1) {} \
             ORDER BY COALESCE(c.last_message_at, c.created_at) DESC \
             LIMIT 100",
            blocked_filter
        );

        let rows = sqlx::query(&query_sql).bind(caller_id).fetch_all(db).await?;
        rows.iter()
            .map(|row| {
                Ok(ConversationListing {
                    conversation: Self::from_row(row)?,
                    other: UserSummary {
                        id: row.get("other_id"),
                        display_name: row.get("display_name"),
                        avatar_url: row.get("avatar_url"),
                    },
                    unread_count: row.get("unread_count"),
                })
            })
            .collect()
    }

    /// Apply a status transition requested by a participant. Illegal
    /// transitions are rejected and leave the stored status untouched.
    pub async fn set_status(
        db: &PgPool,
        caller_id: Uuid,
        conversation_id: Uuid,
        new_status: ConversationStatus,
    ) -> AppResult<Conversation> {
        let mut conversation = Self::get_for_participant(db, caller_id, conversation_id).await?;
        if !conversation.status.can_transition_to(new_status) {
            return Err(AppError::Validation(format!(
                "cannot transition conversation from {} to {}",
                conversation.status.as_str(),
                new_status.as_str()
            )));
        }

        let row = sqlx::query(
            "UPDATE conversations SET status = $1, updated_at = NOW() \
             WHERE id = $2 \
             RETURNING updated_at",
        )
        .bind(new_status.as_str())
        .bind(conversation_id)
        .fetch_one(db)
        .await?;

        conversation.status = new_status;
        conversation.updated_at = row.get("updated_at");
        Ok(conversation)
    }
}
