use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Attachment, Message, MessageType};
use crate::services::conversation_service::ConversationService;
use crate::websocket::events::ServerEvent;
use crate::websocket::ChatGateway;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;
pub const MAX_ATTACHMENTS: usize = 5;

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub url: String,
    pub mime_type: Option<String>,
    pub original_name: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: Option<String>,
    pub message_type: MessageType,
    pub reply_to: Option<Uuid>,
    pub attachments: Vec<NewAttachment>,
}

pub struct MessageService;

impl MessageService {
    fn from_row(row: &PgRow) -> AppResult<Message> {
        let type_str: String = row.get("message_type");
        let message_type = MessageType::parse(&type_str).ok_or(AppError::Internal)?;
        let read_at: Option<DateTime<Utc>> = row.get("read_at");
        let edited_at: Option<DateTime<Utc>> = row.get("edited_at");
        let deleted_at: Option<DateTime<Utc>> = row.get("deleted_at");
        Ok(Message {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            recipient_id: row.get("recipient_id"),
            content: row.get("content"),
            message_type,
            reply_to: row.get("reply_to"),
            attachments: Vec::new(),
            read: read_at.is_some(),
            read_at,
            edited: edited_at.is_some(),
            edited_at,
            deleted: deleted_at.is_some(),
            deleted_at,
            created_at: row.get("created_at"),
            status: Message::derive_status(deleted_at, edited_at),
        })
    }

    async fn load_attachments(
        db: &PgPool,
        message_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<Attachment>>> {
        if message_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            "SELECT message_id, id, url, mime_type, original_name, size_bytes \
             FROM message_attachments \
             WHERE message_id = ANY($1) \
             ORDER BY position ASC",
        )
        .bind(message_ids)
        .fetch_all(db)
        .await?;

        let mut map: HashMap<Uuid, Vec<Attachment>> = HashMap::new();
        for row in rows {
            let message_id: Uuid = row.get("message_id");
            map.entry(message_id).or_default().push(Attachment {
                id: row.get("id"),
                url: row.get("url"),
                mime_type: row.get("mime_type"),
                original_name: row.get("original_name"),
                size_bytes: row.get("size_bytes"),
            });
        }
        Ok(map)
    }

    pub async fn get(db: &PgPool, message_id: Uuid) -> AppResult<Message> {
        let row = sqlx::query(
            "SELECT id, conversation_id, sender_id, recipient_id, content, message_type, \
                    reply_to, read_at, edited_at, deleted_at, created_at \
             FROM messages WHERE id = $1",
        )
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        let mut message = Self::from_row(&row)?;
        let mut attachments = Self::load_attachments(db, &[message.id]).await?;
        message.attachments = attachments.remove(&message.id).unwrap_or_default();
        Ok(message)
    }

    /// Persist a new message and move the owning conversation's last-message
    /// pointer, as one transaction. The realtime event goes out only after
    /// commit so a notified client can always read what it was told about.
    pub async fn send(
        db: &PgPool,
        gateway: &ChatGateway,
        caller_id: Uuid,
        conversation_id: Uuid,
        new: NewMessage,
    ) -> AppResult<Message> {
        let conversation =
            ConversationService::get_for_participant(db, caller_id, conversation_id).await?;
        let recipient_id = conversation
            .other_participant(caller_id)
            .ok_or(AppError::Forbidden)?;

        let content = new.content.unwrap_or_default();
        if content.trim().is_empty() && new.attachments.is_empty() {
            return Err(AppError::Validation(
                "message content is required unless attachments are present".into(),
            ));
        }
        if new.attachments.len() > MAX_ATTACHMENTS {
            return Err(AppError::Validation(format!(
                "at most {MAX_ATTACHMENTS} attachments per message"
            )));
        }
        if let Some(reply_to) = new.reply_to {
            let parent: Option<Uuid> =
                sqlx::query_scalar("SELECT conversation_id FROM messages WHERE id = $1")
                    .bind(reply_to)
                    .fetch_optional(db)
                    .await?;
            if parent != Some(conversation_id) {
                return Err(AppError::Validation(
                    "reply_to must reference a message in the same conversation".into(),
                ));
            }
        }

        let message_id = Uuid::new_v4();
        let created_at = Utc::now();

        let mut tx = db.begin().await?;
        sqlx::query(
            "INSERT INTO messages \
               (id, conversation_id, sender_id, recipient_id, content, message_type, reply_to, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(message_id)
        .bind(conversation_id)
        .bind(caller_id)
        .bind(recipient_id)
        .bind(&content)
        .bind(new.message_type.as_str())
        .bind(new.reply_to)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        let mut attachments = Vec::with_capacity(new.attachments.len());
        for (position, att) in new.attachments.iter().enumerate() {
            let attachment_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO message_attachments \
                   (id, message_id, url, mime_type, original_name, size_bytes, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(attachment_id)
            .bind(message_id)
            .bind(&att.url)
            .bind(&att.mime_type)
            .bind(&att.original_name)
            .bind(att.size_bytes)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
            attachments.push(Attachment {
                id: attachment_id,
                url: att.url.clone(),
                mime_type: att.mime_type.clone(),
                original_name: att.original_name.clone(),
                size_bytes: att.size_bytes,
            });
        }

        sqlx::query(
            "UPDATE conversations \
             SET last_message_id = $1, last_message_at = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(message_id)
        .bind(created_at)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let message = Message {
            id: message_id,
            conversation_id,
            sender_id: caller_id,
            recipient_id,
            content,
            message_type: new.message_type,
            reply_to: new.reply_to,
            attachments,
            read: false,
            read_at: None,
            edited: false,
            edited_at: None,
            deleted: false,
            deleted_at: None,
            created_at,
            status: Message::derive_status(None, None),
        };

        gateway
            .emit_to_user(
                recipient_id,
                &ServerEvent::NewMessage {
                    message: message.clone(),
                },
            )
            .await;

        Ok(message)
    }

    /// Replace the content of a message the caller sent. `created_at` is
    /// preserved; only `edited_at` moves.
    pub async fn edit(
        db: &PgPool,
        gateway: &ChatGateway,
        caller_id: Uuid,
        message_id: Uuid,
        new_content: String,
    ) -> AppResult<Message> {
        let mut message = Self::get(db, message_id).await?;
        if message.sender_id != caller_id {
            return Err(AppError::Forbidden);
        }
        if message.deleted {
            return Err(AppError::Conflict("cannot edit a deleted message".into()));
        }
        if new_content.trim().is_empty() {
            return Err(AppError::Validation("message content cannot be empty".into()));
        }

        let row = sqlx::query(
            "UPDATE messages SET content = $1, edited_at = NOW() WHERE id = $2 \
             RETURNING edited_at",
        )
        .bind(&new_content)
        .bind(message_id)
        .fetch_one(db)
        .await?;

        message.content = new_content;
        message.edited = true;
        message.edited_at = row.get("edited_at");
        message.status = Message::derive_status(message.deleted_at, message.edited_at);

        gateway
            .emit_to_user(
                message.recipient_id,
                &ServerEvent::MessageEdited {
                    message: message.clone(),
                },
            )
            .await;

        Ok(message)
    }

    /// Soft-delete a message the caller sent. Idempotent: repeating the call
    /// neither errors nor moves `deleted_at`. When the deleted message was
    /// the conversation's newest, the last-message pointer falls back to the
    /// most recent surviving message.
    pub async fn soft_delete(
        db: &PgPool,
        gateway: &ChatGateway,
        caller_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<()> {
        let message = Self::get(db, message_id).await?;
        if message.sender_id != caller_id {
            return Err(AppError::Forbidden);
        }
        if message.deleted {
            return Ok(());
        }

        let mut tx = db.begin().await?;
        sqlx::query("UPDATE messages SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE conversations c \
             SET last_message_id = m.id, last_message_at = m.created_at \
             FROM (SELECT id, created_at FROM messages \
                   WHERE conversation_id = $1 AND deleted_at IS NULL \
                   ORDER BY created_at DESC, id DESC LIMIT 1) m \
             WHERE c.id = $1 AND c.last_message_id = $2",
        )
        .bind(message.conversation_id)
        .bind(message_id)
        .execute(&mut *tx)
        .await?;
        // No survivors: clear the pointer entirely.
        sqlx::query(
            "UPDATE conversations SET last_message_id = NULL, last_message_at = NULL \
             WHERE id = $1 AND last_message_id = $2",
        )
        .bind(message.conversation_id)
        .bind(message_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        gateway
            .emit_to_user(
                message.recipient_id,
                &ServerEvent::MessageDeleted {
                    message_id,
                    conversation_id: message.conversation_id,
                },
            )
            .await;

        Ok(())
    }

    /// Recipient-only read marking. A second call is a no-op and leaves the
    /// original `read_at` in place.
    pub async fn mark_read(db: &PgPool, caller_id: Uuid, message_id: Uuid) -> AppResult<Message> {
        let message = Self::get(db, message_id).await?;
        if message.recipient_id != caller_id {
            return Err(AppError::Forbidden);
        }
        if message.read {
            return Ok(message);
        }

        sqlx::query("UPDATE messages SET read_at = NOW() WHERE id = $1 AND read_at IS NULL")
            .bind(message_id)
            .execute(db)
            .await?;

        // Re-read for the authoritative timestamp; a concurrent marker may
        // have won the update.
        Self::get(db, message_id).await
    }

    /// Mark every unread message addressed to the caller in this
    /// conversation. Messages the caller sent are untouched.
    pub async fn mark_conversation_read(
        db: &PgPool,
        caller_id: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<u64> {
        ConversationService::get_for_participant(db, caller_id, conversation_id).await?;
        let result = sqlx::query(
            "UPDATE messages SET read_at = NOW() \
             WHERE conversation_id = $1 AND recipient_id = $2 AND read_at IS NULL",
        )
        .bind(conversation_id)
        .bind(caller_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Chronological (oldest-first) page of non-deleted messages. Without a
    /// cursor the newest page is returned; `before` is a message id whose
    /// (created_at, id) keyset bounds the next older page.
    pub async fn list(
        db: &PgPool,
        caller_id: Uuid,
        conversation_id: Uuid,
        limit: Option<i64>,
        before: Option<Uuid>,
    ) -> AppResult<Vec<Message>> {
        ConversationService::get_for_participant(db, caller_id, conversation_id).await?;
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let cursor = match before {
            Some(before_id) => {
                let row = sqlx::query(
                    "SELECT created_at FROM messages WHERE id = $1 AND conversation_id = $2",
                )
                .bind(before_id)
                .bind(conversation_id)
                .fetch_optional(db)
                .await?
                .ok_or_else(|| {
                    AppError::Validation("before cursor does not reference a message in this conversation".into())
                })?;
                let created_at: DateTime<Utc> = row.get("created_at");
                Some((created_at, before_id))
            }
            None => None,
        };

        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, recipient_id, content, message_type, \
                            reply_to, read_at, edited_at, deleted_at, created_at \
                     FROM messages \
                     WHERE conversation_id = $1 AND deleted_at IS NULL \
                       AND (created_at, id) < ($2, $3) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(conversation_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, conversation_id, sender_id, recipient_id, content, message_type, \
                            reply_to, read_at, edited_at, deleted_at, created_at \
                     FROM messages \
                     WHERE conversation_id = $1 AND deleted_at IS NULL \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(db)
                .await?
            }
        };

        let mut messages = rows
            .iter()
            .map(Self::from_row)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();

        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
        let mut attachments = Self::load_attachments(db, &ids).await?;
        for message in &mut messages {
            message.attachments = attachments.remove(&message.id).unwrap_or_default();
        }
        Ok(messages)
    }
}
