pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ConversationStatus};
pub use message::{Attachment, Message, MessageStatus, MessageType};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Denormalized display info for the other participant in a listing,
/// sourced from the user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}
