use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Archived,
    Blocked,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Archived => "archived",
            ConversationStatus::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(ConversationStatus::Active),
            "archived" => Some(ConversationStatus::Archived),
            "blocked" => Some(ConversationStatus::Blocked),
            _ => None,
        }
    }

    /// Permitted transitions: active -> archived, active|archived -> blocked,
    /// blocked -> active (unblock). Everything else is rejected.
    pub fn can_transition_to(&self, next: ConversationStatus) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, next),
            (Active, Archived) | (Active, Blocked) | (Archived, Blocked) | (Blocked, Active)
        )
    }
}

/// A direct conversation between exactly two users. The pair is stored in
/// canonical order (low < high) so the store-level unique index holds for
/// the unordered set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub status: ConversationStatus,
    pub last_message_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn participants(&self) -> [Uuid; 2] {
        [self.participant_low, self.participant_high]
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }

    /// The "other side" of the pair relative to `user_id`.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if self.participant_low == user_id {
            Some(self.participant_high)
        } else if self.participant_high == user_id {
            Some(self.participant_low)
        } else {
            None
        }
    }
}

/// Canonical (low, high) ordering of an unordered user pair.
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_only_from_active() {
        assert!(ConversationStatus::Active.can_transition_to(ConversationStatus::Archived));
        assert!(!ConversationStatus::Archived.can_transition_to(ConversationStatus::Active));
        assert!(!ConversationStatus::Blocked.can_transition_to(ConversationStatus::Archived));
    }

    #[test]
    fn block_from_active_or_archived_and_unblock() {
        assert!(ConversationStatus::Active.can_transition_to(ConversationStatus::Blocked));
        assert!(ConversationStatus::Archived.can_transition_to(ConversationStatus::Blocked));
        assert!(ConversationStatus::Blocked.can_transition_to(ConversationStatus::Active));
        assert!(!ConversationStatus::Blocked.can_transition_to(ConversationStatus::Blocked));
    }

    #[test]
    fn self_transitions_rejected() {
        for s in [
            ConversationStatus::Active,
            ConversationStatus::Archived,
            ConversationStatus::Blocked,
        ] {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn canonical_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
    }

    #[test]
    fn other_participant_resolves_both_sides() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (low, high) = canonical_pair(a, b);
        let conv = Conversation {
            id: Uuid::new_v4(),
            participant_low: low,
            participant_high: high,
            status: ConversationStatus::Active,
            last_message_id: None,
            last_message_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(conv.other_participant(a), Some(b));
        assert_eq!(conv.other_participant(b), Some(a));
        assert_eq!(conv.other_participant(Uuid::new_v4()), None);
    }
}
