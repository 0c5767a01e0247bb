use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Hours a messaging session stays open after it starts.
pub const SESSION_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub account_id: Uuid,
    pub whatsapp_number_id: Uuid,
    /// Canonical contact phone: digits only, with country code.
    pub contact_number: String,
    pub contact_name: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub session_start_at: DateTime<Utc>,
    pub session_end_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn status_kind(&self) -> Option<ConversationStatus> {
        ConversationStatus::parse(&self.status)
    }

    /// End of the current session window, derived, never cached.
    pub fn session_end(&self) -> DateTime<Utc> {
        self.session_start_at + chrono::Duration::hours(SESSION_WINDOW_HOURS)
    }
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub account_id: Uuid,
    pub whatsapp_number_id: Uuid,
    pub contact_number: String,
    pub contact_name: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub session_start_at: DateTime<Utc>,
    pub status: ConversationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStatus {
    Active,
    Expired,
    OptedOut,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Expired => "expired",
            ConversationStatus::OptedOut => "opted-out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ConversationStatus::Active),
            "expired" => Some(ConversationStatus::Expired),
            "opted-out" => Some(ConversationStatus::OptedOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
