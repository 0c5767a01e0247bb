use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Days a message is retained before the sweeper deletes it.
pub const MESSAGE_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// Provider-assigned id for inbound messages; locally generated for
    /// outbound sends until the transport confirms. Unique, used as the
    /// idempotency key for redelivered webhooks.
    pub message_id: String,
    pub direction: String,
    pub content: Json<MessageContent>,
    pub status: String,
    /// Provider-reported timestamp, not insertion time.
    pub timestamp: DateTime<Utc>,
    pub is_automated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub message_id: String,
    pub direction: MessageDirection,
    pub content: MessageContent,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    pub is_automated: bool,
}

/// Closed union over the provider's message payload shapes, validated at the
/// normalizer boundary. Unrecognized provider types land on `Unknown` so the
/// message is still recorded and can be enriched later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        media_id: String,
    },
    Document {
        media_id: String,
    },
    Template {
        template_name: String,
        #[serde(default)]
        template_params: Vec<String>,
    },
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDirection::Inbound => "inbound",
            MessageDirection::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }

    /// Position in the delivery lifecycle. Status webhooks arrive at least
    /// once and out of order; a lower-ranked update never overwrites a
    /// higher-ranked one. `failed` sits above the whole ladder because it is
    /// reachable from any state.
    pub fn rank(&self) -> u8 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
            MessageStatus::Failed => 3,
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
