use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WhatsAppNumber {
    pub id: Uuid,
    pub account_id: Uuid,
    pub number: String,
    pub display_name: String,
    /// The provider's phone-number id, as delivered in webhook metadata.
    /// Maps an inbound payload to the owning account.
    pub provider_phone_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WhatsAppNumber {
    pub fn is_approved(&self) -> bool {
        self.status == NumberStatus::Approved.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStatus {
    Pending,
    Approved,
    Rejected,
}

impl NumberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberStatus::Pending => "pending",
            NumberStatus::Approved => "approved",
            NumberStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NumberStatus::Pending),
            "approved" => Some(NumberStatus::Approved),
            "rejected" => Some(NumberStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewWhatsAppNumber {
    pub account_id: Uuid,
    pub number: String,
    pub display_name: String,
    pub provider_phone_id: Option<String>,
    pub status: NumberStatus,
}
