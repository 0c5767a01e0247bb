use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::whatsapp_number::WhatsAppNumber;

#[derive(Debug, Deserialize, Validate)]
pub struct AddNumberPayload {
    pub account_id: Uuid,
    #[validate(custom(function = crate::utils::phone::validate_number))]
    pub number: String,
    #[validate(length(min = 2, message = "Display name must be at least 2 characters"))]
    pub display_name: String,
    pub provider_phone_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNumberPayload {
    #[validate(length(min = 2, message = "Display name must be at least 2 characters"))]
    pub display_name: Option<String>,
    pub status: Option<String>,
    pub provider_phone_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NumberListQuery {
    pub account_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct NumberResponse {
    pub id: Uuid,
    pub number: String,
    pub display_name: String,
    pub provider_phone_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<WhatsAppNumber> for NumberResponse {
    fn from(n: WhatsAppNumber) -> Self {
        Self {
            id: n.id,
            number: n.number,
            display_name: n.display_name,
            provider_phone_id: n.provider_phone_id,
            status: n.status,
            created_at: n.created_at,
        }
    }
}
