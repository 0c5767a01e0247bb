//! Wire types for the provider's webhook envelope.
//!
//! Every field is optional or defaulted: the provider batches heterogeneous
//! changes into one delivery and redelivers aggressively, so deserialization
//! here must be lenient. Shape decisions happen in the normalizer, not in
//! serde.

use serde::Deserialize;

/// Top-level `object` value that marks a business-account delivery.
/// Payloads with any other marker are ignored wholesale.
pub const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";

pub const FIELD_MESSAGES: &str = "messages";
pub const FIELD_MESSAGE_STATUS: &str = "message_status";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookEntry {
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: WebhookChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookChangeValue {
    pub messaging_product: Option<String>,
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<WebhookStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMetadata {
    pub display_phone_number: Option<String>,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookContact {
    pub profile: Option<WebhookProfile>,
    pub wa_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookProfile {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMessage {
    pub from: Option<String>,
    pub id: Option<String>,
    /// Epoch seconds, as a string, per the provider's format.
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<WebhookText>,
    pub image: Option<WebhookMedia>,
    pub document: Option<WebhookMedia>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookText {
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookMedia {
    pub id: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookStatus {
    pub id: Option<String>,
    pub status: Option<String>,
    pub timestamp: Option<String>,
    pub recipient_id: Option<String>,
}

/// Query parameters of the provider's subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}
