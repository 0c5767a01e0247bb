use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageContent};

#[derive(Debug, Deserialize)]
pub struct ConversationListQuery {
    pub account_id: Uuid,
    pub whatsapp_number_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MessageListQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub contact_number: String,
    pub contact_name: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub status: String,
    pub whatsapp_number_id: Uuid,
    pub last_message: Option<MessageResponse>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub id: Uuid,
    pub contact_number: String,
    pub contact_name: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub session_start_at: DateTime<Utc>,
    pub session_end_at: Option<DateTime<Utc>>,
    pub status: String,
    pub whatsapp_number_id: Uuid,
}

impl From<Conversation> for ConversationDetail {
    fn from(conv: Conversation) -> Self {
        Self {
            id: conv.id,
            contact_number: conv.contact_number,
            contact_name: conv.contact_name,
            last_message_at: conv.last_message_at,
            session_start_at: conv.session_start_at,
            session_end_at: conv.session_end_at,
            status: conv.status,
            whatsapp_number_id: conv.whatsapp_number_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub message_id: String,
    pub direction: String,
    pub content: MessageContent,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub is_automated: bool,
}

impl From<Message> for MessageResponse {
    fn from(msg: Message) -> Self {
        Self {
            id: msg.id,
            message_id: msg.message_id,
            direction: msg.direction,
            content: msg.content.0,
            status: msg.status,
            timestamp: msg.timestamp,
            is_automated: msg.is_automated,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub content: SendMessageContent,
}

/// Outbound content as the dashboard submits it. Only free-form text and
/// pre-approved templates can originate locally; media goes out through
/// templates.
#[derive(Debug, Deserialize)]
pub struct SendMessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
    pub template_name: Option<String>,
    pub template_params: Option<Vec<String>>,
}

impl SendMessageContent {
    pub fn into_content(self) -> Result<MessageContent> {
        match self.kind.as_str() {
            "text" => {
                let text = self
                    .text
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| Error::BadRequest("Text message requires a body".into()))?;
                Ok(MessageContent::Text { text })
            }
            "template" => {
                let template_name = self.template_name.filter(|t| !t.is_empty()).ok_or_else(
                    || Error::BadRequest("Template message requires a template name".into()),
                )?;
                Ok(MessageContent::Template {
                    template_name,
                    template_params: self.template_params.unwrap_or_default(),
                })
            }
            other => Err(Error::BadRequest(format!(
                "Unsupported outbound message type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkReadPayload {
    pub message_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: String,
}
