use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::conversation::ConversationStatus;
use crate::models::message::{Message, MessageContent};
use crate::services::message_service::MessageService;
use crate::services::session_service::{SessionService, SessionVerdict};
use crate::services::whatsapp_api::WhatsAppApiClient;
use crate::store::{ConversationStore, NumberStore};

/// The single choke point for the outbound direction. Inbound messages are
/// never blocked by session state; everything going out passes through here.
#[derive(Clone)]
pub struct SendService {
    conversations: Arc<dyn ConversationStore>,
    numbers: Arc<dyn NumberStore>,
    sessions: SessionService,
    messages: MessageService,
    api: Arc<WhatsAppApiClient>,
}

impl SendService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        numbers: Arc<dyn NumberStore>,
        sessions: SessionService,
        messages: MessageService,
        api: Arc<WhatsAppApiClient>,
    ) -> Self {
        Self {
            conversations,
            numbers,
            sessions,
            messages,
            api,
        }
    }

    pub async fn send(
        &self,
        conversation_id: Uuid,
        content: MessageContent,
        is_automated: bool,
    ) -> Result<Message> {
        let conversation = self
            .conversations
            .get(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

        if conversation.status_kind() == Some(ConversationStatus::OptedOut) {
            return Err(Error::Forbidden(
                "Contact has opted out of messaging".to_string(),
            ));
        }

        let number = self
            .numbers
            .get(conversation.whatsapp_number_id)
            .await?
            .ok_or_else(|| Error::NotFound("WhatsApp number not found".to_string()))?;
        if !number.is_approved() {
            return Err(Error::Forbidden(
                "WhatsApp number is not approved for sending".to_string(),
            ));
        }

        let now = Utc::now();
        match self
            .sessions
            .check_outbound_allowed(&conversation, now)
            .await?
        {
            SessionVerdict::Allowed => {}
            SessionVerdict::Expired { .. } => {
                return Err(Error::SessionExpired(
                    "Conversation session has expired (24h limit)".to_string(),
                ));
            }
        }

        let mut message = self
            .messages
            .record_outbound(conversation_id, content.clone(), now, is_automated)
            .await?;
        self.conversations
            .touch_last_message(conversation_id, now)
            .await?;

        // The message is locally committed as `sent` regardless of how the
        // transport call goes; transport failure is reconciled as a status
        // update, not retried inline.
        if self.api.is_enabled() {
            let provider_phone_id = number
                .provider_phone_id
                .as_deref()
                .unwrap_or(&number.number);
            match self
                .api
                .send_message(provider_phone_id, &conversation.contact_number, &content)
                .await
            {
                Ok(provider_id) => {
                    self.messages
                        .confirm_provider_id(&message.message_id, &provider_id)
                        .await?;
                    message.message_id = provider_id;
                }
                Err(err) => {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %err,
                        "Transport rejected outbound message"
                    );
                    self.messages.mark_failed(&message.message_id).await?;
                    message.status = "failed".to_string();
                }
            }
        }

        Ok(message)
    }
}
