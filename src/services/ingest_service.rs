use std::sync::Arc;

use tracing::{debug, warn};

use crate::dto::webhook_dto::WebhookPayload;
use crate::error::{Error, Result};
use crate::services::message_service::MessageService;
use crate::services::normalizer::{
    normalize_payload, CanonicalEvent, InboundMessageEvent, StatusUpdateEvent,
};
use crate::services::session_service::SessionService;
use crate::store::NumberStore;

/// Bridges normalized webhook events to the conversation and message stores.
///
/// Processing is best-effort per event: a bad event never aborts its
/// siblings. Store-level failures do abort, so the caller can answer non-2xx
/// and let the provider redeliver; idempotency keys make the replay safe.
#[derive(Clone)]
pub struct IngestService {
    numbers: Arc<dyn NumberStore>,
    sessions: SessionService,
    messages: MessageService,
}

impl IngestService {
    pub fn new(
        numbers: Arc<dyn NumberStore>,
        sessions: SessionService,
        messages: MessageService,
    ) -> Self {
        Self {
            numbers,
            sessions,
            messages,
        }
    }

    pub async fn process_payload(&self, payload: &WebhookPayload) -> Result<()> {
        for event in normalize_payload(payload) {
            let outcome = match &event {
                CanonicalEvent::Inbound(ev) => self.handle_inbound(ev).await,
                CanonicalEvent::Status(ev) => self.handle_status(ev).await,
            };
            match outcome {
                Ok(()) => {}
                // Infrastructure failures bubble up so the provider retries
                // the whole delivery.
                Err(err @ Error::Database(_)) => return Err(err),
                Err(err) => {
                    warn!(error = %err, "Failed to process webhook event, continuing batch");
                }
            }
        }
        Ok(())
    }

    async fn handle_inbound(&self, event: &InboundMessageEvent) -> Result<()> {
        let Some(number) = self
            .numbers
            .find_by_provider_phone_id(&event.provider_phone_id)
            .await?
        else {
            debug!(
                provider_phone_id = %event.provider_phone_id,
                "No registered number for inbound message, skipping"
            );
            return Ok(());
        };

        let conversation = self
            .sessions
            .resolve_for_inbound(
                number.account_id,
                number.id,
                &event.from,
                event.timestamp,
                event.contact_name.as_deref(),
            )
            .await?;

        self.messages
            .record_inbound(
                conversation.id,
                &event.provider_message_id,
                event.content.clone(),
                event.timestamp,
            )
            .await?;
        Ok(())
    }

    async fn handle_status(&self, event: &StatusUpdateEvent) -> Result<()> {
        self.messages
            .apply_status_update(&event.provider_message_id, event.status)
            .await
    }
}
