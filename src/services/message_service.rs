use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::message::{Message, MessageContent, MessageDirection, MessageStatus, NewMessage};
use crate::store::{MessageStore, StatusUpdateOutcome};

/// Idempotent persistence of inbound messages and status updates, plus local
/// recording of outbound sends.
#[derive(Clone)]
pub struct MessageService {
    messages: Arc<dyn MessageStore>,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self { messages }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.messages
    }

    /// Record an inbound message keyed on the provider id. Redelivered
    /// webhooks return the existing record unchanged.
    pub async fn record_inbound(
        &self,
        conversation_id: Uuid,
        provider_message_id: &str,
        content: MessageContent,
        timestamp: DateTime<Utc>,
    ) -> Result<Message> {
        let (message, created) = self
            .messages
            .insert_unique(NewMessage {
                conversation_id,
                message_id: provider_message_id.to_string(),
                direction: MessageDirection::Inbound,
                content,
                // Inbound messages have, by definition, reached us.
                status: MessageStatus::Delivered,
                timestamp,
                is_automated: false,
            })
            .await?;

        if created {
            info!(
                message_id = %message.message_id,
                conversation_id = %conversation_id,
                "Recorded inbound message"
            );
        } else {
            debug!(
                message_id = %message.message_id,
                "Duplicate inbound delivery, returning existing record"
            );
        }
        Ok(message)
    }

    /// Apply a delivery-status webhook. Drops updates for unobserved message
    /// ids (expected under redelivery skew) and rejects regressions.
    pub async fn apply_status_update(
        &self,
        provider_message_id: &str,
        new_status: MessageStatus,
    ) -> Result<()> {
        match self
            .messages
            .apply_status(provider_message_id, new_status)
            .await?
        {
            StatusUpdateOutcome::Applied => {
                info!(message_id = %provider_message_id, status = %new_status, "Message status updated");
            }
            StatusUpdateOutcome::Stale => {
                debug!(
                    message_id = %provider_message_id,
                    status = %new_status,
                    "Out-of-order status update rejected"
                );
            }
            StatusUpdateOutcome::Unknown => {
                debug!(
                    message_id = %provider_message_id,
                    "Status update for unobserved message, dropped"
                );
            }
        }
        Ok(())
    }

    /// Record an outbound send before the transport has confirmed anything.
    /// The id is locally generated; it gets rebound to the provider's id once
    /// the transport accepts the message.
    pub async fn record_outbound(
        &self,
        conversation_id: Uuid,
        content: MessageContent,
        now: DateTime<Utc>,
        is_automated: bool,
    ) -> Result<Message> {
        let (message, _) = self
            .messages
            .insert_unique(NewMessage {
                conversation_id,
                message_id: local_message_id(now),
                direction: MessageDirection::Outbound,
                content,
                status: MessageStatus::Sent,
                timestamp: now,
                is_automated,
            })
            .await?;
        Ok(message)
    }

    pub async fn confirm_provider_id(&self, local_id: &str, provider_id: &str) -> Result<()> {
        self.messages.rebind_message_id(local_id, provider_id).await
    }

    pub async fn mark_failed(&self, message_id: &str) -> Result<()> {
        self.apply_status_update(message_id, MessageStatus::Failed)
            .await
    }

    /// Retention sweep; messages older than the cutoff are gone for good.
    pub async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let deleted = self.messages.delete_older_than(cutoff).await?;
        if deleted > 0 {
            info!(deleted, "Retention sweep removed messages");
        }
        Ok(deleted)
    }
}

fn local_message_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("msg_{}_{}", now.timestamp_millis(), suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryMessageStore;

    fn service() -> MessageService {
        MessageService::new(Arc::new(MemoryMessageStore::new()))
    }

    #[tokio::test]
    async fn replayed_inbound_yields_one_record() {
        let service = service();
        let conv = Uuid::new_v4();
        let ts = Utc::now();
        let content = MessageContent::Text {
            text: "halo".to_string(),
        };

        let first = service
            .record_inbound(conv, "wamid.X", content.clone(), ts)
            .await
            .unwrap();
        for _ in 0..4 {
            let again = service
                .record_inbound(conv, "wamid.X", content.clone(), ts)
                .await
                .unwrap();
            assert_eq!(again.id, first.id);
        }

        let all = service.store().list_by_conversation(conv, 50, 0).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_statuses_settle_on_latest() {
        let service = service();
        let conv = Uuid::new_v4();
        let msg = service
            .record_outbound(
                conv,
                MessageContent::Text {
                    text: "hi".to_string(),
                },
                Utc::now(),
                false,
            )
            .await
            .unwrap();

        service
            .apply_status_update(&msg.message_id, MessageStatus::Read)
            .await
            .unwrap();
        service
            .apply_status_update(&msg.message_id, MessageStatus::Delivered)
            .await
            .unwrap();

        let stored = service
            .store()
            .get_by_message_id(&msg.message_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, "read");
    }

    #[tokio::test]
    async fn outbound_records_start_sent_with_local_id() {
        let service = service();
        let msg = service
            .record_outbound(
                Uuid::new_v4(),
                MessageContent::Template {
                    template_name: "order_update".to_string(),
                    template_params: vec!["42".to_string()],
                },
                Utc::now(),
                true,
            )
            .await
            .unwrap();

        assert_eq!(msg.status, "sent");
        assert_eq!(msg.direction, "outbound");
        assert!(msg.is_automated);
        assert!(msg.message_id.starts_with("msg_"));
    }

    #[tokio::test]
    async fn provider_id_rebind_links_status_webhooks() {
        let service = service();
        let msg = service
            .record_outbound(
                Uuid::new_v4(),
                MessageContent::Text {
                    text: "hi".to_string(),
                },
                Utc::now(),
                false,
            )
            .await
            .unwrap();

        service
            .confirm_provider_id(&msg.message_id, "wamid.PROVIDER")
            .await
            .unwrap();
        service
            .apply_status_update("wamid.PROVIDER", MessageStatus::Delivered)
            .await
            .unwrap();

        let stored = service
            .store()
            .get_by_message_id("wamid.PROVIDER")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, "delivered");
    }
}
