//! In-memory store implementations.
//!
//! Used by the test suites; they mirror the conditional-update semantics of
//! the Postgres implementations so session and idempotency behavior can be
//! exercised without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::Result;
use crate::models::conversation::{Conversation, ConversationStatus, NewConversation};
use crate::models::message::{Message, MessageStatus, NewMessage};
use crate::models::whatsapp_number::{NewWhatsAppNumber, WhatsAppNumber};
use crate::models::workflow::{NewWorkflow, Workflow};

use super::{
    ConversationFilter, ConversationStore, MessageStore, NumberStore, StatusUpdateOutcome,
    WorkflowStore,
};

#[derive(Clone, Default)]
pub struct MemoryConversationStore {
    rows: Arc<Mutex<HashMap<Uuid, Conversation>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create(&self, new: NewConversation) -> Result<Conversation> {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            whatsapp_number_id: new.whatsapp_number_id,
            contact_number: new.contact_number,
            contact_name: new.contact_name,
            last_message_at: new.last_message_at,
            session_start_at: new.session_start_at,
            session_end_at: None,
            status: new.status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.rows
            .lock()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn resolve_inbound(
        &self,
        account_id: Uuid,
        contact_number: &str,
        timestamp: DateTime<Utc>,
        contact_name: Option<&str>,
        renew_window: bool,
        window_seconds: i64,
    ) -> Result<Option<Conversation>> {
        let mut rows = self.rows.lock().unwrap();
        let target = rows
            .values()
            .filter(|c| {
                c.account_id == account_id
                    && c.contact_number == contact_number
                    && (c.status == "active" || c.status == "expired")
            })
            .max_by_key(|c| c.last_message_at)
            .map(|c| c.id);

        let Some(id) = target else {
            return Ok(None);
        };

        let conv = rows.get_mut(&id).expect("row disappeared under lock");
        conv.last_message_at = timestamp;
        conv.status = "active".to_string();
        if conv.contact_name.is_none() {
            conv.contact_name = contact_name.map(str::to_string);
        }
        if renew_window && timestamp > conv.session_start_at + Duration::seconds(window_seconds) {
            conv.session_start_at = timestamp;
            conv.session_end_at = None;
        }
        conv.updated_at = Utc::now();
        Ok(Some(conv.clone()))
    }

    async fn expire_if_elapsed(
        &self,
        id: Uuid,
        observed_session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
    ) -> Result<Option<Conversation>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(conv) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if conv.status != "active" || conv.session_start_at != observed_session_start {
            return Ok(None);
        }
        conv.status = "expired".to_string();
        conv.session_end_at = Some(session_end);
        conv.updated_at = Utc::now();
        Ok(Some(conv.clone()))
    }

    async fn touch_last_message(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(conv) = self.rows.lock().unwrap().get_mut(&id) {
            conv.last_message_at = at;
            conv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
        session_end_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Conversation>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(conv) = rows.get_mut(&id) else {
            return Ok(None);
        };
        conv.status = status.as_str().to_string();
        if session_end_at.is_some() {
            conv.session_end_at = session_end_at;
        }
        conv.updated_at = Utc::now();
        Ok(Some(conv.clone()))
    }

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<Conversation> = rows
            .values()
            .filter(|c| c.account_id == filter.account_id)
            .filter(|c| {
                filter
                    .whatsapp_number_id
                    .map_or(true, |id| c.whatsapp_number_id == id)
            })
            .filter(|c| filter.status.map_or(true, |s| c.status == s.as_str()))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(matching
            .into_iter()
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct MemoryMessageStore {
    rows: Arc<Mutex<Vec<Message>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert_unique(&self, new: NewMessage) -> Result<(Message, bool)> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.iter().find(|m| m.message_id == new.message_id) {
            return Ok((existing.clone(), false));
        }
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            message_id: new.message_id,
            direction: new.direction.as_str().to_string(),
            content: Json(new.content),
            status: new.status.as_str().to_string(),
            timestamp: new.timestamp,
            is_automated: new.is_automated,
            created_at: Utc::now(),
        };
        rows.push(message.clone());
        Ok((message, true))
    }

    async fn get_by_message_id(&self, message_id: &str) -> Result<Option<Message>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.message_id == message_id)
            .cloned())
    }

    async fn apply_status(
        &self,
        message_id: &str,
        new_status: MessageStatus,
    ) -> Result<StatusUpdateOutcome> {
        let mut rows = self.rows.lock().unwrap();
        let Some(message) = rows.iter_mut().find(|m| m.message_id == message_id) else {
            return Ok(StatusUpdateOutcome::Unknown);
        };
        let current_rank = MessageStatus::parse(&message.status).map_or(3, |s| s.rank());
        if new_status == MessageStatus::Failed || new_status.rank() > current_rank {
            message.status = new_status.as_str().to_string();
            Ok(StatusUpdateOutcome::Applied)
        } else {
            Ok(StatusUpdateOutcome::Stale)
        }
    }

    async fn rebind_message_id(&self, local_id: &str, provider_id: &str) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(message) = rows.iter_mut().find(|m| m.message_id == local_id) {
            message.message_id = provider_id.to_string();
        }
        Ok(())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Message>> {
        let rows = self.rows.lock().unwrap();
        let mut matching: Vec<Message> = rows
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn latest_for_conversation(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .max_by_key(|m| m.timestamp)
            .cloned())
    }

    async fn unread_count(&self, conversation_id: Uuid) -> Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|m| {
                m.conversation_id == conversation_id
                    && m.direction == "inbound"
                    && m.status != "read"
            })
            .count() as i64)
    }

    async fn mark_read(&self, conversation_id: Uuid, message_ids: Option<&[Uuid]>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut updated = 0;
        for message in rows.iter_mut().filter(|m| {
            m.conversation_id == conversation_id
                && m.direction == "inbound"
                && m.status != "read"
                && message_ids.map_or(true, |ids| ids.contains(&m.id))
        }) {
            message.status = "read".to_string();
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| m.created_at >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Clone, Default)]
pub struct MemoryNumberStore {
    rows: Arc<Mutex<HashMap<Uuid, WhatsAppNumber>>>,
}

impl MemoryNumberStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NumberStore for MemoryNumberStore {
    async fn insert(&self, new: NewWhatsAppNumber) -> Result<WhatsAppNumber> {
        let now = Utc::now();
        let number = WhatsAppNumber {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            number: new.number,
            display_name: new.display_name,
            provider_phone_id: new.provider_phone_id,
            status: new.status.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(number.id, number.clone());
        Ok(number)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WhatsAppNumber>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<WhatsAppNumber>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|n| n.number == number)
            .cloned())
    }

    async fn find_by_provider_phone_id(
        &self,
        provider_phone_id: &str,
    ) -> Result<Option<WhatsAppNumber>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|n| n.provider_phone_id.as_deref() == Some(provider_phone_id))
            .cloned())
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<WhatsAppNumber>> {
        let rows = self.rows.lock().unwrap();
        let mut numbers: Vec<WhatsAppNumber> = rows
            .values()
            .filter(|n| n.account_id == account_id)
            .cloned()
            .collect();
        numbers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(numbers)
    }

    async fn update(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        status: Option<&str>,
        provider_phone_id: Option<&str>,
    ) -> Result<Option<WhatsAppNumber>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(number) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = display_name {
            number.display_name = name.to_string();
        }
        if let Some(status) = status {
            number.status = status.to_string();
        }
        if let Some(pid) = provider_phone_id {
            number.provider_phone_id = Some(pid.to_string());
        }
        number.updated_at = Utc::now();
        Ok(Some(number.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct MemoryWorkflowStore {
    rows: Arc<Mutex<HashMap<Uuid, Workflow>>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn insert(&self, new: NewWorkflow) -> Result<Workflow> {
        let now = Utc::now();
        let workflow = Workflow {
            id: Uuid::new_v4(),
            account_id: new.account_id,
            name: new.name,
            triggers: new.triggers,
            nodes: new.nodes,
            is_active: false,
            created_at: now,
            updated_at: now,
        };
        self.rows
            .lock()
            .unwrap()
            .insert(workflow.id, workflow.clone());
        Ok(workflow)
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<Workflow>> {
        let rows = self.rows.lock().unwrap();
        let mut workflows: Vec<Workflow> = rows
            .values()
            .filter(|w| w.account_id == account_id)
            .cloned()
            .collect();
        workflows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(workflows)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<Workflow>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(workflow) = rows.get_mut(&id) else {
            return Ok(None);
        };
        workflow.is_active = is_active;
        workflow.updated_at = Utc::now();
        Ok(Some(workflow.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{MessageContent, MessageDirection};

    fn inbound(conversation_id: Uuid, message_id: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            message_id: message_id.to_string(),
            direction: MessageDirection::Inbound,
            content: MessageContent::Text {
                text: "hello".to_string(),
            },
            status: MessageStatus::Delivered,
            timestamp: Utc::now(),
            is_automated: false,
        }
    }

    #[tokio::test]
    async fn insert_unique_is_idempotent() {
        let store = MemoryMessageStore::new();
        let conv = Uuid::new_v4();

        let (first, created) = store.insert_unique(inbound(conv, "wamid.1")).await.unwrap();
        assert!(created);
        let (second, created) = store.insert_unique(inbound(conv, "wamid.1")).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn status_updates_never_regress() {
        let store = MemoryMessageStore::new();
        let conv = Uuid::new_v4();
        let mut new = inbound(conv, "wamid.2");
        new.status = MessageStatus::Sent;
        store.insert_unique(new).await.unwrap();

        assert_eq!(
            store
                .apply_status("wamid.2", MessageStatus::Read)
                .await
                .unwrap(),
            StatusUpdateOutcome::Applied
        );
        assert_eq!(
            store
                .apply_status("wamid.2", MessageStatus::Delivered)
                .await
                .unwrap(),
            StatusUpdateOutcome::Stale
        );
        assert_eq!(
            store
                .get_by_message_id("wamid.2")
                .await
                .unwrap()
                .unwrap()
                .status,
            "read"
        );

        // failed overrides regardless of the current rung
        assert_eq!(
            store
                .apply_status("wamid.2", MessageStatus::Failed)
                .await
                .unwrap(),
            StatusUpdateOutcome::Applied
        );
    }

    #[tokio::test]
    async fn unknown_message_id_reports_unknown() {
        let store = MemoryMessageStore::new();
        assert_eq!(
            store
                .apply_status("wamid.missing", MessageStatus::Delivered)
                .await
                .unwrap(),
            StatusUpdateOutcome::Unknown
        );
    }

    #[tokio::test]
    async fn resolve_inbound_picks_most_recent() {
        let store = MemoryConversationStore::new();
        let account = Uuid::new_v4();
        let number = Uuid::new_v4();
        let older = Utc::now() - Duration::days(3);
        let newer = Utc::now() - Duration::days(1);

        store
            .create(NewConversation {
                account_id: account,
                whatsapp_number_id: number,
                contact_number: "628111".to_string(),
                contact_name: None,
                last_message_at: older,
                session_start_at: older,
                status: ConversationStatus::Expired,
            })
            .await
            .unwrap();
        let recent = store
            .create(NewConversation {
                account_id: account,
                whatsapp_number_id: number,
                contact_number: "628111".to_string(),
                contact_name: None,
                last_message_at: newer,
                session_start_at: newer,
                status: ConversationStatus::Expired,
            })
            .await
            .unwrap();

        let now = Utc::now();
        let resolved = store
            .resolve_inbound(account, "628111", now, Some("Dina"), false, 86_400)
            .await
            .unwrap()
            .expect("conversation resolved");
        assert_eq!(resolved.id, recent.id);
        assert_eq!(resolved.status, "active");
        assert_eq!(resolved.contact_name.as_deref(), Some("Dina"));
    }

    #[tokio::test]
    async fn opted_out_conversations_are_never_attached() {
        let store = MemoryConversationStore::new();
        let account = Uuid::new_v4();
        let ts = Utc::now();
        store
            .create(NewConversation {
                account_id: account,
                whatsapp_number_id: Uuid::new_v4(),
                contact_number: "628222".to_string(),
                contact_name: None,
                last_message_at: ts,
                session_start_at: ts,
                status: ConversationStatus::OptedOut,
            })
            .await
            .unwrap();

        let resolved = store
            .resolve_inbound(account, "628222", Utc::now(), None, false, 86_400)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn expire_is_conditional_on_observed_state() {
        let store = MemoryConversationStore::new();
        let start = Utc::now() - Duration::hours(30);
        let conv = store
            .create(NewConversation {
                account_id: Uuid::new_v4(),
                whatsapp_number_id: Uuid::new_v4(),
                contact_number: "628333".to_string(),
                contact_name: None,
                last_message_at: start,
                session_start_at: start,
                status: ConversationStatus::Active,
            })
            .await
            .unwrap();

        let end = start + Duration::hours(24);
        let expired = store
            .expire_if_elapsed(conv.id, start, end)
            .await
            .unwrap()
            .expect("transitioned");
        assert_eq!(expired.status, "expired");
        assert_eq!(expired.session_end_at, Some(end));

        // Second attempt sees a row that is no longer active.
        assert!(store
            .expire_if_elapsed(conv.id, start, end)
            .await
            .unwrap()
            .is_none());
    }
}
