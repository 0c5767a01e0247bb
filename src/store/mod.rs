//! Storage capabilities, injected at construction time.
//!
//! Production wires the Postgres implementations; tests wire the in-memory
//! ones. The conditional-update methods (`resolve_inbound`,
//! `expire_if_elapsed`, `apply_status`) are single atomic find-and-update
//! operations in both implementations: concurrent webhook deliveries for the
//! same contact must not both get past an expiry boundary or both insert the
//! same provider message id.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::conversation::{Conversation, ConversationStatus, NewConversation};
use crate::models::message::{Message, MessageStatus, NewMessage};
use crate::models::whatsapp_number::{NewWhatsAppNumber, WhatsAppNumber};
use crate::models::workflow::{NewWorkflow, Workflow};

#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub account_id: Uuid,
    pub whatsapp_number_id: Option<Uuid>,
    pub status: Option<ConversationStatus>,
    pub limit: i64,
    pub skip: i64,
}

/// Outcome of a conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdateOutcome {
    Applied,
    /// Message exists but the update would regress a later status.
    Stale,
    /// No message with that provider id has been observed yet.
    Unknown,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create(&self, new: NewConversation) -> Result<Conversation>;

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// Attach an inbound message to the most recent conversation for this
    /// (account, contact) among those `active` or `expired`, ordered by
    /// `last_message_at` descending. Atomically bumps `last_message_at`,
    /// reactivates the conversation, and fills in a contact name if one was
    /// never recorded. When `renew_window` is set and the previous window
    /// already elapsed at `timestamp`, the session window restarts there.
    ///
    /// Returns `None` when no attachable conversation exists.
    async fn resolve_inbound(
        &self,
        account_id: Uuid,
        contact_number: &str,
        timestamp: DateTime<Utc>,
        contact_name: Option<&str>,
        renew_window: bool,
        window_seconds: i64,
    ) -> Result<Option<Conversation>>;

    /// Transition to `expired`, conditional on the row still being `active`
    /// with the same `session_start_at` the caller observed. Returns the
    /// updated row, or `None` when the condition no longer holds.
    async fn expire_if_elapsed(
        &self,
        id: Uuid,
        observed_session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
    ) -> Result<Option<Conversation>>;

    async fn touch_last_message(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn set_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
        session_end_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Conversation>>;

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert keyed on the unique `message_id`. Redelivered webhooks hit the
    /// conflict path and get the existing row back; the bool reports whether
    /// a row was actually created.
    async fn insert_unique(&self, new: NewMessage) -> Result<(Message, bool)>;

    async fn get_by_message_id(&self, message_id: &str) -> Result<Option<Message>>;

    /// Conditional status update: applied only when the new status does not
    /// regress the current one, `failed` always applied.
    async fn apply_status(
        &self,
        message_id: &str,
        new_status: MessageStatus,
    ) -> Result<StatusUpdateOutcome>;

    /// Rebind a locally generated outbound id to the provider-assigned id
    /// once the transport accepts the send.
    async fn rebind_message_id(&self, local_id: &str, provider_id: &str) -> Result<()>;

    /// Newest first.
    async fn list_by_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Message>>;

    async fn latest_for_conversation(&self, conversation_id: Uuid) -> Result<Option<Message>>;

    async fn unread_count(&self, conversation_id: Uuid) -> Result<i64>;

    /// Mark inbound messages read; restricted to `message_ids` when given.
    async fn mark_read(&self, conversation_id: Uuid, message_ids: Option<&[Uuid]>) -> Result<u64>;

    /// Retention sweep. Deletes messages created before the cutoff.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait NumberStore: Send + Sync {
    async fn insert(&self, new: NewWhatsAppNumber) -> Result<WhatsAppNumber>;

    async fn get(&self, id: Uuid) -> Result<Option<WhatsAppNumber>>;

    async fn find_by_number(&self, number: &str) -> Result<Option<WhatsAppNumber>>;

    async fn find_by_provider_phone_id(
        &self,
        provider_phone_id: &str,
    ) -> Result<Option<WhatsAppNumber>>;

    async fn list(&self, account_id: Uuid) -> Result<Vec<WhatsAppNumber>>;

    async fn update(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        status: Option<&str>,
        provider_phone_id: Option<&str>,
    ) -> Result<Option<WhatsAppNumber>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert(&self, new: NewWorkflow) -> Result<Workflow>;

    async fn list(&self, account_id: Uuid) -> Result<Vec<Workflow>>;

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<Workflow>>;

    async fn delete(&self, id: Uuid) -> Result<bool>;
}
