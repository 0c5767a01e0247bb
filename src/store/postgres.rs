use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
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

#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create(&self, new: NewConversation) -> Result<Conversation> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations
                (account_id, whatsapp_number_id, contact_number, contact_name,
                 last_message_at, session_start_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.account_id)
        .bind(new.whatsapp_number_id)
        .bind(&new.contact_number)
        .bind(&new.contact_name)
        .bind(new.last_message_at)
        .bind(new.session_start_at)
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Conversation>> {
        let conversation =
            sqlx::query_as::<_, Conversation>("SELECT * FROM conversations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(conversation)
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
        // Single find-and-update: selection and mutation must not be split
        // into separate round trips (concurrent deliveries for the same
        // contact race otherwise).
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations SET
                last_message_at = $3,
                status = 'active',
                contact_name = COALESCE(contact_name, $4),
                session_start_at = CASE
                    WHEN $5 AND $3 > session_start_at + make_interval(secs => $6)
                    THEN $3 ELSE session_start_at END,
                session_end_at = CASE
                    WHEN $5 AND $3 > session_start_at + make_interval(secs => $6)
                    THEN NULL ELSE session_end_at END,
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM conversations
                WHERE account_id = $1
                  AND contact_number = $2
                  AND status IN ('active', 'expired')
                ORDER BY last_message_at DESC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(contact_number)
        .bind(timestamp)
        .bind(contact_name)
        .bind(renew_window)
        .bind(window_seconds as f64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn expire_if_elapsed(
        &self,
        id: Uuid,
        observed_session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
    ) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations
            SET status = 'expired', session_end_at = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND session_start_at = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(observed_session_start)
        .bind(session_end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn touch_last_message(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE conversations SET last_message_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ConversationStatus,
        session_end_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations
            SET status = $2, session_end_at = COALESCE($3, session_end_at), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(session_end_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn list(&self, filter: &ConversationFilter) -> Result<Vec<Conversation>> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE account_id = $1
              AND ($2::uuid IS NULL OR whatsapp_number_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY last_message_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.account_id)
        .bind(filter.whatsapp_number_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(conversations)
    }
}

#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert_unique(&self, new: NewMessage) -> Result<(Message, bool)> {
        let inserted = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (conversation_id, message_id, direction, content, status, "timestamp", is_automated)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (message_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.conversation_id)
        .bind(&new.message_id)
        .bind(new.direction.as_str())
        .bind(sqlx::types::Json(&new.content))
        .bind(new.status.as_str())
        .bind(new.timestamp)
        .bind(new.is_automated)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(message) = inserted {
            return Ok((message, true));
        }

        // Conflict path: a redelivery already inserted this provider id.
        let existing = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE message_id = $1")
            .bind(&new.message_id)
            .fetch_one(&self.pool)
            .await?;
        Ok((existing, false))
    }

    async fn get_by_message_id(&self, message_id: &str) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    async fn apply_status(
        &self,
        message_id: &str,
        new_status: MessageStatus,
    ) -> Result<StatusUpdateOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET status = $2
            WHERE message_id = $1
              AND ($2::text = 'failed'
                   OR CASE status
                        WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 WHEN 'read' THEN 2
                        ELSE 3 END
                    < CASE $2::text
                        WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 WHEN 'read' THEN 2
                        ELSE 3 END)
            "#,
        )
        .bind(message_id)
        .bind(new_status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(StatusUpdateOutcome::Applied);
        }

        let exists = sqlx::query("SELECT 1 FROM messages WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(if exists.is_some() {
            StatusUpdateOutcome::Stale
        } else {
            StatusUpdateOutcome::Unknown
        })
    }

    async fn rebind_message_id(&self, local_id: &str, provider_id: &str) -> Result<()> {
        sqlx::query("UPDATE messages SET message_id = $2 WHERE message_id = $1")
            .bind(local_id)
            .bind(provider_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY "timestamp" DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn latest_for_conversation(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY "timestamp" DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    async fn unread_count(&self, conversation_id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND direction = 'inbound' AND status <> 'read'
            "#,
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    async fn mark_read(&self, conversation_id: Uuid, message_ids: Option<&[Uuid]>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET status = 'read'
            WHERE conversation_id = $1
              AND direction = 'inbound'
              AND status <> 'read'
              AND ($2::uuid[] IS NULL OR id = ANY($2))
            "#,
        )
        .bind(conversation_id)
        .bind(message_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PgNumberStore {
    pool: PgPool,
}

impl PgNumberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NumberStore for PgNumberStore {
    async fn insert(&self, new: NewWhatsAppNumber) -> Result<WhatsAppNumber> {
        let number = sqlx::query_as::<_, WhatsAppNumber>(
            r#"
            INSERT INTO whatsapp_numbers
                (account_id, number, display_name, provider_phone_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.account_id)
        .bind(&new.number)
        .bind(&new.display_name)
        .bind(&new.provider_phone_id)
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(number)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WhatsAppNumber>> {
        let number =
            sqlx::query_as::<_, WhatsAppNumber>("SELECT * FROM whatsapp_numbers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(number)
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<WhatsAppNumber>> {
        let row =
            sqlx::query_as::<_, WhatsAppNumber>("SELECT * FROM whatsapp_numbers WHERE number = $1")
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn find_by_provider_phone_id(
        &self,
        provider_phone_id: &str,
    ) -> Result<Option<WhatsAppNumber>> {
        let row = sqlx::query_as::<_, WhatsAppNumber>(
            "SELECT * FROM whatsapp_numbers WHERE provider_phone_id = $1",
        )
        .bind(provider_phone_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<WhatsAppNumber>> {
        let numbers = sqlx::query_as::<_, WhatsAppNumber>(
            "SELECT * FROM whatsapp_numbers WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(numbers)
    }

    async fn update(
        &self,
        id: Uuid,
        display_name: Option<&str>,
        status: Option<&str>,
        provider_phone_id: Option<&str>,
    ) -> Result<Option<WhatsAppNumber>> {
        let number = sqlx::query_as::<_, WhatsAppNumber>(
            r#"
            UPDATE whatsapp_numbers SET
                display_name = COALESCE($2, display_name),
                status = COALESCE($3, status),
                provider_phone_id = COALESCE($4, provider_phone_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(status)
        .bind(provider_phone_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(number)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM whatsapp_numbers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn insert(&self, new: NewWorkflow) -> Result<Workflow> {
        let workflow = sqlx::query_as::<_, Workflow>(
            r#"
            INSERT INTO workflows (account_id, name, triggers, nodes, is_active)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING *
            "#,
        )
        .bind(new.account_id)
        .bind(&new.name)
        .bind(&new.triggers)
        .bind(&new.nodes)
        .fetch_one(&self.pool)
        .await?;
        Ok(workflow)
    }

    async fn list(&self, account_id: Uuid) -> Result<Vec<Workflow>> {
        let workflows = sqlx::query_as::<_, Workflow>(
            "SELECT * FROM workflows WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(workflows)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Option<Workflow>> {
        let workflow = sqlx::query_as::<_, Workflow>(
            r#"
            UPDATE workflows SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(workflow)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
