use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::conversation::{
    Conversation, ConversationStatus, NewConversation, SESSION_WINDOW_HOURS,
};
use crate::store::ConversationStore;

/// What happens to the session window when an inbound message arrives after
/// the previous window already elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Keep `session_start_at` fixed for the lifetime of the record. A
    /// reopened conversation can then be `active` while already past its
    /// boundary until the next outbound check runs.
    KeepOriginalWindow,
    /// Restart the window at the reopening inbound message: a new logical
    /// session on the same record.
    RenewOnReopen,
}

/// Resolves which conversation owns an inbound message and enforces the
/// 24-hour business-messaging session rule.
#[derive(Clone)]
pub struct SessionService {
    conversations: Arc<dyn ConversationStore>,
    policy: SessionPolicy,
}

/// Result of the outbound session check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    Allowed,
    Expired { session_end: DateTime<Utc> },
}

impl SessionService {
    pub fn new(conversations: Arc<dyn ConversationStore>, policy: SessionPolicy) -> Self {
        Self {
            conversations,
            policy,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::hours(SESSION_WINDOW_HOURS)
    }

    /// Find or create the conversation an inbound message belongs to.
    ///
    /// Selection rule: most recent conversation for (account, contact) by
    /// `last_message_at`, among those `active` or `expired`. An inbound
    /// message always reopens the session; contacts are never blocked from
    /// messaging in.
    pub async fn resolve_for_inbound(
        &self,
        account_id: Uuid,
        whatsapp_number_id: Uuid,
        contact_number: &str,
        timestamp: DateTime<Utc>,
        contact_name: Option<&str>,
    ) -> Result<Conversation> {
        let renew = self.policy == SessionPolicy::RenewOnReopen;
        if let Some(conversation) = self
            .conversations
            .resolve_inbound(
                account_id,
                contact_number,
                timestamp,
                contact_name,
                renew,
                self.window().num_seconds(),
            )
            .await?
        {
            return Ok(conversation);
        }

        let conversation = self
            .conversations
            .create(NewConversation {
                account_id,
                whatsapp_number_id,
                contact_number: contact_number.to_string(),
                contact_name: contact_name.map(str::to_string),
                last_message_at: timestamp,
                session_start_at: timestamp,
                status: ConversationStatus::Active,
            })
            .await?;
        info!(
            conversation_id = %conversation.id,
            contact = %conversation.contact_number,
            "Created conversation for first inbound message"
        );
        Ok(conversation)
    }

    /// Sole authority on whether an outbound send may proceed. The verdict is
    /// computed from `session_start_at`, never trusted from the stored
    /// `status`; when the window has lapsed on a still-`active` row, the row
    /// is transitioned to `expired` as a conditional update keyed on the
    /// state this call observed.
    pub async fn check_outbound_allowed(
        &self,
        conversation: &Conversation,
        now: DateTime<Utc>,
    ) -> Result<SessionVerdict> {
        let session_end = conversation.session_end();
        if now <= session_end {
            return Ok(SessionVerdict::Allowed);
        }

        if conversation.status_kind() == Some(ConversationStatus::Active) {
            // A concurrent inbound may have reopened the window between our
            // read and this update; the condition on session_start_at makes
            // the lapsed observation a no-op in that case.
            if self
                .conversations
                .expire_if_elapsed(conversation.id, conversation.session_start_at, session_end)
                .await?
                .is_none()
            {
                if let Some(current) = self.conversations.get(conversation.id).await? {
                    if now <= current.session_end() {
                        return Ok(SessionVerdict::Allowed);
                    }
                }
            }
        }

        Ok(SessionVerdict::Expired { session_end })
    }

    /// Read-path variant of the expiry check: dashboards must see `expired`
    /// without waiting for a send attempt. Returns the possibly-transitioned
    /// conversation.
    pub async fn refresh_status(
        &self,
        conversation: Conversation,
        now: DateTime<Utc>,
    ) -> Result<Conversation> {
        if conversation.status_kind() != Some(ConversationStatus::Active)
            || now <= conversation.session_end()
        {
            return Ok(conversation);
        }

        let session_end = conversation.session_end();
        match self
            .conversations
            .expire_if_elapsed(conversation.id, conversation.session_start_at, session_end)
            .await?
        {
            Some(updated) => Ok(updated),
            None => Ok(self
                .conversations
                .get(conversation.id)
                .await?
                .unwrap_or(conversation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryConversationStore;

    fn service(policy: SessionPolicy) -> (SessionService, Arc<MemoryConversationStore>) {
        let store = Arc::new(MemoryConversationStore::new());
        (SessionService::new(store.clone(), policy), store)
    }

    #[tokio::test]
    async fn first_inbound_creates_active_conversation() {
        let (service, _) = service(SessionPolicy::RenewOnReopen);
        let ts = "2024-03-20T09:15:00Z".parse().unwrap();

        let conv = service
            .resolve_for_inbound(Uuid::new_v4(), Uuid::new_v4(), "6281111222333", ts, None)
            .await
            .unwrap();

        assert_eq!(conv.status, "active");
        assert_eq!(conv.session_start_at, ts);
        assert_eq!(conv.last_message_at, ts);
    }

    #[tokio::test]
    async fn allowed_just_before_boundary_expired_just_after() {
        let (service, store) = service(SessionPolicy::RenewOnReopen);
        let start: DateTime<Utc> = "2024-03-20T09:15:00Z".parse().unwrap();
        let conv = service
            .resolve_for_inbound(Uuid::new_v4(), Uuid::new_v4(), "628111", start, None)
            .await
            .unwrap();

        let verdict = service
            .check_outbound_allowed(&conv, start + Duration::hours(23) + Duration::minutes(59))
            .await
            .unwrap();
        assert_eq!(verdict, SessionVerdict::Allowed);

        let verdict = service
            .check_outbound_allowed(&conv, start + Duration::hours(24) + Duration::minutes(1))
            .await
            .unwrap();
        let expected_end = start + Duration::hours(24);
        assert_eq!(
            verdict,
            SessionVerdict::Expired {
                session_end: expected_end
            }
        );

        let stored = store.get(conv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "expired");
        assert_eq!(stored.session_end_at, Some(expected_end));
    }

    #[tokio::test]
    async fn renew_policy_restarts_window_on_late_inbound() {
        let (service, _) = service(SessionPolicy::RenewOnReopen);
        let account = Uuid::new_v4();
        let number = Uuid::new_v4();
        let start: DateTime<Utc> = "2024-03-20T09:15:00Z".parse().unwrap();

        service
            .resolve_for_inbound(account, number, "628111", start, None)
            .await
            .unwrap();

        let reopened_at = start + Duration::hours(30);
        let conv = service
            .resolve_for_inbound(account, number, "628111", reopened_at, None)
            .await
            .unwrap();

        assert_eq!(conv.session_start_at, reopened_at);
        assert_eq!(conv.status, "active");
        assert_eq!(conv.session_end_at, None);

        let verdict = service
            .check_outbound_allowed(&conv, reopened_at + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(verdict, SessionVerdict::Allowed);
    }

    #[tokio::test]
    async fn keep_policy_leaves_window_anchored() {
        let (service, _) = service(SessionPolicy::KeepOriginalWindow);
        let account = Uuid::new_v4();
        let number = Uuid::new_v4();
        let start: DateTime<Utc> = "2024-03-20T09:15:00Z".parse().unwrap();

        service
            .resolve_for_inbound(account, number, "628111", start, None)
            .await
            .unwrap();
        let conv = service
            .resolve_for_inbound(account, number, "628111", start + Duration::hours(30), None)
            .await
            .unwrap();

        // Reopened but still anchored to the original window, so an outbound
        // check right away already fails.
        assert_eq!(conv.session_start_at, start);
        let verdict = service
            .check_outbound_allowed(&conv, start + Duration::hours(30))
            .await
            .unwrap();
        assert!(matches!(verdict, SessionVerdict::Expired { .. }));
    }

    #[tokio::test]
    async fn refresh_status_expires_on_read() {
        let (service, store) = service(SessionPolicy::RenewOnReopen);
        let start = Utc::now() - Duration::hours(30);
        let conv = service
            .resolve_for_inbound(Uuid::new_v4(), Uuid::new_v4(), "628111", start, None)
            .await
            .unwrap();

        let refreshed = service.refresh_status(conv, Utc::now()).await.unwrap();
        assert_eq!(refreshed.status, "expired");
        assert_eq!(
            store.get(refreshed.id).await.unwrap().unwrap().status,
            "expired"
        );
    }
}
