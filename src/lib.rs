pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::services::{
    ingest_service::IngestService, message_service::MessageService, send_service::SendService,
    session_service::SessionPolicy, session_service::SessionService,
    whatsapp_api::WhatsAppApiClient,
};
use crate::store::postgres::{PgConversationStore, PgMessageStore, PgNumberStore, PgWorkflowStore};
use crate::store::{ConversationStore, MessageStore, NumberStore, WorkflowStore};

#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<dyn ConversationStore>,
    pub numbers: Arc<dyn NumberStore>,
    pub workflows: Arc<dyn WorkflowStore>,
    pub message_service: MessageService,
    pub session_service: SessionService,
    pub send_service: SendService,
    pub ingest_service: IngestService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        let api = WhatsAppApiClient::new(
            config.whatsapp_api_base_url.clone(),
            config.whatsapp_access_token.clone(),
        );
        Self::with_stores(
            Arc::new(PgConversationStore::new(pool.clone())),
            Arc::new(PgMessageStore::new(pool.clone())),
            Arc::new(PgNumberStore::new(pool.clone())),
            Arc::new(PgWorkflowStore::new(pool)),
            api,
            SessionPolicy::RenewOnReopen,
        )
    }

    /// Wire the state from explicit storage capabilities. Production passes
    /// the Postgres stores; tests pass in-memory ones.
    pub fn with_stores(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        numbers: Arc<dyn NumberStore>,
        workflows: Arc<dyn WorkflowStore>,
        api: WhatsAppApiClient,
        policy: SessionPolicy,
    ) -> Self {
        let message_service = MessageService::new(messages);
        let session_service = SessionService::new(conversations.clone(), policy);
        let send_service = SendService::new(
            conversations.clone(),
            numbers.clone(),
            session_service.clone(),
            message_service.clone(),
            Arc::new(api),
        );
        let ingest_service = IngestService::new(
            numbers.clone(),
            session_service.clone(),
            message_service.clone(),
        );

        Self {
            conversations,
            numbers,
            workflows,
            message_service,
            session_service,
            send_service,
            ingest_service,
        }
    }
}

/// The full route table; main and the integration tests serve the same app.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/webhooks/whatsapp",
            get(routes::webhooks::verify).post(routes::webhooks::receive),
        )
        .route(
            "/api/conversations",
            get(routes::conversations::list_conversations),
        )
        .route(
            "/api/conversations/:id",
            get(routes::conversations::get_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(routes::conversations::list_messages).post(routes::conversations::send_message),
        )
        .route(
            "/api/conversations/:id/read",
            post(routes::conversations::mark_read),
        )
        .route(
            "/api/conversations/:id/status",
            post(routes::conversations::update_status),
        )
        .route(
            "/api/numbers",
            get(routes::numbers::list_numbers).post(routes::numbers::add_number),
        )
        .route(
            "/api/numbers/:id",
            patch(routes::numbers::update_number).delete(routes::numbers::delete_number),
        )
        .route(
            "/api/workflows",
            get(routes::workflows::list_workflows).post(routes::workflows::create_workflow),
        )
        .route(
            "/api/workflows/:id/toggle",
            post(routes::workflows::toggle_workflow),
        )
        .route("/api/workflows/:id", delete(routes::workflows::delete_workflow))
        .with_state(state)
}
