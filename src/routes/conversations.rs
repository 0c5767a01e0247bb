use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::conversation_dto::{
        ConversationDetail, ConversationListQuery, ConversationSummary, MarkReadPayload,
        MessageListQuery, MessageResponse, SendMessagePayload, UpdateStatusPayload,
    },
    error::{Error, Result},
    models::conversation::ConversationStatus,
    store::{ConversationFilter, ConversationStore, MessageStore},
    AppState,
};

#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationListQuery>,
) -> Result<impl IntoResponse> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(
            ConversationStatus::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unknown status filter: {}", raw)))?,
        ),
    };

    let filter = ConversationFilter {
        account_id: query.account_id,
        whatsapp_number_id: query.whatsapp_number_id,
        status,
        limit: query.limit.unwrap_or(20).clamp(1, 100),
        skip: query.skip.unwrap_or(0).max(0),
    };

    let now = Utc::now();
    let mut summaries = Vec::new();
    for conversation in state.conversations.list(&filter).await? {
        // Expiry is evaluated on reads too, so the dashboard stops offering
        // a compose box without waiting for a failed send.
        let conversation = state.session_service.refresh_status(conversation, now).await?;
        let last_message = state
            .message_service
            .store()
            .latest_for_conversation(conversation.id)
            .await?;
        let unread_count = state
            .message_service
            .store()
            .unread_count(conversation.id)
            .await?;
        summaries.push(ConversationSummary {
            id: conversation.id,
            contact_number: conversation.contact_number,
            contact_name: conversation.contact_name,
            last_message_at: conversation.last_message_at,
            status: conversation.status,
            whatsapp_number_id: conversation.whatsapp_number_id,
            last_message: last_message.map(MessageResponse::from),
            unread_count,
        });
    }

    Ok(Json(summaries))
}

#[axum::debug_handler]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let conversation = state
        .conversations
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;
    let conversation = state
        .session_service
        .refresh_status(conversation, Utc::now())
        .await?;
    Ok(Json(ConversationDetail::from(conversation)))
}

#[axum::debug_handler]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MessageListQuery>,
) -> Result<impl IntoResponse> {
    if state.conversations.get(id).await?.is_none() {
        return Err(Error::NotFound("Conversation not found".to_string()));
    }

    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let skip = query.skip.unwrap_or(0).max(0);
    let mut messages = state
        .message_service
        .store()
        .list_by_conversation(id, limit, skip)
        .await?;
    // Stored newest-first for paging; the client renders oldest-first.
    messages.reverse();

    let body: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse> {
    let content = payload.content.into_content()?;
    let message = state.send_service.send(id, content, false).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": MessageResponse::from(message),
        })),
    ))
}

#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkReadPayload>,
) -> Result<impl IntoResponse> {
    if state.conversations.get(id).await?.is_none() {
        return Err(Error::NotFound("Conversation not found".to_string()));
    }

    let updated = state
        .message_service
        .store()
        .mark_read(id, payload.message_ids.as_deref())
        .await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

/// Explicit status change from the dashboard; the only path into
/// `opted-out`.
#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse> {
    let status = ConversationStatus::parse(&payload.status)
        .ok_or_else(|| Error::BadRequest(format!("Unknown status: {}", payload.status)))?;

    let session_end_at = match status {
        ConversationStatus::Active => None,
        _ => Some(Utc::now()),
    };
    let conversation = state
        .conversations
        .set_status(id, status, session_end_at)
        .await?
        .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

    Ok(Json(json!({ "success": true, "status": conversation.status })))
}
