use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::number_dto::{AddNumberPayload, NumberListQuery, NumberResponse, UpdateNumberPayload},
    error::{Error, Result},
    models::whatsapp_number::{NewWhatsAppNumber, NumberStatus},
    store::NumberStore,
    utils::phone,
    AppState,
};

#[axum::debug_handler]
pub async fn list_numbers(
    State(state): State<AppState>,
    Query(query): Query<NumberListQuery>,
) -> Result<impl IntoResponse> {
    let numbers = state.numbers.list(query.account_id).await?;
    let body: Vec<NumberResponse> = numbers.into_iter().map(NumberResponse::from).collect();
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn add_number(
    State(state): State<AppState>,
    Json(payload): Json<AddNumberPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let number = phone::canonicalize(&payload.number);
    if state.numbers.find_by_number(&number).await?.is_some() {
        return Err(Error::Conflict(
            "This WhatsApp number is already registered".to_string(),
        ));
    }

    let created = state
        .numbers
        .insert(NewWhatsAppNumber {
            account_id: payload.account_id,
            number,
            display_name: payload.display_name,
            provider_phone_id: payload.provider_phone_id,
            // Approval comes from the provider's verification flow, not from
            // this service.
            status: NumberStatus::Pending,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(NumberResponse::from(created))))
}

#[axum::debug_handler]
pub async fn update_number(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNumberPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let status = match payload.status.as_deref() {
        None => None,
        Some(raw) => Some(
            NumberStatus::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unknown number status: {}", raw)))?
                .as_str(),
        ),
    };

    let number = state
        .numbers
        .update(
            id,
            payload.display_name.as_deref(),
            status,
            payload.provider_phone_id.as_deref(),
        )
        .await?
        .ok_or_else(|| Error::NotFound("WhatsApp number not found".to_string()))?;

    Ok(Json(NumberResponse::from(number)))
}

#[axum::debug_handler]
pub async fn delete_number(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if !state.numbers.delete(id).await? {
        return Err(Error::NotFound("WhatsApp number not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
