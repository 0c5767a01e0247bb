use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::{
    config::get_config,
    dto::webhook_dto::{VerifyQuery, WebhookPayload},
    error::Result,
    AppState,
};

/// Subscription handshake. The provider calls this once when the webhook is
/// registered; echoing the challenge verbatim completes the registration.
#[axum::debug_handler]
pub async fn verify(Query(query): Query<VerifyQuery>) -> impl IntoResponse {
    let secret = &get_config().whatsapp_verify_token;
    match echo_challenge(&query, secret) {
        Some(challenge) => {
            info!("Webhook verified successfully");
            (StatusCode::OK, challenge).into_response()
        }
        None => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
    }
}

fn echo_challenge(query: &VerifyQuery, secret: &str) -> Option<String> {
    if query.mode.as_deref() != Some("subscribe") {
        return None;
    }
    let token = query.verify_token.as_deref()?;
    if !bool::from(ConstantTimeEq::ct_eq(token.as_bytes(), secret.as_bytes())) {
        return None;
    }
    query.challenge.clone()
}

/// Webhook delivery endpoint. The provider redelivers aggressively on
/// non-2xx, so anything short of an unparseable body or a store outage
/// answers 200 "OK"; per-event problems are logged and swallowed.
#[axum::debug_handler]
pub async fn receive(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    let payload: WebhookPayload = match serde_json::from_value(body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "Webhook body did not match the provider envelope");
            return Ok((StatusCode::OK, "OK"));
        }
    };

    state.ingest_service.process_payload(&payload).await?;
    Ok((StatusCode::OK, "OK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(mode: &str, token: &str, challenge: &str) -> VerifyQuery {
        VerifyQuery {
            mode: Some(mode.to_string()),
            verify_token: Some(token.to_string()),
            challenge: Some(challenge.to_string()),
        }
    }

    #[test]
    fn matching_token_echoes_challenge() {
        let q = query("subscribe", "SECRET", "abc123");
        assert_eq!(echo_challenge(&q, "SECRET").as_deref(), Some("abc123"));
    }

    #[test]
    fn wrong_token_or_mode_is_rejected() {
        assert!(echo_challenge(&query("subscribe", "nope", "abc123"), "SECRET").is_none());
        assert!(echo_challenge(&query("unsubscribe", "SECRET", "abc123"), "SECRET").is_none());
    }

    #[test]
    fn missing_fields_are_rejected() {
        let q = VerifyQuery {
            mode: Some("subscribe".to_string()),
            verify_token: None,
            challenge: Some("abc123".to_string()),
        };
        assert!(echo_challenge(&q, "SECRET").is_none());
    }
}
