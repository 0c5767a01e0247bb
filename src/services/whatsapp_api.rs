use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::message::MessageContent;

/// Thin client for the provider's Graph API send endpoint. Environments that
/// only ingest webhooks run without an access token; the send gate then
/// records messages locally and skips the transport call.
#[derive(Clone)]
pub struct WhatsAppApiClient {
    http: Client,
    base_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl WhatsAppApiClient {
    pub fn new(base_url: String, access_token: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Client that never performs transport calls. Used by tests and by
    /// deployments without provider credentials.
    pub fn disabled() -> Self {
        Self::new(String::new(), None)
    }

    pub fn is_enabled(&self) -> bool {
        self.access_token.is_some()
    }

    /// Deliver an outbound message through the provider, returning the
    /// provider-assigned message id.
    pub async fn send_message(
        &self,
        provider_phone_id: &str,
        to: &str,
        content: &MessageContent,
    ) -> Result<String> {
        let Some(token) = &self.access_token else {
            return Err(Error::Internal(
                "WhatsApp transport is not configured".to_string(),
            ));
        };

        let body = build_send_body(to, content)?;
        let url = format!("{}/{}/messages", self.base_url, provider_phone_id);
        debug!(to, provider_phone_id, "Sending message via WhatsApp API");

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail: serde_json::Value = response.json().await.unwrap_or_default();
            let message = detail["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(Error::Internal(format!(
                "WhatsApp API error ({}): {}",
                status, message
            )));
        }

        let parsed: SendResponse = response.json().await?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| Error::Internal("WhatsApp API response carried no message id".into()))
    }
}

fn build_send_body(to: &str, content: &MessageContent) -> Result<serde_json::Value> {
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
    });

    match content {
        MessageContent::Text { text } => {
            body["type"] = json!("text");
            body["text"] = json!({ "body": text });
        }
        MessageContent::Template {
            template_name,
            template_params,
        } => {
            body["type"] = json!("template");
            let parameters: Vec<serde_json::Value> = template_params
                .iter()
                .map(|p| json!({ "type": "text", "text": p }))
                .collect();
            let mut template = json!({
                "name": template_name,
                "language": { "code": "en_US" },
            });
            if !parameters.is_empty() {
                template["components"] = json!([{ "type": "body", "parameters": parameters }]);
            }
            body["template"] = template;
        }
        other => {
            return Err(Error::BadRequest(format!(
                "Content cannot be sent outbound: {:?}",
                other
            )));
        }
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body_matches_provider_shape() {
        let body = build_send_body(
            "628111",
            &MessageContent::Text {
                text: "halo".to_string(),
            },
        )
        .unwrap();
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "halo");
        assert_eq!(body["messaging_product"], "whatsapp");
    }

    #[test]
    fn template_params_become_body_components() {
        let body = build_send_body(
            "628111",
            &MessageContent::Template {
                template_name: "order_update".to_string(),
                template_params: vec!["42".to_string(), "tomorrow".to_string()],
            },
        )
        .unwrap();
        assert_eq!(body["type"], "template");
        assert_eq!(body["template"]["name"], "order_update");
        assert_eq!(
            body["template"]["components"][0]["parameters"][1]["text"],
            "tomorrow"
        );
    }

    #[test]
    fn media_content_is_not_sendable() {
        let result = build_send_body(
            "628111",
            &MessageContent::Image {
                media_id: "m1".to_string(),
            },
        );
        assert!(result.is_err());
    }
}
