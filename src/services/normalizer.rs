//! Turns one provider webhook delivery into a flat sequence of canonical
//! events. A delivery batches entries for multiple contacts and mixes message
//! and status changes; downstream code only ever sees the two event shapes
//! below, in payload order.
//!
//! This is a pure transform. Nothing here touches storage, and nothing a
//! provider sends can make it panic: malformed pieces are skipped with a log
//! and the rest of the batch proceeds.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::dto::webhook_dto::{
    WebhookChangeValue, WebhookMessage, WebhookPayload, BUSINESS_ACCOUNT_OBJECT, FIELD_MESSAGES,
    FIELD_MESSAGE_STATUS,
};
use crate::models::message::{MessageContent, MessageStatus};
use crate::utils::time::from_epoch_seconds_str;

#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    Inbound(InboundMessageEvent),
    Status(StatusUpdateEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessageEvent {
    /// The provider's phone-number id identifying which business number
    /// received the message.
    pub provider_phone_id: String,
    /// Sender phone, digits only.
    pub from: String,
    pub provider_message_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: MessageContent,
    pub contact_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdateEvent {
    pub provider_message_id: String,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    pub recipient_id: Option<String>,
}

pub fn normalize_payload(payload: &WebhookPayload) -> Vec<CanonicalEvent> {
    if payload.object != BUSINESS_ACCOUNT_OBJECT {
        debug!(object = %payload.object, "Ignoring webhook for unexpected object");
        return Vec::new();
    }

    let mut events = Vec::new();
    for entry in &payload.entry {
        for change in &entry.changes {
            match change.field.as_str() {
                FIELD_MESSAGES => collect_message_events(&change.value, &mut events),
                FIELD_MESSAGE_STATUS => collect_status_events(&change.value, &mut events),
                other => {
                    debug!(field = %other, "Skipping webhook change with unhandled field");
                }
            }
        }
    }
    events
}

fn collect_message_events(value: &WebhookChangeValue, events: &mut Vec<CanonicalEvent>) {
    if let Some(product) = &value.messaging_product {
        if product != "whatsapp" {
            debug!(product = %product, "Skipping change for unexpected messaging product");
            return;
        }
    }

    let Some(provider_phone_id) = value
        .metadata
        .as_ref()
        .and_then(|m| m.phone_number_id.clone())
    else {
        warn!("Message change without phone_number_id metadata, skipping");
        return;
    };

    for (idx, message) in value.messages.iter().enumerate() {
        let (Some(from), Some(id)) = (&message.from, &message.id) else {
            warn!("Inbound message missing sender or id, skipping");
            continue;
        };
        let Some(timestamp) = message
            .timestamp
            .as_deref()
            .and_then(from_epoch_seconds_str)
        else {
            warn!(message_id = %id, "Inbound message with unparseable timestamp, skipping");
            continue;
        };

        // Contacts are delivered positionally alongside messages; the name is
        // enrichment only, never required.
        let contact_name = value
            .contacts
            .get(idx)
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.clone());

        events.push(CanonicalEvent::Inbound(InboundMessageEvent {
            provider_phone_id: provider_phone_id.clone(),
            from: from.clone(),
            provider_message_id: id.clone(),
            timestamp,
            content: content_of(message),
            contact_name,
        }));
    }
}

fn collect_status_events(value: &WebhookChangeValue, events: &mut Vec<CanonicalEvent>) {
    for status in &value.statuses {
        let (Some(id), Some(raw_status)) = (&status.id, &status.status) else {
            warn!("Status update missing message id or status, skipping");
            continue;
        };
        let Some(parsed) = MessageStatus::parse(raw_status) else {
            warn!(message_id = %id, status = %raw_status, "Unrecognized delivery status, skipping");
            continue;
        };
        let Some(timestamp) = status.timestamp.as_deref().and_then(from_epoch_seconds_str) else {
            warn!(message_id = %id, "Status update with unparseable timestamp, skipping");
            continue;
        };

        events.push(CanonicalEvent::Status(StatusUpdateEvent {
            provider_message_id: id.clone(),
            status: parsed,
            timestamp,
            recipient_id: status.recipient_id.clone(),
        }));
    }
}

/// Map the type-keyed provider payload onto the closed content union.
/// Unrecognized types (and recognized types missing their payload) become
/// `Unknown` so the message is still recorded rather than dropped.
fn content_of(message: &WebhookMessage) -> MessageContent {
    match message.kind.as_deref() {
        Some("text") => match message.text.as_ref().and_then(|t| t.body.clone()) {
            Some(text) => MessageContent::Text { text },
            None => MessageContent::Unknown,
        },
        Some("image") => match message.image.as_ref().and_then(|m| m.id.clone()) {
            Some(media_id) => MessageContent::Image { media_id },
            None => MessageContent::Unknown,
        },
        Some("document") => match message.document.as_ref().and_then(|m| m.id.clone()) {
            Some(media_id) => MessageContent::Document { media_id },
            None => MessageContent::Unknown,
        },
        _ => MessageContent::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).expect("valid payload shape")
    }

    #[test]
    fn wrong_object_produces_no_events() {
        let payload = payload(json!({
            "object": "instagram",
            "entry": [{"id": "1", "changes": [{"field": "messages", "value": {}}]}],
        }));
        assert!(normalize_payload(&payload).is_empty());
    }

    #[test]
    fn mixed_batch_preserves_payload_order() {
        let payload = payload(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "entry-1",
                "changes": [
                    {
                        "field": "messages",
                        "value": {
                            "messaging_product": "whatsapp",
                            "metadata": {"display_phone_number": "628999", "phone_number_id": "phid-1"},
                            "contacts": [{"profile": {"name": "Dina"}, "wa_id": "628111"}],
                            "messages": [{
                                "from": "628111",
                                "id": "wamid.A",
                                "timestamp": "1710926100",
                                "type": "text",
                                "text": {"body": "halo"}
                            }]
                        }
                    },
                    {
                        "field": "message_status",
                        "value": {
                            "statuses": [{
                                "id": "wamid.B",
                                "status": "delivered",
                                "timestamp": "1710926160",
                                "recipient_id": "628111"
                            }]
                        }
                    }
                ]
            }]
        }));

        let events = normalize_payload(&payload);
        assert_eq!(events.len(), 2);
        match &events[0] {
            CanonicalEvent::Inbound(ev) => {
                assert_eq!(ev.provider_phone_id, "phid-1");
                assert_eq!(ev.from, "628111");
                assert_eq!(ev.provider_message_id, "wamid.A");
                assert_eq!(ev.contact_name.as_deref(), Some("Dina"));
                assert_eq!(
                    ev.content,
                    MessageContent::Text {
                        text: "halo".to_string()
                    }
                );
            }
            other => panic!("expected inbound event, got {:?}", other),
        }
        match &events[1] {
            CanonicalEvent::Status(ev) => {
                assert_eq!(ev.provider_message_id, "wamid.B");
                assert_eq!(ev.status, MessageStatus::Delivered);
            }
            other => panic!("expected status event, got {:?}", other),
        }
    }

    #[test]
    fn unknown_content_type_becomes_placeholder_not_dropped() {
        let payload = payload(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {
                        "metadata": {"phone_number_id": "phid-1"},
                        "messages": [{
                            "from": "628111",
                            "id": "wamid.C",
                            "timestamp": "1710926100",
                            "type": "sticker"
                        }]
                    }
                }]
            }]
        }));

        let events = normalize_payload(&payload);
        assert_eq!(events.len(), 1);
        match &events[0] {
            CanonicalEvent::Inbound(ev) => assert_eq!(ev.content, MessageContent::Unknown),
            other => panic!("expected inbound event, got {:?}", other),
        }
    }

    #[test]
    fn media_message_carries_provider_media_id() {
        let payload = payload(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {
                        "metadata": {"phone_number_id": "phid-1"},
                        "messages": [{
                            "from": "628111",
                            "id": "wamid.D",
                            "timestamp": "1710926100",
                            "type": "image",
                            "image": {"id": "media-77", "mime_type": "image/jpeg"}
                        }]
                    }
                }]
            }]
        }));

        let events = normalize_payload(&payload);
        match &events[0] {
            CanonicalEvent::Inbound(ev) => assert_eq!(
                ev.content,
                MessageContent::Image {
                    media_id: "media-77".to_string()
                }
            ),
            other => panic!("expected inbound event, got {:?}", other),
        }
    }

    #[test]
    fn bad_timestamp_and_missing_ids_are_skipped_without_aborting_batch() {
        let payload = payload(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "messages",
                    "value": {
                        "metadata": {"phone_number_id": "phid-1"},
                        "messages": [
                            {"from": "628111", "id": "wamid.E", "timestamp": "oops", "type": "text"},
                            {"id": "wamid.F", "timestamp": "1710926100", "type": "text"},
                            {"from": "628111", "id": "wamid.G", "timestamp": "1710926100",
                             "type": "text", "text": {"body": "still here"}}
                        ]
                    }
                }]
            }]
        }));

        let events = normalize_payload(&payload);
        assert_eq!(events.len(), 1);
        match &events[0] {
            CanonicalEvent::Inbound(ev) => assert_eq!(ev.provider_message_id, "wamid.G"),
            other => panic!("expected inbound event, got {:?}", other),
        }
    }

    #[test]
    fn unrecognized_status_value_is_skipped() {
        let payload = payload(json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "field": "message_status",
                    "value": {
                        "statuses": [{"id": "wamid.H", "status": "teleported", "timestamp": "1710926100"}]
                    }
                }]
            }]
        }));
        assert!(normalize_payload(&payload).is_empty());
    }
}
