//! Webhook envelope types.
//!
//! The platform wraps every delivery in `entry[].changes[].value`; a value
//! carries either `messages` or `statuses`. Everything is optional and
//! unknown fields are captured, so no delivery shape can fail extraction —
//! an empty envelope simply yields no message.

use chrono::{DateTime, Utc};
use konbit_core::message::{InboundMessage, MessageKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Option<Vec<RawMessage>>,
    /// Delivery receipts; their presence means there is nothing to process.
    #[serde(default)]
    pub statuses: Option<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One message as the platform delivers it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Unix epoch seconds, as a string.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub image: Option<MediaRef>,
    #[serde(default)]
    pub video: Option<MediaRef>,
    #[serde(default)]
    pub audio: Option<MediaRef>,
    #[serde(default)]
    pub document: Option<MediaRef>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MediaRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl WebhookPayload {
    /// The first change value, when the envelope has one.
    pub fn first_value(&self) -> Option<&ChangeValue> {
        self.entry.first()?.changes.first().map(|c| &c.value)
    }

    /// The first message of the delivery, when there is one.
    pub fn first_message(&self) -> Option<&RawMessage> {
        self.first_value()?.messages.as_ref()?.first()
    }
}

impl RawMessage {
    /// The media object matching the declared type.
    pub fn media_ref(&self) -> Option<&MediaRef> {
        match self.kind.as_str() {
            "image" => self.image.as_ref(),
            "video" => self.video.as_ref(),
            "audio" => self.audio.as_ref(),
            "document" => self.document.as_ref(),
            _ => None,
        }
    }

    /// Normalize into the domain type.
    pub fn to_inbound(&self) -> InboundMessage {
        let kind = if self.kind.is_empty() {
            MessageKind::Other("unknown".to_string())
        } else {
            MessageKind::parse(&self.kind)
        };

        let media = self.media_ref();
        let text_body = match kind {
            MessageKind::Text => self.text.as_ref().map(|t| t.body.clone()),
            // Media captions double as the message text.
            _ => media.and_then(|m| m.caption.clone()),
        };

        let received_at = self
            .timestamp
            .as_deref()
            .and_then(|t| t.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        InboundMessage {
            id: self.id.clone(),
            from_user_id: self.from.clone(),
            kind,
            text_body,
            media_ref: media.map(|m| m.id.clone()),
            received_at,
            raw_payload: serde_json::to_value(self).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_envelope() -> Value {
        serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [{
                            "id": "wamid.X1",
                            "from": "50937001122",
                            "type": "text",
                            "timestamp": "1754550000",
                            "text": { "body": "Bonjou" }
                        }]
                    }
                }]
            }]
        })
    }

    #[test]
    fn test_extract_text_message() {
        let payload: WebhookPayload = serde_json::from_value(text_envelope()).unwrap();
        let msg = payload.first_message().unwrap();
        assert_eq!(msg.id, "wamid.X1");
        assert_eq!(msg.from, "50937001122");
        assert_eq!(msg.kind, "text");

        let inbound = msg.to_inbound();
        assert_eq!(inbound.kind, MessageKind::Text);
        assert_eq!(inbound.text_body.as_deref(), Some("Bonjou"));
        assert!(inbound.media_ref.is_none());
        assert_eq!(inbound.received_at.timestamp(), 1754550000);
    }

    #[test]
    fn test_statuses_only_delivery() {
        let json = serde_json::json!({
            "entry": [{ "changes": [{ "value": { "statuses": [{ "status": "delivered" }] } }] }]
        });
        let payload: WebhookPayload = serde_json::from_value(json).unwrap();
        assert!(payload.first_message().is_none());
        assert!(payload.first_value().unwrap().statuses.is_some());
    }

    #[test]
    fn test_empty_envelope() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(payload.first_value().is_none());
        assert!(payload.first_message().is_none());
    }

    #[test]
    fn test_media_message_with_caption() {
        let json = serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [{
                "id": "wamid.M1",
                "from": "50937001122",
                "type": "image",
                "image": { "id": "media-77", "mime_type": "image/jpeg", "caption": "foto resi a" }
            }] } }] }]
        });
        let payload: WebhookPayload = serde_json::from_value(json).unwrap();
        let inbound = payload.first_message().unwrap().to_inbound();
        assert_eq!(inbound.kind, MessageKind::Image);
        assert_eq!(inbound.media_ref.as_deref(), Some("media-77"));
        assert_eq!(inbound.text_body.as_deref(), Some("foto resi a"));
    }

    #[test]
    fn test_media_ref_ignores_mismatched_kind() {
        // Declared type wins: an image object on a text message is ignored.
        let msg = RawMessage {
            kind: "text".into(),
            image: Some(MediaRef {
                id: "media-1".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(msg.media_ref().is_none());
    }

    #[test]
    fn test_unknown_kind_keeps_label() {
        let json = serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [{
                "id": "wamid.S1",
                "from": "50937001122",
                "type": "sticker",
                "sticker": { "id": "media-88" }
            }] } }] }]
        });
        let payload: WebhookPayload = serde_json::from_value(json).unwrap();
        let inbound = payload.first_message().unwrap().to_inbound();
        assert_eq!(inbound.kind, MessageKind::Other("sticker".into()));
        assert!(inbound.text_body.is_none());
        assert!(inbound.media_ref.is_none());
    }

    #[test]
    fn test_missing_kind_is_unknown() {
        let msg = RawMessage::default();
        assert_eq!(msg.to_inbound().kind, MessageKind::Other("unknown".into()));
    }

    #[test]
    fn test_raw_payload_round_trips_unmodeled_fields() {
        let payload: WebhookPayload = serde_json::from_value(text_envelope()).unwrap();
        let inbound = payload.first_message().unwrap().to_inbound();
        // The sticker/context/etc. fields we don't model survive in `raw`.
        assert_eq!(inbound.raw_payload["text"]["body"], "Bonjou");
        assert_eq!(inbound.raw_payload["id"], "wamid.X1");
    }
}
