use chrono::{DateTime, Utc};

/// Declared type of an inbound WhatsApp message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    /// Any other declared type (sticker, location, contacts, ...), keeping
    /// the platform's label for the acknowledgment and the stored record.
    Other(String),
}

impl MessageKind {
    /// Parse the platform's declared `type` field.
    pub fn parse(label: &str) -> Self {
        match label {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "document" => Self::Document,
            other => Self::Other(other.to_string()),
        }
    }

    /// The label as the platform spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Other(label) => label,
        }
    }

    /// Whether this kind carries a downloadable media attachment.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Audio | Self::Document)
    }
}

/// An inbound message extracted from a webhook delivery.
///
/// `id` is the platform-assigned message id and the deduplication key;
/// the record is immutable once persisted, apart from the media pointer
/// columns filled in after a successful archive.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub id: String,
    pub from_user_id: String,
    pub kind: MessageKind,
    /// Text body for text messages, caption for media messages.
    pub text_body: Option<String>,
    /// Platform media id for media messages.
    pub media_ref: Option<String>,
    pub received_at: DateTime<Utc>,
    /// The message object as delivered, kept for audit.
    pub raw_payload: serde_json::Value,
}

/// A reply computed for one inbound message, persisted before dispatch.
#[derive(Debug, Clone)]
pub struct OutboundReply {
    pub to_user_id: String,
    pub body: String,
    /// Public archive URL when the reply echoes a stored media asset.
    pub media_url: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl OutboundReply {
    /// A plain text reply to `to_user_id`.
    pub fn text(to_user_id: &str, body: &str) -> Self {
        Self {
            to_user_id: to_user_id.to_string(),
            body: body.to_string(),
            media_url: None,
            sent_at: Utc::now(),
        }
    }
}

/// A media attachment in flight — exists only while one message is
/// processed; only `storage_url` survives, as a pointer on the inbound row.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// Platform media id the bytes were fetched from.
    pub source_ref: String,
    pub mime_type: String,
    /// Public URL in cold storage, when archiving succeeded.
    pub storage_url: Option<String>,
    /// Platform media id obtained by re-uploading, when the echo is possible.
    pub platform_media_id: Option<String>,
}
