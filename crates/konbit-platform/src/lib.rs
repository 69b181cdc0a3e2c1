//! # konbit-platform
//!
//! WhatsApp Cloud API client: outbound messages (the dispatcher) and the
//! platform half of the media round-trip (metadata lookup, download,
//! re-upload). All calls are bearer-authenticated REST against the
//! versioned Graph base path, keyed by the phone-number id.

use konbit_core::{config::PlatformConfig, error::KonbitError, message::MessageKind};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Downloaded media bytes plus the authoritative mime type.
#[derive(Debug, Clone)]
pub struct MediaDownload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Response of the media metadata endpoint: a short-lived signed URL and
/// the declared mime type.
#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

/// WhatsApp Cloud API client.
///
/// With missing credentials the client degrades instead of panicking:
/// sends become warn-and-skip no-ops, media calls fail so callers take
/// their acknowledgment fallback.
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    access_token: String,
    phone_number_id: String,
    timeout: Duration,
}

impl PlatformClient {
    /// Create from config values.
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Whether credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty() && !self.phone_number_id.is_empty()
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.base_url, self.api_version, self.phone_number_id
        )
    }

    fn media_upload_url(&self) -> String {
        format!(
            "{}/{}/{}/media",
            self.base_url, self.api_version, self.phone_number_id
        )
    }

    fn media_metadata_url(&self, media_id: &str) -> String {
        format!("{}/{}/{media_id}", self.base_url, self.api_version)
    }

    /// Send a plain text message.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), KonbitError> {
        if !self.is_configured() {
            warn!("platform not configured, dropping text message to {to}");
            return Ok(());
        }

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "text": { "body": body },
        });
        self.post_message(&payload).await
    }

    /// Send a media message by platform media id.
    pub async fn send_media(
        &self,
        to: &str,
        media_id: &str,
        kind: &MessageKind,
        caption: Option<&str>,
    ) -> Result<(), KonbitError> {
        if !self.is_configured() {
            warn!("platform not configured, dropping media message to {to}");
            return Ok(());
        }

        let payload = build_media_payload(to, media_id, kind, caption);
        self.post_message(&payload).await
    }

    async fn post_message(&self, payload: &Value) -> Result<(), KonbitError> {
        let url = self.messages_url();
        debug!("platform: POST {url}");

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(payload)
            .send()
            .await
            .map_err(|e| KonbitError::Platform(format!("send failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(KonbitError::Platform(format!(
                "send returned {status}: {text}"
            )));
        }
        Ok(())
    }

    /// Resolve a media id to its signed URL and download the bytes.
    ///
    /// Two sequential calls with the same bearer credential; either failing
    /// fails the fetch.
    pub async fn fetch(&self, media_id: &str) -> Result<MediaDownload, KonbitError> {
        if !self.is_configured() {
            return Err(KonbitError::Platform(
                "platform credentials missing".to_string(),
            ));
        }

        let meta_url = self.media_metadata_url(media_id);
        debug!("platform: GET {meta_url}");

        let resp = self
            .client
            .get(&meta_url)
            .timeout(self.timeout)
            .query(&[("fields", "mime_type,url")])
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| KonbitError::Platform(format!("media metadata failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(KonbitError::Platform(format!(
                "media metadata returned {status}"
            )));
        }

        let meta: MediaMetadata = resp
            .json()
            .await
            .map_err(|e| KonbitError::Platform(format!("bad media metadata: {e}")))?;

        let resp = self
            .client
            .get(&meta.url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| KonbitError::Platform(format!("media download failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(KonbitError::Platform(format!(
                "media download returned {status}"
            )));
        }

        // The metadata mime wins; fall back to the download's content type.
        let header_mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| KonbitError::Platform(format!("media body read failed: {e}")))?;

        let mime_type = meta
            .mime_type
            .or(header_mime)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(MediaDownload {
            bytes: bytes.to_vec(),
            mime_type,
        })
    }

    /// Re-upload bytes to the platform media store; returns the new media id.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, KonbitError> {
        if !self.is_configured() {
            return Err(KonbitError::Platform(
                "platform credentials missing".to_string(),
            ));
        }

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| KonbitError::Platform(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("messaging_product", "whatsapp");

        let url = self.media_upload_url();
        debug!("platform: POST {url} ({mime_type})");

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .multipart(form)
            .send()
            .await
            .map_err(|e| KonbitError::Platform(format!("media upload failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(KonbitError::Platform(format!(
                "media upload returned {status}: {text}"
            )));
        }

        let parsed: UploadResponse = resp
            .json()
            .await
            .map_err(|e| KonbitError::Platform(format!("bad upload response: {e}")))?;

        Ok(parsed.id)
    }
}

/// Build the outbound media message body. Captions are only valid on
/// image, video, and document messages — the platform rejects them on audio.
fn build_media_payload(
    to: &str,
    media_id: &str,
    kind: &MessageKind,
    caption: Option<&str>,
) -> Value {
    let kind_key = kind.as_str();
    let mut media = json!({ "id": media_id });
    if let Some(caption) = caption {
        let captionable = matches!(
            kind,
            MessageKind::Image | MessageKind::Video | MessageKind::Document
        );
        if captionable {
            media["caption"] = json!(caption);
        }
    }

    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": kind_key,
        kind_key: media,
    })
}
