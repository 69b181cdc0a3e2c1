//! # konbit-storage
//!
//! Object-storage client used to archive inbound media. Upload-by-path with
//! a content type, returning the public URL. Archiving is best-effort by
//! contract: callers log a failure and keep going — the user-facing flow
//! never depends on storage durability.

use konbit_core::{config::StorageConfig, error::KonbitError};
use std::time::Duration;
use tracing::debug;

/// Storage REST client (Supabase-style object API).
pub struct StorageClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    bucket: String,
    timeout: Duration,
}

impl StorageClient {
    /// Create from config values.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Whether credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.service_key.is_empty()
    }

    /// Public URL for an object path in the bucket.
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.base_url, self.bucket
        )
    }

    /// Upload bytes to `path` and return the public URL.
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, KonbitError> {
        if !self.is_configured() {
            return Err(KonbitError::Storage("storage not configured".to_string()));
        }

        let url = format!("{}/storage/v1/object/{}/{path}", self.base_url, self.bucket);
        debug!("storage: POST {url} ({content_type}, {} bytes)", bytes.len());

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| KonbitError::Storage(format!("upload failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(KonbitError::Storage(format!(
                "upload returned {status}: {text}"
            )));
        }

        Ok(self.public_url(path))
    }
}

/// Object path for one message's attachment: `{user}/{message id}.{ext}`.
pub fn object_path(user_id: &str, message_id: &str, mime_type: &str) -> String {
    format!("{user_id}/{message_id}.{}", extension_for_mime(mime_type))
}

/// File extension for the mime types the platform actually delivers.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    // Parameters like "; codecs=opus" are common on audio mimes.
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "audio/aac" => "aac",
        "audio/mp4" => "m4a",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/amr" => "amr",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> StorageClient {
        StorageClient::from_config(&StorageConfig {
            url: "https://xyz.supabase.co".into(),
            service_key: "service-key".into(),
            bucket: "media".into(),
            timeout_secs: 30,
        })
    }

    #[test]
    fn test_public_url() {
        let s = test_storage();
        assert_eq!(
            s.public_url("509111/wamid.A.jpg"),
            "https://xyz.supabase.co/storage/v1/object/public/media/509111/wamid.A.jpg"
        );
    }

    #[test]
    fn test_object_path_uses_mime_extension() {
        assert_eq!(
            object_path("509111", "wamid.A", "image/jpeg"),
            "509111/wamid.A.jpg"
        );
        assert_eq!(
            object_path("509111", "wamid.B", "application/pdf"),
            "509111/wamid.B.pdf"
        );
    }

    #[test]
    fn test_extension_strips_parameters() {
        assert_eq!(extension_for_mime("audio/ogg; codecs=opus"), "ogg");
    }

    #[test]
    fn test_extension_unknown_falls_back() {
        assert_eq!(extension_for_mime("application/x-thing"), "bin");
    }

    #[test]
    fn test_is_configured() {
        assert!(test_storage().is_configured());
        let bare = StorageClient::from_config(&StorageConfig::default());
        assert!(!bare.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_upload_fails() {
        let bare = StorageClient::from_config(&StorageConfig::default());
        let err = bare.upload("a/b.jpg", vec![1, 2], "image/jpeg").await;
        assert!(err.is_err());
    }
}
