//! The per-message processing flow.

use super::Processor;
use crate::payload::WebhookPayload;
use konbit_core::error::KonbitError;
use konbit_core::message::{InboundMessage, MediaAsset, MessageKind, OutboundReply};
use konbit_storage::{extension_for_mime, object_path};
use konbit_store::InsertOutcome;
use tracing::{debug, error, info, warn};

/// Acknowledgment for any received attachment, echoed or not.
const MEDIA_ACK: &str = "Mwen resevwa fichye ou a. Mèsi!";

fn media_ack_with_link(url: &str) -> String {
    format!("Mwen resevwa fichye ou a. Li disponib isit la: {url}")
}

fn other_kind_ack(label: &str) -> String {
    format!("Mwen resevwa yon mesaj tip '{label}'. Voye yon mesaj tèks pou m ka reponn ou.")
}

/// How to acknowledge a media message, decided by how far the round-trip got.
enum MediaAck {
    /// Re-upload worked — echo the asset back with a caption.
    Echo {
        platform_media_id: String,
        kind: MessageKind,
        storage_url: Option<String>,
    },
    /// Text-only acknowledgment, with the archive link when there is one.
    Text { storage_url: Option<String> },
}

impl Processor {
    /// Process one webhook delivery. Never returns an error: a failing
    /// message must not take down the endpoint or block the rest of the
    /// batch, so everything is handled (and logged) inside.
    pub async fn process(&self, payload: WebhookPayload) {
        let Some(value) = payload.first_value() else {
            debug!("webhook delivery without a change value, ignoring");
            return;
        };

        if value.statuses.is_some() {
            debug!("status update received, nothing to process");
            return;
        }

        let Some(raw) = value.messages.as_ref().and_then(|m| m.first()) else {
            debug!("webhook delivery without messages, ignoring");
            return;
        };

        let inbound = raw.to_inbound();
        info!(
            "[{}] inbound {} message {}",
            inbound.from_user_id,
            inbound.kind.as_str(),
            inbound.id
        );

        // Inbound persistence comes first: it is both the dedup gate and the
        // audit record that must exist before any reply goes out.
        match self.store.insert_inbound(&inbound).await {
            Ok(InsertOutcome::Inserted) => {}
            Ok(InsertOutcome::Duplicate) => {
                info!("duplicate delivery of {}, skipping", inbound.id);
                return;
            }
            // The reply still goes out; we only lose dedup for this message.
            Err(e) => error!("failed to persist inbound {}: {e}", inbound.id),
        }

        match &inbound.kind {
            MessageKind::Text => {
                let text = inbound.text_body.clone().unwrap_or_default();
                let body = self.reply.reply(&inbound.from_user_id, &text).await;
                self.record_and_send_text(&inbound, &body).await;
            }
            MessageKind::Other(label) => {
                let body = other_kind_ack(label);
                self.record_and_send_text(&inbound, &body).await;
            }
            _ => self.handle_media(&inbound).await,
        }
    }

    /// Media branch: download, archive, re-upload, acknowledge. Whatever
    /// fails, the sender hears back.
    async fn handle_media(&self, inbound: &InboundMessage) {
        let ack = match self.media_round_trip(inbound).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!("media round-trip failed for {}: {e}", inbound.id);
                MediaAck::Text { storage_url: None }
            }
        };

        match ack {
            MediaAck::Echo {
                platform_media_id,
                kind,
                storage_url,
            } => {
                let reply = OutboundReply {
                    to_user_id: inbound.from_user_id.clone(),
                    body: MEDIA_ACK.to_string(),
                    media_url: storage_url,
                    sent_at: chrono::Utc::now(),
                };
                if let Err(e) = self.store.append_reply(&reply).await {
                    warn!("failed to log media reply for {}: {e}", inbound.id);
                }
                if let Err(e) = self
                    .platform
                    .send_media(
                        &inbound.from_user_id,
                        &platform_media_id,
                        &kind,
                        Some(MEDIA_ACK),
                    )
                    .await
                {
                    error!("media dispatch to {} failed: {e}", inbound.from_user_id);
                }
            }
            MediaAck::Text { storage_url } => {
                let body = match &storage_url {
                    Some(url) => media_ack_with_link(url),
                    None => MEDIA_ACK.to_string(),
                };
                let reply = OutboundReply {
                    to_user_id: inbound.from_user_id.clone(),
                    body: body.clone(),
                    media_url: storage_url,
                    sent_at: chrono::Utc::now(),
                };
                if let Err(e) = self.store.append_reply(&reply).await {
                    warn!("failed to log media reply for {}: {e}", inbound.id);
                }
                if let Err(e) = self.platform.send_text(&inbound.from_user_id, &body).await {
                    error!("text dispatch to {} failed: {e}", inbound.from_user_id);
                }
            }
        }
    }

    /// Fetch the attachment, then run the two optional steps: archive to
    /// object storage and re-upload to the platform. Only the fetch is a
    /// hard requirement — the optional steps each degrade the ack one notch.
    async fn media_round_trip(
        &self,
        inbound: &InboundMessage,
    ) -> Result<MediaAck, KonbitError> {
        let media_ref = inbound.media_ref.as_deref().ok_or_else(|| {
            KonbitError::Platform("media message without a media id".to_string())
        })?;

        let download = self.platform.fetch(media_ref).await?;

        let path = object_path(&inbound.from_user_id, &inbound.id, &download.mime_type);
        let storage_url = match self
            .storage
            .upload(&path, download.bytes.clone(), &download.mime_type)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("media archive failed for {}: {e}", inbound.id);
                None
            }
        };

        let filename = format!("{}.{}", inbound.id, extension_for_mime(&download.mime_type));
        let platform_media_id = match self
            .platform
            .upload(download.bytes, &filename, &download.mime_type)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("media re-upload failed for {}: {e}", inbound.id);
                None
            }
        };

        if let Err(e) = self
            .store
            .set_media_pointer(
                &inbound.id,
                storage_url.as_deref(),
                &download.mime_type,
                platform_media_id.as_deref(),
            )
            .await
        {
            warn!("failed to record media pointer for {}: {e}", inbound.id);
        }
        if let Err(e) = self
            .store
            .log_media(
                &inbound.from_user_id,
                &MediaAsset {
                    source_ref: media_ref.to_string(),
                    mime_type: download.mime_type.clone(),
                    storage_url: storage_url.clone(),
                    platform_media_id: platform_media_id.clone(),
                },
            )
            .await
        {
            warn!("failed to log media asset for {}: {e}", inbound.id);
        }

        Ok(match platform_media_id {
            Some(id) => MediaAck::Echo {
                platform_media_id: id,
                kind: inbound.kind.clone(),
                storage_url,
            },
            None => MediaAck::Text { storage_url },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ReplyGenerator;
    use async_trait::async_trait;
    use konbit_core::config::{PlatformConfig, StorageConfig};
    use konbit_core::context::Context;
    use konbit_core::traits::Provider;
    use konbit_platform::PlatformClient;
    use konbit_storage::StorageClient;
    use konbit_store::Store;
    use std::sync::Arc;

    struct CannedProvider(&'static str);

    #[async_trait]
    impl Provider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }
        fn requires_api_key(&self) -> bool {
            false
        }
        async fn complete(&self, _context: &Context) -> Result<String, KonbitError> {
            Ok(self.0.to_string())
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }
        fn requires_api_key(&self) -> bool {
            true
        }
        async fn complete(&self, _context: &Context) -> Result<String, KonbitError> {
            Err(KonbitError::Provider("returned 503".to_string()))
        }
        async fn is_available(&self) -> bool {
            false
        }
    }

    /// A processor whose platform/storage clients have no credentials:
    /// sends are no-ops, media fetches and archive uploads fail — the
    /// worst-case environment the pipeline must still answer in.
    async fn offline_processor(provider: Arc<dyn Provider>) -> Processor {
        let store = Store::in_memory().await.unwrap();
        let generator =
            ReplyGenerator::new(provider, store.clone(), 8, "Ou se yon asistan.".to_string());
        Processor::new(
            store,
            PlatformClient::from_config(&PlatformConfig::default()),
            StorageClient::from_config(&StorageConfig::default()),
            generator,
        )
    }

    fn text_payload(id: &str, body: &str) -> WebhookPayload {
        serde_json::from_value(serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [{
                "id": id,
                "from": "50937001122",
                "type": "text",
                "text": { "body": body }
            }] } }] }]
        }))
        .unwrap()
    }

    async fn count_rows(store: &Store, role: &str) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE role = ?")
                .bind(role)
                .fetch_one(store.pool())
                .await
                .unwrap();
        count
    }

    #[tokio::test]
    async fn test_text_message_persists_both_sides() {
        let p = offline_processor(Arc::new(CannedProvider("Nou la pou ou."))).await;
        p.process(text_payload("wamid.t1", "èske nou ouvri?")).await;

        assert_eq!(count_rows(&p.store, "user").await, 1);
        assert_eq!(count_rows(&p.store, "assistant").await, 1);

        let (content,): (String,) = sqlx::query_as(
            "SELECT content FROM messages WHERE role = 'assistant'",
        )
        .fetch_one(p.store.pool())
        .await
        .unwrap();
        assert_eq!(content, "Nou la pou ou.");
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let p = offline_processor(Arc::new(CannedProvider("Repons."))).await;
        let payload = text_payload("wamid.dup", "èske nou ouvri?");

        p.process(payload.clone()).await;
        p.process(payload).await;

        // One inbound row, one reply — the second delivery did nothing.
        assert_eq!(count_rows(&p.store, "user").await, 1);
        assert_eq!(count_rows(&p.store, "assistant").await, 1);
    }

    #[tokio::test]
    async fn test_reply_totality_with_everything_down() {
        // Provider failing, platform and storage unconfigured: the user
        // still gets exactly one (apology) reply attempt, durably recorded.
        let p = offline_processor(Arc::new(FailingProvider)).await;
        p.process(text_payload("wamid.down", "èske nou ouvri?")).await;

        assert_eq!(count_rows(&p.store, "assistant").await, 1);
        let (content,): (String,) =
            sqlx::query_as("SELECT content FROM messages WHERE role = 'assistant'")
                .fetch_one(p.store.pool())
                .await
                .unwrap();
        assert!(content.contains("pwoblèm"));
    }

    #[tokio::test]
    async fn test_media_failure_still_acknowledges() {
        let p = offline_processor(Arc::new(CannedProvider("unused"))).await;
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [{
                "id": "wamid.m1",
                "from": "50937001122",
                "type": "image",
                "image": { "id": "media-1", "mime_type": "image/jpeg" }
            }] } }] }]
        }))
        .unwrap();

        p.process(payload).await;

        // Inbound row exists with a NULL archive pointer, and the fallback
        // acknowledgment was recorded.
        let (media_url,): (Option<String>,) =
            sqlx::query_as("SELECT media_url FROM messages WHERE id = 'wamid.m1'")
                .fetch_one(p.store.pool())
                .await
                .unwrap();
        assert_eq!(media_url, None);

        let (ack,): (String,) =
            sqlx::query_as("SELECT content FROM messages WHERE role = 'assistant'")
                .fetch_one(p.store.pool())
                .await
                .unwrap();
        assert_eq!(ack, MEDIA_ACK);
    }

    #[tokio::test]
    async fn test_unknown_kind_gets_typed_acknowledgment() {
        let p = offline_processor(Arc::new(CannedProvider("unused"))).await;
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{ "changes": [{ "value": { "messages": [{
                "id": "wamid.s1",
                "from": "50937001122",
                "type": "sticker",
                "sticker": { "id": "media-9" }
            }] } }] }]
        }))
        .unwrap();

        p.process(payload).await;

        let (content, media_mime): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT content, media_mime FROM messages WHERE id = 'wamid.s1'")
                .fetch_one(p.store.pool())
                .await
                .unwrap();
        assert_eq!(content, None);
        assert_eq!(media_mime.as_deref(), Some("sticker"));

        let (ack,): (String,) =
            sqlx::query_as("SELECT content FROM messages WHERE role = 'assistant'")
                .fetch_one(p.store.pool())
                .await
                .unwrap();
        assert!(ack.contains("sticker"));
    }

    #[tokio::test]
    async fn test_statuses_only_delivery_is_a_noop() {
        let p = offline_processor(Arc::new(CannedProvider("unused"))).await;
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "entry": [{ "changes": [{ "value": { "statuses": [{ "status": "read" }] } }] }]
        }))
        .unwrap();

        p.process(payload).await;

        assert_eq!(count_rows(&p.store, "user").await, 0);
        assert_eq!(count_rows(&p.store, "assistant").await, 0);
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_noop() {
        let p = offline_processor(Arc::new(CannedProvider("unused"))).await;
        p.process(WebhookPayload::default()).await;
        assert_eq!(count_rows(&p.store, "user").await, 0);
    }

    #[tokio::test]
    async fn test_shortcut_text_skips_provider_and_replies() {
        // The provider would panic if called; shortcut input must not call it.
        struct PanicProvider;

        #[async_trait]
        impl Provider for PanicProvider {
            fn name(&self) -> &str {
                "panic"
            }
            fn requires_api_key(&self) -> bool {
                false
            }
            async fn complete(&self, _context: &Context) -> Result<String, KonbitError> {
                panic!("shortcut input reached the provider");
            }
            async fn is_available(&self) -> bool {
                true
            }
        }

        let p = offline_processor(Arc::new(PanicProvider)).await;
        p.process(text_payload("wamid.g1", "Bonjou")).await;

        let (ack,): (String,) =
            sqlx::query_as("SELECT content FROM messages WHERE role = 'assistant'")
                .fetch_one(p.store.pool())
                .await
                .unwrap();
        assert!(ack.starts_with("Bonjou!"));
    }
}
