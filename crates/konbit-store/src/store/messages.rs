//! Message rows: dedup insert, reply logging, history retrieval, media
//! pointers, and the media audit log.

use super::{Store, TS_FORMAT};
use konbit_core::{
    error::KonbitError,
    message::{InboundMessage, MediaAsset, MessageKind, OutboundReply},
};
use uuid::Uuid;

/// Result of an insert-if-absent attempt.
///
/// A rejected duplicate is a value, not an error — callers branch on
/// semantics instead of parsing constraint-violation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// One stored turn, as fed into prompt assembly.
#[derive(Debug, Clone)]
pub struct StoredTurn {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl Store {
    /// Persist an inbound message keyed by its platform id.
    ///
    /// The PRIMARY KEY on `messages.id` makes this the idempotency gate for
    /// at-least-once webhook delivery: a second delivery of the same message
    /// reports `Duplicate` and writes nothing.
    pub async fn insert_inbound(
        &self,
        message: &InboundMessage,
    ) -> Result<InsertOutcome, KonbitError> {
        let media_mime = match &message.kind {
            MessageKind::Other(label) => Some(label.as_str()),
            _ => None,
        };
        let raw = serde_json::to_string(&message.raw_payload)?;

        let result = sqlx::query(
            "INSERT INTO messages (id, user_id, role, kind, content, media_mime, raw, created_at) \
             VALUES (?, ?, 'user', ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.from_user_id)
        .bind(message.kind.as_str())
        .bind(&message.text_body)
        .bind(media_mime)
        .bind(&raw)
        .bind(message.received_at.format(TS_FORMAT).to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(KonbitError::Memory(format!("inbound insert failed: {e}"))),
        }
    }

    /// Persist an outbound reply.
    pub async fn append_reply(&self, reply: &OutboundReply) -> Result<(), KonbitError> {
        sqlx::query(
            "INSERT INTO messages (id, user_id, role, kind, content, media_url, created_at) \
             VALUES (?, ?, 'assistant', 'text', ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&reply.to_user_id)
        .bind(&reply.body)
        .bind(&reply.media_url)
        .bind(reply.sent_at.format(TS_FORMAT).to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| KonbitError::Memory(format!("reply insert failed: {e}")))?;

        Ok(())
    }

    /// Last `limit` turns for a user, oldest first.
    ///
    /// SQLite retrieves newest-first; the result is reversed here because
    /// prompt assembly needs chronological order. Rows without text
    /// (media without caption, unknown kinds) carry nothing for a prompt
    /// and are skipped.
    pub async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<StoredTurn>, KonbitError> {
        let mut rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT role, content, created_at FROM messages \
             WHERE user_id = ? AND content IS NOT NULL \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| KonbitError::Memory(format!("history fetch failed: {e}")))?;

        rows.reverse();

        Ok(rows
            .into_iter()
            .map(|(role, content, created_at)| StoredTurn {
                role,
                content,
                created_at,
            })
            .collect())
    }

    /// Record the media round-trip outcome on the inbound row.
    ///
    /// `storage_url` stays NULL when archiving failed — the row itself must
    /// exist either way.
    pub async fn set_media_pointer(
        &self,
        message_id: &str,
        storage_url: Option<&str>,
        mime_type: &str,
        platform_media_id: Option<&str>,
    ) -> Result<(), KonbitError> {
        sqlx::query(
            "UPDATE messages SET media_url = ?, media_mime = ?, platform_media_id = ? \
             WHERE id = ?",
        )
        .bind(storage_url)
        .bind(mime_type)
        .bind(platform_media_id)
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| KonbitError::Memory(format!("media pointer update failed: {e}")))?;

        Ok(())
    }

    /// Append a media audit row.
    pub async fn log_media(&self, user_id: &str, asset: &MediaAsset) -> Result<(), KonbitError> {
        sqlx::query(
            "INSERT INTO media_log (id, user_id, source_ref, storage_url, mime_type, platform_media_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&asset.source_ref)
        .bind(&asset.storage_url)
        .bind(&asset.mime_type)
        .bind(&asset.platform_media_id)
        .execute(&self.pool)
        .await
        .map_err(|e| KonbitError::Memory(format!("media log insert failed: {e}")))?;

        Ok(())
    }
}
