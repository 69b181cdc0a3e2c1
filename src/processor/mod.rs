//! Webhook processor — the pipeline connecting store, AI, storage, and the
//! messaging platform.
//!
//! One instance is built at startup from explicitly constructed clients and
//! shared by every webhook invocation; there is no other shared state, so
//! invocations run as independent tasks and the store's unique key is the
//! only duplicate-delivery guard.

mod pipeline;

use crate::reply::ReplyGenerator;
use konbit_core::message::{InboundMessage, OutboundReply};
use konbit_platform::PlatformClient;
use konbit_storage::StorageClient;
use konbit_store::Store;
use tracing::{error, warn};

/// The webhook processor.
pub struct Processor {
    pub(super) store: Store,
    pub(super) platform: PlatformClient,
    pub(super) storage: StorageClient,
    pub(super) reply: ReplyGenerator,
}

impl Processor {
    /// Create a processor over the injected clients.
    pub fn new(
        store: Store,
        platform: PlatformClient,
        storage: StorageClient,
        reply: ReplyGenerator,
    ) -> Self {
        Self {
            store,
            platform,
            storage,
            reply,
        }
    }

    /// Persist the outbound reply, then dispatch it as text.
    ///
    /// Persistence failure costs the audit row, not the reply; dispatch
    /// failure is logged and never retried — the platform already got its
    /// acknowledgment.
    pub(super) async fn record_and_send_text(&self, inbound: &InboundMessage, body: &str) {
        let reply = OutboundReply::text(&inbound.from_user_id, body);
        if let Err(e) = self.store.append_reply(&reply).await {
            warn!("failed to log reply for {}: {e}", inbound.id);
        }
        if let Err(e) = self.platform.send_text(&inbound.from_user_id, body).await {
            error!("text dispatch to {} failed: {e}", inbound.from_user_id);
        }
    }
}
