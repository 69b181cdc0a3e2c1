use crate::{context::Context, error::KonbitError};
use async_trait::async_trait;

/// AI provider trait.
///
/// Every chat-completion backend (Groq, OpenRouter, ...) implements this
/// trait; the active one is selected by configuration at startup, so adding
/// a backend means adding an implementation, not touching the pipeline.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider requires an API key to function.
    fn requires_api_key(&self) -> bool;

    /// Send the conversation context and return the completion text.
    async fn complete(&self, context: &Context) -> Result<String, KonbitError>;

    /// Check if the provider is reachable and ready.
    async fn is_available(&self) -> bool;
}
