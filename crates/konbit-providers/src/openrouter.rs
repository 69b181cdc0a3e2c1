//! OpenRouter provider.
//!
//! Reuses Groq's OpenAI-compatible request/response types.
//! Only the base URL, credential, and provider name differ.

use async_trait::async_trait;
use konbit_core::{context::Context, error::KonbitError, traits::Provider};
use std::time::Duration;
use tracing::warn;

use crate::groq::{build_chat_request, chat_complete};

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter provider — routes to many models behind one API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenRouterProvider {
    /// Create from config values.
    pub fn from_config(api_key: String, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    async fn complete(&self, context: &Context) -> Result<String, KonbitError> {
        if self.api_key.is_empty() {
            return Err(KonbitError::Config(
                "OPENROUTER_API_KEY is not set".to_string(),
            ));
        }

        let body = build_chat_request(&self.model, context);
        chat_complete(
            &self.client,
            OPENROUTER_BASE_URL,
            &self.api_key,
            self.timeout,
            &body,
            "openrouter",
        )
        .await
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openrouter: no API key configured");
            return false;
        }
        let url = format!("{OPENROUTER_BASE_URL}/models");
        match self
            .client
            .get(&url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("openrouter not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openrouter_provider_name() {
        let p = OpenRouterProvider::from_config(
            "or-test".into(),
            "meta-llama/llama-3.1-8b-instruct".into(),
            30,
        );
        assert_eq!(p.name(), "openrouter");
        assert!(p.requires_api_key());
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let p = OpenRouterProvider::from_config(String::new(), "m".into(), 30);
        let err = p.complete(&Context::new("", "hi")).await.unwrap_err();
        assert!(matches!(err, KonbitError::Config(_)));
    }
}
