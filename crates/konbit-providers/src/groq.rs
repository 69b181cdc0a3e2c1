//! Groq chat-completion provider.
//!
//! OpenAI-compatible API. Exports `pub(crate)` types reused by the
//! OpenRouter provider.

use async_trait::async_trait;
use konbit_core::{context::Context, error::KonbitError, traits::Provider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Sampling temperature for replies.
pub(crate) const TEMPERATURE: f32 = 0.7;
/// Output token bound; replies are meant to fit in a chat bubble.
pub(crate) const MAX_TOKENS: u32 = 300;

/// Groq provider.
pub struct GroqProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GroqProvider {
    /// Create from config values.
    pub fn from_config(api_key: String, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: GROQ_BASE_URL.to_string(),
            api_key,
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Build the two-message request body: the system instruction and the
/// flattened transcript as a single user turn.
pub(crate) fn build_chat_request(model: &str, context: &Context) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if !context.system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: context.system_prompt.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: context.to_transcript(),
    });

    ChatCompletionRequest {
        model: model.to_string(),
        messages,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    }
}

/// Extract the first completion's content, if any.
pub(crate) fn completion_text(response: &ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.message.as_ref())
        .map(|m| m.content.clone())
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

/// POST a chat-completion request and return the completion content.
///
/// Shared by Groq and OpenRouter: same wire format, different base URL.
/// No retry — a failure here is the caller's cue to fall back.
pub(crate) async fn chat_complete(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    timeout: Duration,
    body: &ChatCompletionRequest,
    provider_name: &str,
) -> Result<String, KonbitError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    debug!("{provider_name}: POST {url} model={}", body.model);

    let resp = client
        .post(&url)
        .timeout(timeout)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(body)
        .send()
        .await
        .map_err(|e| KonbitError::Provider(format!("{provider_name} request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(KonbitError::Provider(format!(
            "{provider_name} returned {status}: {text}"
        )));
    }

    let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| {
        KonbitError::Provider(format!("{provider_name}: failed to parse response: {e}"))
    })?;

    completion_text(&parsed)
        .ok_or_else(|| KonbitError::Provider(format!("{provider_name}: no completion content")))
}

#[async_trait]
impl Provider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn requires_api_key(&self) -> bool {
        true
    }

    async fn complete(&self, context: &Context) -> Result<String, KonbitError> {
        if self.api_key.is_empty() {
            return Err(KonbitError::Config("GROQ_API_KEY is not set".to_string()));
        }

        let body = build_chat_request(&self.model, context);
        chat_complete(
            &self.client,
            &self.base_url,
            &self.api_key,
            self.timeout,
            &body,
            "groq",
        )
        .await
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("groq: no API key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
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
                warn!("groq not available: {e}");
                false
            }
        }
    }
}
