//! Reply generation: intent shortcuts first, then the AI provider.
//!
//! The contract is totality — `reply` always returns a non-empty,
//! user-displayable string, whatever the store or the provider do.

use konbit_core::{
    context::{Context, ContextEntry},
    error::KonbitError,
    traits::Provider,
};
use konbit_store::Store;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Greeting openers. Checked before the keyword pass; matching is on the
/// start of the normalized text. `salut` is deliberately absent — a message
/// like "salut, ki pri..." should land on the pricing answer.
const GREETING_WORDS: &[&str] = &["bonjou", "bonswa", "alo", "hello", "hi"];

/// Pricing/printing request markers — the one recurring question the shop
/// answers the same way every time.
const PRICING_KEYWORDS: &[&str] = &[
    "pri ",
    "pri?",
    "ki pri",
    "enpresyon",
    "enprime",
    "koute",
    "konbyen",
    "tarif",
];

const GREETING_REPLY: &str =
    "Bonjou! Mwen se asistan Elmidor Group. Kijan mwen ka ede w jodi a?";

const PRICING_REPLY: &str = "Pou pri enpresyon yo: ekri nou sa ou vle enprime a \
     (kantite, fòma, koulè) epi n ap voye yon devi pou ou. \
     Ou ka jwenn plis detay sou https://www.elmidorgroup.com";

/// Provider reachable but the call failed.
const AI_DOWN_REPLY: &str = "Gen yon pwoblèm ak sèvè AI a. Tanpri eseye ankò pita.";

/// Provider credentials missing.
const AI_UNCONFIGURED_REPLY: &str = "Konfigirasyon AI a pa anfòm kounye a.";

/// Provider answered with nothing usable.
const NO_ANSWER_REPLY: &str = "Mwen pa jwenn repons nan AI a.";

/// Canned reply for the cheap intent pass, if any.
///
/// Greeting strictly before keywords; neither touches the network.
pub fn shortcut_reply(text: &str) -> Option<&'static str> {
    let normalized = text.trim().to_lowercase();

    if GREETING_WORDS.iter().any(|g| normalized.starts_with(g)) {
        return Some(GREETING_REPLY);
    }
    if PRICING_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return Some(PRICING_REPLY);
    }
    None
}

/// Computes one reply per inbound text message.
pub struct ReplyGenerator {
    provider: Arc<dyn Provider>,
    store: Store,
    history_limit: usize,
    persona: String,
}

impl ReplyGenerator {
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Store,
        history_limit: usize,
        persona: String,
    ) -> Self {
        Self {
            provider,
            store,
            history_limit,
            persona,
        }
    }

    /// Derive a reply for `text` from `user_id`, always returning something
    /// displayable.
    pub async fn reply(&self, user_id: &str, text: &str) -> String {
        if let Some(canned) = shortcut_reply(text) {
            debug!("intent shortcut hit for {user_id}");
            return canned.to_string();
        }

        // A broken store costs us context, not the reply.
        let history = match self.store.recent(user_id, self.history_limit).await {
            Ok(turns) => turns
                .into_iter()
                .map(|t| ContextEntry {
                    role: t.role,
                    content: t.content,
                })
                .collect(),
            Err(e) => {
                warn!("history fetch failed for {user_id}: {e}");
                Vec::new()
            }
        };

        let context = Context {
            system_prompt: self.persona.clone(),
            history,
            current_message: text.to_string(),
        };

        // One attempt against the active provider; no retry. Webhook callers
        // expect a fast answer, so a failure becomes the apology right away.
        let completion = match self.provider.complete(&context).await {
            Ok(completion) => completion,
            Err(KonbitError::Config(e)) => {
                warn!("provider unconfigured: {e}");
                return AI_UNCONFIGURED_REPLY.to_string();
            }
            Err(e) => {
                error!("provider {} failed: {e}", self.provider.name());
                return AI_DOWN_REPLY.to_string();
            }
        };

        let trimmed = completion.trim();
        if trimmed.is_empty() {
            NO_ANSWER_REPLY.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Provider that must not be called — proves the shortcut pass skipped it.
    struct UnreachableProvider;

    #[async_trait]
    impl Provider for UnreachableProvider {
        fn name(&self) -> &str {
            "unreachable"
        }
        fn requires_api_key(&self) -> bool {
            false
        }
        async fn complete(&self, _context: &Context) -> Result<String, KonbitError> {
            panic!("provider must not be invoked for shortcut inputs");
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

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
            Err(KonbitError::Provider("returned 500".to_string()))
        }
        async fn is_available(&self) -> bool {
            false
        }
    }

    struct UnconfiguredProvider;

    #[async_trait]
    impl Provider for UnconfiguredProvider {
        fn name(&self) -> &str {
            "unconfigured"
        }
        fn requires_api_key(&self) -> bool {
            true
        }
        async fn complete(&self, _context: &Context) -> Result<String, KonbitError> {
            Err(KonbitError::Config("API key is not set".to_string()))
        }
        async fn is_available(&self) -> bool {
            false
        }
    }

    async fn generator(provider: Arc<dyn Provider>) -> ReplyGenerator {
        let store = Store::in_memory().await.unwrap();
        ReplyGenerator::new(provider, store, 8, "Ou se yon asistan.".to_string())
    }

    #[test]
    fn test_greeting_shortcut() {
        assert_eq!(shortcut_reply("Bonjou"), Some(GREETING_REPLY));
        assert_eq!(shortcut_reply("  bonswa zanmi  "), Some(GREETING_REPLY));
        assert_eq!(shortcut_reply("Hello there"), Some(GREETING_REPLY));
    }

    #[test]
    fn test_pricing_shortcut() {
        assert_eq!(
            shortcut_reply("salut, ki pri pou enpresyon"),
            Some(PRICING_REPLY)
        );
        assert_eq!(shortcut_reply("konbyen sa ap koute m?"), Some(PRICING_REPLY));
    }

    #[test]
    fn test_greeting_checked_before_keywords() {
        // Both intents present — the greeting opener wins.
        assert_eq!(
            shortcut_reply("Bonjou, ki pri pou enpresyon?"),
            Some(GREETING_REPLY)
        );
    }

    #[test]
    fn test_no_shortcut_for_ordinary_text() {
        assert_eq!(shortcut_reply("èske nou ouvri samdi?"), None);
        assert_eq!(shortcut_reply(""), None);
    }

    #[tokio::test]
    async fn test_shortcut_bypasses_provider() {
        let gen = generator(Arc::new(UnreachableProvider)).await;
        assert_eq!(gen.reply("509111", "Bonjou").await, GREETING_REPLY);
        assert_eq!(
            gen.reply("509111", "salut, ki pri pou enpresyon").await,
            PRICING_REPLY
        );
    }

    #[tokio::test]
    async fn test_provider_reply_is_trimmed() {
        let gen = generator(Arc::new(CannedProvider("  Wi, nou ouvri.  "))).await;
        assert_eq!(gen.reply("509111", "èske nou ouvri?").await, "Wi, nou ouvri.");
    }

    #[tokio::test]
    async fn test_empty_completion_becomes_no_answer() {
        let gen = generator(Arc::new(CannedProvider("   "))).await;
        assert_eq!(gen.reply("509111", "èske nou ouvri?").await, NO_ANSWER_REPLY);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_apology() {
        let gen = generator(Arc::new(FailingProvider)).await;
        assert_eq!(gen.reply("509111", "èske nou ouvri?").await, AI_DOWN_REPLY);
    }

    #[tokio::test]
    async fn test_missing_credentials_become_config_apology() {
        let gen = generator(Arc::new(UnconfiguredProvider)).await;
        assert_eq!(
            gen.reply("509111", "èske nou ouvri?").await,
            AI_UNCONFIGURED_REPLY
        );
    }
}
