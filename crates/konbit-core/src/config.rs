//! TOML configuration with environment overrides.
//!
//! The file is optional: defaults cover everything, and the deployment's
//! environment variables (`WHATSAPP_*`, `SUPABASE_*`, `GROQ_API_KEY`, ...)
//! take precedence over whatever the file says, so a bare container with
//! only env vars set runs unchanged. A missing credential never aborts the
//! process — the owning component degrades to a warn-once fallback.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::KonbitError;

/// Top-level Konbit configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Inbound webhook server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret echoed back during the platform's GET handshake.
    #[serde(default)]
    pub verify_token: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verify_token: String::new(),
        }
    }
}

/// Messaging platform (WhatsApp Cloud API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            base_url: default_graph_base_url(),
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Object storage (media archive) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            bucket: default_bucket(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// AI provider selection and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Active backend: "groq" or "openrouter".
    #[serde(default = "default_provider")]
    pub default: String,
    /// System instruction: persona plus the official facts the bot must not
    /// hallucinate beyond.
    #[serde(default = "default_persona")]
    pub persona: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub groq: Option<GroqConfig>,
    pub openrouter: Option<OpenRouterConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            persona: default_persona(),
            timeout_secs: default_timeout_secs(),
            groq: None,
            openrouter: None,
        }
    }
}

/// Groq backend config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_groq_model")]
    pub model: String,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_groq_model(),
        }
    }
}

/// OpenRouter backend config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openrouter_model")]
    pub model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openrouter_model(),
        }
    }
}

/// Conversation store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// How many recent turns feed the AI prompt.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    10000
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v21.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bucket() -> String {
    "media".to_string()
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_groq_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_openrouter_model() -> String {
    "meta-llama/llama-3.1-8b-instruct".to_string()
}

fn default_db_path() -> String {
    "konbit.db".to_string()
}

fn default_history_limit() -> usize {
    8
}

fn default_persona() -> String {
    "Ou se yon asistan pwofesyonèl Elmidor Group sou WhatsApp. \
     Ou reponn senp, klè, kout, pwofesyonèl.\n\n\
     ENFÒMASYON OFISYÈL:\n\
     - Elmidor Group devlope workflow, otomasyon, fòmasyon ak sèvis enpresyon \
       pou jen antreprenè.\n\
     - Sit ofisyèl: https://www.elmidorgroup.com\n\n\
     REGLEMAN:\n\
     - Toujou reponn an 2 a 4 fraz, pa depase 300 karaktè.\n\
     - Pa janm envante enfòmasyon; sèvi sèlman ak resous ofisyèl yo.\n\
     - Si kesyon an pa klè, poze yon sèl kesyon pou klarifikasyon."
        .to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, KonbitError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KonbitError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| KonbitError::Config(format!("failed to parse config: {e}")))?
    } else {
        info!("config file not found at {}, using defaults", path.display());
        Config::default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Overlay the deployment's environment variables on the loaded file.
fn apply_env_overrides(config: &mut Config) {
    if let Some(v) = env_var("WHATSAPP_VERIFY_TOKEN") {
        config.webhook.verify_token = v;
    }
    if let Some(v) = env_var("PORT").and_then(|v| v.parse().ok()) {
        config.webhook.port = v;
    }
    if let Some(v) = env_var("WHATSAPP_ACCESS_TOKEN") {
        config.platform.access_token = v;
    }
    if let Some(v) = env_var("WHATSAPP_PHONE_NUMBER_ID") {
        config.platform.phone_number_id = v;
    }
    if let Some(v) = env_var("SUPABASE_URL") {
        config.storage.url = v;
    }
    if let Some(v) = env_var("SUPABASE_SERVICE_KEY") {
        config.storage.service_key = v;
    }
    if let Some(v) = env_var("SUPABASE_MEDIA_BUCKET") {
        config.storage.bucket = v;
    }
    if let Some(v) = env_var("KONBIT_PROVIDER") {
        config.provider.default = v;
    }
    if let Some(v) = env_var("GROQ_API_KEY") {
        config.provider.groq.get_or_insert_with(Default::default).api_key = v;
    }
    if let Some(v) = env_var("OPENROUTER_API_KEY") {
        config
            .provider
            .openrouter
            .get_or_insert_with(Default::default)
            .api_key = v;
    }
    if let Some(v) = env_var("CONVERSATION_HISTORY_LIMIT").and_then(|v| v.parse().ok()) {
        config.memory.history_limit = v;
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
