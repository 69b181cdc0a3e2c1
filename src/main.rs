mod payload;
mod processor;
mod reply;
mod server;

use clap::{Parser, Subcommand};
use konbit_core::config::{self, Config, ProviderConfig};
use konbit_core::traits::Provider;
use konbit_platform::PlatformClient;
use konbit_providers::{groq::GroqProvider, openrouter::OpenRouterProvider};
use konbit_storage::StorageClient;
use konbit_store::Store;
use processor::Processor;
use reply::ReplyGenerator;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "konbit", version, about = "Konbit — WhatsApp assistant gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Serve,
    /// Check configuration and provider availability.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve => {
            let cfg = config::load(&cli.config)?;
            warn_degraded(&cfg);

            let store = Store::new(&cfg.memory).await?;
            let provider = build_provider(&cfg.provider)?;
            let platform = PlatformClient::from_config(&cfg.platform);
            let storage = StorageClient::from_config(&cfg.storage);

            let generator = ReplyGenerator::new(
                provider,
                store.clone(),
                cfg.memory.history_limit,
                cfg.provider.persona.clone(),
            );
            let processor = Arc::new(Processor::new(store, platform, storage, generator));

            server::serve(&cfg.webhook, processor).await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Konbit — status\n");
            println!("Config: {}", cli.config);
            println!("Provider: {}", cfg.provider.default);

            let provider = build_provider(&cfg.provider)?;
            println!(
                "  {}: {}",
                provider.name(),
                if provider.is_available().await {
                    "available"
                } else {
                    "not available"
                }
            );

            let platform = PlatformClient::from_config(&cfg.platform);
            println!(
                "Platform: {}",
                if platform.is_configured() {
                    "configured"
                } else {
                    "missing credentials"
                }
            );

            let storage = StorageClient::from_config(&cfg.storage);
            println!(
                "Storage: {}",
                if storage.is_configured() {
                    "configured"
                } else {
                    "missing credentials (archiving disabled)"
                }
            );

            println!("Database: {}", cfg.memory.db_path);
            println!("History window: {}", cfg.memory.history_limit);
        }
    }

    Ok(())
}

/// Build the configured provider.
fn build_provider(cfg: &ProviderConfig) -> anyhow::Result<Arc<dyn Provider>> {
    match cfg.default.as_str() {
        "groq" => {
            let groq = cfg.groq.clone().unwrap_or_default();
            Ok(Arc::new(GroqProvider::from_config(
                groq.api_key,
                groq.model,
                cfg.timeout_secs,
            )))
        }
        "openrouter" => {
            let openrouter = cfg.openrouter.clone().unwrap_or_default();
            Ok(Arc::new(OpenRouterProvider::from_config(
                openrouter.api_key,
                openrouter.model,
                cfg.timeout_secs,
            )))
        }
        other => anyhow::bail!("unsupported provider: {other}"),
    }
}

/// Warn once at startup for every component that will run degraded.
fn warn_degraded(cfg: &Config) {
    if cfg.webhook.verify_token.is_empty() {
        warn!("WHATSAPP_VERIFY_TOKEN not set: the GET handshake will reject everything");
    }
    if cfg.platform.access_token.is_empty() || cfg.platform.phone_number_id.is_empty() {
        warn!("platform credentials missing: outbound messages will be dropped");
    }
    if cfg.storage.url.is_empty() || cfg.storage.service_key.is_empty() {
        warn!("storage credentials missing: media archiving disabled");
    }
    let has_key = match cfg.provider.default.as_str() {
        "openrouter" => cfg
            .provider
            .openrouter
            .as_ref()
            .is_some_and(|c| !c.api_key.is_empty()),
        _ => cfg.provider.groq.as_ref().is_some_and(|c| !c.api_key.is_empty()),
    };
    if !has_key {
        warn!(
            "no API key for provider '{}': AI replies degrade to the fixed fallback",
            cfg.provider.default
        );
    }
}
