use thiserror::Error;

/// Top-level error type for Konbit.
#[derive(Debug, Error)]
pub enum KonbitError {
    /// Error from the messaging platform API.
    #[error("platform error: {0}")]
    Platform(String),

    /// Error from an AI provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the object storage backend.
    #[error("storage error: {0}")]
    Storage(String),

    /// Conversation store error.
    #[error("store error: {0}")]
    Memory(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
