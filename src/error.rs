//! Error types for the env-injector webhook

use thiserror::Error;

/// Main error type for webhook operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// Pod selector in the configuration is malformed
    #[error("invalid label selector: {0}")]
    Selector(String),

    /// Serialization/deserialization error while assembling a patch
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a selector error with the given message
    pub fn selector(msg: impl Into<String>) -> Self {
        Self::Selector(msg.into())
    }
}
