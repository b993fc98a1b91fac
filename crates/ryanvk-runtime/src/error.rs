//! Runtime error types.

use ryanvk_core::ComposeError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::logging::LoggingError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    /// Composing a protocol's collectors failed.
    #[error("Failed to compose protocol '{protocol}': {source}")]
    Compose {
        protocol: String,
        #[source]
        source: ComposeError,
    },

    #[error("Protocol not found: {0}")]
    ProtocolNotFound(String),

    #[error("Protocol already registered: {0}")]
    ProtocolExists(String),

    #[error("Account '{account}' already registered for protocol '{protocol}'")]
    AccountExists { protocol: String, account: String },

    #[error("Account '{account}' not found for protocol '{protocol}'")]
    AccountNotFound { protocol: String, account: String },
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
