//! Error types for snowkit

use thiserror::Error;

/// Core error type for snowkit operations
#[derive(Error, Debug)]
pub enum SnowkitError {
    /// A required collaborator (driver, secrets file) is missing or the
    /// configuration cannot be used at all. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A configuration value has the wrong shape for its field.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl SnowkitError {
    /// Shorthand for building an [`SnowkitError::InvalidConfig`].
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error reports a missing capability rather than a failure.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

/// Result type alias for snowkit operations
pub type Result<T> = std::result::Result<T, SnowkitError>;
