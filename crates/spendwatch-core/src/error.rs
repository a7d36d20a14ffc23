//! Error types for SpendWatch

use thiserror::Error;

/// Result type alias using SpendWatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for SpendWatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// Could not open or negotiate a database session
    #[error("Database connection error: {0}")]
    Connection(String),

    /// The spend lookup failed after the session was established
    #[error("Database query error: {0}")]
    Query(String),

    /// Bearer credential could not be obtained
    #[error("Credential exchange failed: {0}")]
    Credential(String),

    /// Service-account key file could not be loaded
    #[error("Key file error: {0}")]
    KeyFile(String),

    /// Monitoring endpoint answered with a non-200 status
    #[error("Publish failed with status {status}: {body}")]
    PublishHttp {
        /// HTTP status code
        status: u16,
        /// Response body as text
        body: String,
    },

    /// Monitoring endpoint could not be reached
    #[error("Publish transport error: {0}")]
    PublishTransport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create a key file error
    pub fn key_file(msg: impl Into<String>) -> Self {
        Self::KeyFile(msg.into())
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
