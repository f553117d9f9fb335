//! Error types for gateway operations.

use thiserror::Error;

/// Errors returned by [`crate::GatewayClient`] and [`crate::GatewayConfig`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached (connect, timeout, DNS, non-2xx).
    #[error("connection error: {0}")]
    Connection(String),

    /// The gateway answered but reported a failure in its response body.
    #[error("gateway error: {0}")]
    Api(String),

    /// The gateway answered with a body we could not make sense of.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    /// The config file exists but could not be parsed.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// No home directory could be determined for default paths.
    #[error("could not determine home directory")]
    NoHomeDirectory,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for GatewayError {
    fn from(err: serde_yaml::Error) -> Self {
        GatewayError::ConfigInvalid(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;
