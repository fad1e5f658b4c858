//! Error types for tiered-config.
//!
//! Very little in this crate surfaces errors to the caller. Sources that fail to
//! initialize are logged and left out, and missing or mistyped keys simply
//! resolve to `None`. The variants below are what construction paths and the
//! distributed-store clients report internally before that degradation happens.

/// Result type alias for tiered-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while building sources or talking to a key-value store.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A distributed-store client failed to build, connect or decode a response.
    #[error("Key-value client error: {0}")]
    ClientError(String),

    /// The distributed backend discriminant is not recognized.
    #[error("Unknown configuration extension: {0:?}")]
    InvalidExtension(String),

    /// No configuration source could be activated at all.
    #[error("No configuration sources available")]
    NoSources,

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

#[cfg(any(feature = "consul", feature = "etcd"))]
impl From<reqwest::Error> for ConfigError {
    fn from(err: reqwest::Error) -> Self {
        ConfigError::ClientError(err.to_string())
    }
}
