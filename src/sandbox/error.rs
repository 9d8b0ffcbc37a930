// Error types for the sandbox's fallible edges: configuration, asset loads
// and name persistence. None of these are fatal to a running session.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no model registered for '{0}'")]
    Missing(String),
    #[error("failed to read model manifest {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("malformed model '{key}': {reason}")]
    Malformed { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum NameStoreError {
    #[error("name store io error at {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("name store holds invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key and name must both be non-blank")]
    Blank,
    #[error("name store unavailable: {0}")]
    Unavailable(String),
}
