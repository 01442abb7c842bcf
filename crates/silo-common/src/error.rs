//! Error types for SILO

use thiserror::Error;

/// Result type alias for SILO operations
pub type Result<T> = std::result::Result<T, SiloError>;

/// Main error type for SILO
#[derive(Error, Debug)]
pub enum SiloError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown text encoding: '{0}'")]
    UnknownEncoding(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
