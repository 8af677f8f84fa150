use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Configuration backup `{0}` not found")]
    BackupNotFound(String),
}
