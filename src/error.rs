use thiserror::Error;

use crate::verify::VerificationFailure;

/// Main error type for harness operations
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unresolved variable: {0}")]
    UnresolvedVariable(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error(transparent)]
    Verification(#[from] VerificationFailure),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
