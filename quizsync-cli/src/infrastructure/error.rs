use quizsync_core::ProviderError;
use quizsync_p2p::P2PError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory not found: {path}")]
    MissingDirectory { path: PathBuf },

    #[error("Storage error: {0}")]
    Storage(#[from] ProviderError),

    #[error("Sync error: {0}")]
    Sync(#[from] P2PError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl CliError {
    pub fn missing_directory(path: PathBuf) -> Self {
        CliError::MissingDirectory { path }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
