use bridge_traits::ConnectError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Share is not configured: {0}")]
    ShareNotConfigured(#[source] ConnectError),

    #[error("Failed to read share settings from {}: {source}", .path.display())]
    SettingsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid share settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
