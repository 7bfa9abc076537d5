use bridge_traits::{BridgeError, ConnectError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{name} is already queued")]
    AlreadyQueued { name: String },

    #[error("{name} is already uploaded")]
    AlreadyUploaded { name: String },

    #[error("{name} is {status}; only failed uploads can be retried")]
    NotFailed { name: String, status: String },

    #[error("No queued upload named {name}")]
    NotFound { name: String },

    #[error("{name} is uploading and cannot be removed mid-transfer")]
    TransferInProgress { name: String },

    #[error("Remote share error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Local media discovery failed: {0}")]
    Discovery(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
