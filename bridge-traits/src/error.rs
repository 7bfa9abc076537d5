use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure to reach, authenticate against, or list the remote share.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Remote share is not configured: {0}")]
    NotConfigured(String),

    #[error("Remote share unreachable at {location}: {reason}")]
    Unreachable { location: String, reason: String },

    #[error("Authentication rejected for user {username}")]
    AuthenticationFailed { username: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single in-flight upload.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Local source unavailable for {name}: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("Remote share rejected {name}: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Transfer of {name} interrupted after {written} bytes: {reason}")]
    Interrupted {
        name: String,
        written: u64,
        reason: String,
    },

    #[error("Transfer of {name} cancelled")]
    Cancelled { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
