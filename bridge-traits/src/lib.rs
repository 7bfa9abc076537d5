//! # Host Bridge Traits
//!
//! Contracts between the upload engine and the collaborators it deliberately
//! does not implement itself.
//!
//! ## Overview
//!
//! The engine decides *what* to upload and in which order; everything that
//! touches a wire protocol or a device lives behind one of these traits:
//!
//! - [`RemoteStore`](storage::RemoteStore) - list, check and upload into a network share
//! - [`RemoteStoreConnector`](storage::RemoteStoreConnector) - build a store session from [`ShareSettings`](storage::ShareSettings)
//! - [`LocalMediaSource`](media::LocalMediaSource) - enumerate the camera's removable storage
//! - [`Clock`](time::Clock) - time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Mounted share + removable volumes |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! Connection-level failures use [`ConnectError`](error::ConnectError), upload
//! failures use [`TransferError`](error::TransferError), and everything else
//! (local discovery, sinks) uses [`BridgeError`](error::BridgeError). Adapters
//! should convert protocol errors into these types with actionable messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the engine shares them across tasks
//! behind `Arc`.

pub mod error;
pub mod media;
pub mod storage;
pub mod time;

pub use error::{BridgeError, ConnectError, TransferError};

// Re-export commonly used types
pub use media::{FileRef, LocalMediaSource};
pub use storage::{
    ProgressCallback, RemoteEntry, RemoteStore, RemoteStoreConnector, ShareSettings,
    DEFAULT_CHUNK_SIZE,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
pub use tokio_util::sync::CancellationToken;
