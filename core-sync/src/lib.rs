//! # Upload Sync Engine
//!
//! Synchronizes camera media from removable storage to a network share.
//!
//! ## Overview
//!
//! This module decides what to upload and runs the uploads one at a time:
//! - Reconciling local candidates against remote names (`SyncPlanner`)
//! - Serializing uploads into a single-flight FIFO queue (`UploadQueue`)
//! - Tracking each file through `Pending → Uploading → Uploaded | Failed`
//! - Publishing queue changes on the runtime `EventBus`
//!
//! The wire protocol is not part of this crate. Everything that talks to the
//! share goes through `bridge_traits::RemoteStore`.
//!
//! ## Components
//!
//! - **Transfer Model** (`transfer`): Transfer items, statuses and queue snapshots
//! - **Planner** (`planner`): Pure eligibility filter over name sets
//! - **Upload Queue** (`upload_queue`): Ordering, single-flight, retry and cancel
//! - **Sync Coordinator** (`coordinator`): Session wiring and the scheduling loop

pub mod coordinator;
pub mod error;
pub mod planner;
pub mod transfer;
pub mod upload_queue;

pub use coordinator::{SchedulerSignal, SyncCoordinator, SyncState};
pub use error::{Result, SyncError};
pub use planner::SyncPlanner;
pub use transfer::{
    format_file_size, QueueSnapshot, QueueSummary, TransferId, TransferItem, TransferStatus,
};
pub use upload_queue::{DrainOutcome, UploadQueue};
