//! # Event Bus System
//!
//! Provides an event-driven architecture for the upload engine using `tokio::sync::broadcast`.
//! Queue state changes and share reachability results are published as typed events so a
//! UI, a log forwarder or an automation script can observe the engine without polling.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for uploads and the remote share
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ UploadQueue  ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//!                                │ (broadcast│                  └────────────┘
//! ┌──────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Coordinator  ├──────────────>│           ├─────────────────>│ Subscriber │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Upload(UploadEvent::Enqueued {
//!         transfer_id: "t-1".to_string(),
//!         file_name: "IMG_0001.JPG".to_string(),
//!         total_bytes: 4096,
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Upload(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   Non-fatal; the queue snapshot is always the source of truth.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error which publishers ignore.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Upload queue events
    Upload(UploadEvent),
    /// Remote share events
    Remote(RemoteEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Remote(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Upload(UploadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Remote(RemoteEvent::Unreachable { .. }) => EventSeverity::Warning,
            CoreEvent::Upload(UploadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Remote(RemoteEvent::Reachable { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events emitted by the upload queue as items move through their lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// A file was appended to the queue as `Pending`.
    Enqueued {
        transfer_id: String,
        file_name: String,
        total_bytes: u64,
    },
    /// The head-most pending item started uploading.
    Started {
        transfer_id: String,
        file_name: String,
        total_bytes: u64,
    },
    /// Bytes written so far for the in-flight item.
    Progress {
        transfer_id: String,
        file_name: String,
        bytes_transferred: u64,
        total_bytes: u64,
    },
    /// Upload finished; the name now counts as present remotely.
    Completed {
        transfer_id: String,
        file_name: String,
        total_bytes: u64,
        /// Wall time of the transfer in milliseconds
        duration_ms: u64,
    },
    /// Upload failed; the queue stalls until the item is retried or cancelled.
    Failed {
        transfer_id: String,
        file_name: String,
        message: String,
    },
    /// A failed item was reset to `Pending`.
    Retried {
        transfer_id: String,
        file_name: String,
    },
    /// An item was removed from the queue.
    Cancelled {
        transfer_id: String,
        file_name: String,
    },
    /// Finished items were dropped from the queue view.
    Acknowledged {
        /// Number of items removed
        count: usize,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Enqueued { .. } => "File queued for upload",
            UploadEvent::Started { .. } => "Upload started",
            UploadEvent::Progress { .. } => "Upload progress",
            UploadEvent::Completed { .. } => "Upload completed",
            UploadEvent::Failed { .. } => "Upload failed",
            UploadEvent::Retried { .. } => "Upload retried",
            UploadEvent::Cancelled { .. } => "Upload cancelled",
            UploadEvent::Acknowledged { .. } => "Completed uploads acknowledged",
        }
    }

    /// Name of the file the event refers to, if any.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            UploadEvent::Enqueued { file_name, .. }
            | UploadEvent::Started { file_name, .. }
            | UploadEvent::Progress { file_name, .. }
            | UploadEvent::Completed { file_name, .. }
            | UploadEvent::Failed { file_name, .. }
            | UploadEvent::Retried { file_name, .. }
            | UploadEvent::Cancelled { file_name, .. } => Some(file_name),
            UploadEvent::Acknowledged { .. } => None,
        }
    }
}

// ============================================================================
// Remote Share Events
// ============================================================================

/// Events about the remote share session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RemoteEvent {
    /// Connection test succeeded.
    Reachable {
        /// `smb://server/share/dir/`
        share_url: String,
    },
    /// Connection test or listing failed.
    Unreachable { share_url: String, message: String },
    /// The known remote names were replaced by a fresh listing.
    Listed {
        share_url: String,
        /// Number of names now known to be present
        file_count: usize,
    },
}

impl RemoteEvent {
    fn description(&self) -> &str {
        match self {
            RemoteEvent::Reachable { .. } => "Share reachable",
            RemoteEvent::Unreachable { .. } => "Share unreachable",
            RemoteEvent::Listed { .. } => "Remote listing refreshed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to engine events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribes and wraps the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

// ============================================================================
// Event Stream with Filtering
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Wrapper around a broadcast receiver with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, UploadEvent};
///
/// let event_bus = EventBus::new(100);
/// let failures = event_bus
///     .stream()
///     .filter(|event| matches!(event, CoreEvent::Upload(UploadEvent::Failed { .. })));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only upload events for `file_name`.
    pub fn for_file(self, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        self.filter(move |event| match event {
            CoreEvent::Upload(upload) => upload.file_name() == Some(file_name.as_str()),
            CoreEvent::Remote(_) => false,
        })
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Next matching event without waiting; `None` once the buffer is empty.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}
