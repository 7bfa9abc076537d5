//! # Upload Queue
//!
//! Ordered, single-flight upload queue.
//!
//! ## Overview
//!
//! Items are served strictly in enqueue order and at most one is `Uploading`
//! at any instant. A failed upload stalls the queue: nothing else starts until
//! the caller retries or cancels the failed item, so one bad file can never be
//! skipped silently.
//!
//! The queue also owns the set of names known to exist on the share. Both a
//! listing refresh and a successful upload write to it, under the same lock as
//! the items, so neither can lose the other's update.
//!
//! ## Concurrency
//!
//! All state sits behind one `std::sync::Mutex` that is never held across an
//! `.await`. Progress callbacks from the in-flight upload take the lock
//! briefly to update the matching item.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let queue = UploadQueue::new(Arc::new(SystemClock));
//! queue.enqueue(file)?;
//! match queue.drain(store.as_ref(), CancellationToken::new()).await {
//!     DrainOutcome::Completed { name, .. } => println!("{} uploaded", name),
//!     DrainOutcome::Failed { name, message, .. } => println!("{}: {}", name, message),
//!     _ => {}
//! }
//! ```

use crate::transfer::{QueueSnapshot, TransferId, TransferItem, TransferStatus};
use crate::{Result, SyncError};
use bridge_traits::{CancellationToken, Clock, FileRef, ProgressCallback, RemoteStore};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Result of one drain step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing pending
    Idle,
    /// Another upload is already in flight
    Busy,
    /// A failed item blocks the queue
    Stalled { name: String },
    /// The head-most pending item was uploaded
    Completed { id: TransferId, name: String },
    /// The head-most pending item failed and now stalls the queue
    Failed {
        id: TransferId,
        name: String,
        message: String,
    },
}

impl DrainOutcome {
    /// Whether this step ran a transfer
    pub fn transferred(&self) -> bool {
        matches!(
            self,
            DrainOutcome::Completed { .. } | DrainOutcome::Failed { .. }
        )
    }
}

#[derive(Default)]
struct QueueState {
    items: Vec<TransferItem>,
    /// Names known to exist remotely (last listing plus this session's uploads)
    remote_names: HashSet<String>,
    /// Names uploaded by this session; survive listing refreshes
    session_uploads: HashSet<String>,
}

impl QueueState {
    fn find_mut(&mut self, name: &str) -> Option<&mut TransferItem> {
        self.items.iter_mut().find(|item| item.file.name == name)
    }

    fn find_by_id_mut(&mut self, id: TransferId) -> Option<&mut TransferItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }
}

fn lock_state(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Single-flight FIFO upload queue
pub struct UploadQueue {
    state: Arc<Mutex<QueueState>>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl UploadQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            clock,
            event_bus: None,
        }
    }

    /// Publish state changes on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        lock_state(&self.state)
    }

    fn publish(&self, event: UploadEvent) {
        publish(self.event_bus.as_ref(), event);
    }

    /// Append a pending item for `file`.
    ///
    /// # Errors
    ///
    /// - `AlreadyQueued` if an item with the same name is pending, uploading
    ///   or failed
    /// - `AlreadyUploaded` if the name was uploaded or is known remotely
    pub fn enqueue(&self, file: FileRef) -> Result<TransferId> {
        let item = {
            let mut state = self.lock();

            if let Some(existing) = state.items.iter().find(|item| item.file.name == file.name) {
                return Err(match existing.status {
                    TransferStatus::Uploaded => SyncError::AlreadyUploaded { name: file.name },
                    _ => SyncError::AlreadyQueued { name: file.name },
                });
            }

            if state.remote_names.contains(&file.name) {
                return Err(SyncError::AlreadyUploaded { name: file.name });
            }

            let item = TransferItem::new(file, self.clock.unix_timestamp_millis());
            state.items.push(item.clone());
            item
        };

        info!(
            transfer_id = %item.id,
            file = %item.file.name,
            bytes = item.total_bytes,
            "Enqueued upload"
        );

        self.publish(UploadEvent::Enqueued {
            transfer_id: item.id.to_string(),
            file_name: item.file.name.clone(),
            total_bytes: item.total_bytes,
        });

        Ok(item.id)
    }

    /// Run one step of the queue.
    ///
    /// If nothing is uploading and nothing has failed, the head-most pending
    /// item is uploaded through `store`. Upload errors never escape: they turn
    /// the item `Failed` and are reported in the outcome.
    pub async fn drain(&self, store: &dyn RemoteStore, cancel: CancellationToken) -> DrainOutcome {
        let (id, file) = {
            let mut state = self.lock();

            if state
                .items
                .iter()
                .any(|item| item.status == TransferStatus::Uploading)
            {
                return DrainOutcome::Busy;
            }

            if let Some(failed) = state
                .items
                .iter()
                .find(|item| item.status == TransferStatus::Failed)
            {
                debug!(file = %failed.file.name, "Queue stalled on failed upload");
                return DrainOutcome::Stalled {
                    name: failed.file.name.clone(),
                };
            }

            let now = self.clock.unix_timestamp_millis();
            let Some(next) = state
                .items
                .iter_mut()
                .find(|item| item.status == TransferStatus::Pending)
            else {
                return DrainOutcome::Idle;
            };

            if let Err(err) = next.start(now) {
                warn!(file = %next.file.name, error = %err, "Could not start upload");
                return DrainOutcome::Idle;
            }

            (next.id, next.file.clone())
        };

        info!(
            transfer_id = %id,
            file = %file.name,
            bytes = file.size_bytes,
            "Upload started"
        );

        self.publish(UploadEvent::Started {
            transfer_id: id.to_string(),
            file_name: file.name.clone(),
            total_bytes: file.size_bytes,
        });

        let result = store
            .upload(&file, self.progress_callback(id, &file.name), cancel)
            .await;

        let now = self.clock.unix_timestamp_millis();
        match result {
            Ok(()) => {
                let (total_bytes, duration_ms) = {
                    let mut state = self.lock();
                    state.remote_names.insert(file.name.clone());
                    state.session_uploads.insert(file.name.clone());

                    match state.find_by_id_mut(id) {
                        Some(item) => {
                            if let Err(err) = item.complete(now) {
                                warn!(file = %file.name, error = %err, "Could not mark upload complete");
                            }
                            (item.total_bytes, item.duration_ms().unwrap_or(0))
                        }
                        None => (file.size_bytes, 0),
                    }
                };

                info!(
                    transfer_id = %id,
                    file = %file.name,
                    bytes = total_bytes,
                    duration_ms,
                    "Upload completed"
                );

                self.publish(UploadEvent::Completed {
                    transfer_id: id.to_string(),
                    file_name: file.name.clone(),
                    total_bytes,
                    duration_ms,
                });

                DrainOutcome::Completed {
                    id,
                    name: file.name,
                }
            }
            Err(err) => {
                let message = err.to_string();
                {
                    let mut state = self.lock();
                    if let Some(item) = state.find_by_id_mut(id) {
                        if let Err(transition) = item.fail(message.clone(), now) {
                            warn!(file = %file.name, error = %transition, "Could not mark upload failed");
                        }
                    }
                }

                warn!(
                    transfer_id = %id,
                    file = %file.name,
                    error = %message,
                    "Upload failed; queue stalled until retry or cancel"
                );

                self.publish(UploadEvent::Failed {
                    transfer_id: id.to_string(),
                    file_name: file.name.clone(),
                    message: message.clone(),
                });

                DrainOutcome::Failed {
                    id,
                    name: file.name,
                    message,
                }
            }
        }
    }

    fn progress_callback(&self, id: TransferId, name: &str) -> ProgressCallback {
        let state = Arc::clone(&self.state);
        let event_bus = self.event_bus.clone();
        let name = name.to_string();

        Arc::new(move |written: u64, total: u64| {
            let update = {
                let mut state = lock_state(&state);
                match state.find_by_id_mut(id) {
                    Some(item) => item
                        .record_progress(written, total)
                        .then(|| (item.bytes_transferred, item.total_bytes)),
                    None => None,
                }
            };

            if let Some((bytes_transferred, total_bytes)) = update {
                publish(
                    event_bus.as_ref(),
                    UploadEvent::Progress {
                        transfer_id: id.to_string(),
                        file_name: name.clone(),
                        bytes_transferred,
                        total_bytes,
                    },
                );
            }
        })
    }

    /// Reset a failed item to `Pending`, keeping its queue position.
    ///
    /// # Errors
    ///
    /// `NotFound` if no item has that name, `NotFailed` if it is not failed.
    pub fn retry(&self, name: &str) -> Result<TransferId> {
        let id = {
            let mut state = self.lock();
            let item = state.find_mut(name).ok_or_else(|| SyncError::NotFound {
                name: name.to_string(),
            })?;
            item.reset_for_retry()?;
            item.id
        };

        info!(transfer_id = %id, file = %name, "Upload reset for retry");

        self.publish(UploadEvent::Retried {
            transfer_id: id.to_string(),
            file_name: name.to_string(),
        });

        Ok(id)
    }

    /// Remove a pending or failed item from the queue.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no item has that name
    /// - `TransferInProgress` if the item is uploading
    /// - `AlreadyUploaded` if the item already finished
    pub fn cancel(&self, name: &str) -> Result<TransferItem> {
        let removed = {
            let mut state = self.lock();
            let index = state
                .items
                .iter()
                .position(|item| item.file.name == name)
                .ok_or_else(|| SyncError::NotFound {
                    name: name.to_string(),
                })?;

            let status = state.items[index].status;
            if !status.is_removable() {
                let name = name.to_string();
                return Err(match status {
                    TransferStatus::Uploaded => SyncError::AlreadyUploaded { name },
                    _ => SyncError::TransferInProgress { name },
                });
            }
            state.items.remove(index)
        };

        info!(
            transfer_id = %removed.id,
            file = %name,
            status = %removed.status,
            "Upload removed from queue"
        );

        self.publish(UploadEvent::Cancelled {
            transfer_id: removed.id.to_string(),
            file_name: name.to_string(),
        });

        Ok(removed)
    }

    /// Drop uploaded items from the queue. Their names stay known remotely.
    ///
    /// Returns the number of items removed.
    pub fn acknowledge_completed(&self) -> usize {
        let count = {
            let mut state = self.lock();
            let before = state.items.len();
            state
                .items
                .retain(|item| item.status != TransferStatus::Uploaded);
            before - state.items.len()
        };

        if count > 0 {
            debug!(count, "Acknowledged completed uploads");
            self.publish(UploadEvent::Acknowledged { count });
        }

        count
    }

    /// Copy of every item in queue order.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.lock().items.clone(),
        }
    }

    /// Names `enqueue` would reject as already queued: every item that is
    /// pending, uploading or failed
    pub fn queued_names(&self) -> HashSet<String> {
        self.lock()
            .items
            .iter()
            .filter(|item| item.status.is_queued())
            .map(|item| item.file.name.clone())
            .collect()
    }

    /// Whether a drain step could start a transfer right now
    pub fn has_runnable_work(&self) -> bool {
        let state = self.lock();
        let blocked = state
            .items
            .iter()
            .any(|item| matches!(item.status, TransferStatus::Uploading | TransferStatus::Failed));
        !blocked
            && state
                .items
                .iter()
                .any(|item| item.status == TransferStatus::Pending)
    }

    /// Names known to exist on the share
    pub fn remote_names(&self) -> HashSet<String> {
        self.lock().remote_names.clone()
    }

    pub fn is_known_remote(&self, name: &str) -> bool {
        self.lock().remote_names.contains(name)
    }

    /// Replace the known remote names with a fresh listing.
    ///
    /// Names uploaded during this session are kept even when the listing was
    /// taken before their upload finished. Returns the resulting count.
    pub fn replace_remote_names(&self, listing: HashSet<String>) -> usize {
        let mut state = self.lock();
        let mut names = listing;
        names.extend(state.session_uploads.iter().cloned());
        state.remote_names = names;
        state.remote_names.len()
    }

    /// Consistent copy of the remote names and the queue.
    pub fn view(&self) -> (HashSet<String>, QueueSnapshot) {
        let state = self.lock();
        (
            state.remote_names.clone(),
            QueueSnapshot {
                items: state.items.clone(),
            },
        )
    }
}

fn publish(event_bus: Option<&EventBus>, event: UploadEvent) {
    if let Some(bus) = event_bus {
        // No subscribers is fine
        bus.emit(CoreEvent::Upload(event)).ok();
    }
}
