//! # Sync Coordinator
//!
//! Wires local discovery, the remote share and the upload queue together.
//!
//! ## Overview
//!
//! The `SyncCoordinator` is deliberately thin. It:
//! - opens the remote session once, from an explicit [`CoreConfig`]
//! - refreshes the known remote names and checks reachability
//! - runs the planner over local candidates and enqueues the result
//! - owns the scheduling loop that drains the queue one upload at a time
//! - republishes `{remote_names, queue}` as a single [`SyncState`]
//!
//! Retry, failure and progress rules all live in [`UploadQueue`].
//!
//! ## Scheduling
//!
//! [`SyncCoordinator::spawn_scheduler`] starts one task consuming
//! [`SchedulerSignal`]s. Every queue mutation made through the coordinator
//! posts `QueueChanged`; the task then drains one upload at a time until
//! nothing new can start, checking for `Shutdown` between uploads.
//! Callers without a runtime task can drive the same step inline with
//! [`SyncCoordinator::drain_until_idle`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = Arc::new(SyncCoordinator::new(config)?);
//! let scheduler = coordinator.spawn_scheduler();
//!
//! coordinator.refresh_remote_names().await?;
//! coordinator.plan_and_enqueue_all().await?;
//!
//! let state = coordinator.state();
//! println!("{} known remotely, {} queued", state.remote_names.len(), state.queue.len());
//! ```

use crate::planner::SyncPlanner;
use crate::transfer::{QueueSnapshot, TransferId, TransferItem};
use crate::upload_queue::{DrainOutcome, UploadQueue};
use crate::{Result, SyncError};
use bridge_traits::{CancellationToken, FileRef, RemoteEntry, RemoteStore};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, RemoteEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Messages consumed by the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSignal {
    /// The queue changed; start the next upload if possible
    QueueChanged,
    /// Stop the loop after the current upload
    Shutdown,
}

/// Merged view of the remote listing and the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub remote_names: HashSet<String>,
    pub queue: QueueSnapshot,
}

/// Orchestrates one upload session against one share.
pub struct SyncCoordinator {
    config: CoreConfig,
    store: Arc<dyn RemoteStore>,
    queue: UploadQueue,
    planner: SyncPlanner,
    event_bus: EventBus,
    abort: Mutex<CancellationToken>,
    scheduler: Mutex<Option<mpsc::UnboundedSender<SchedulerSignal>>>,
}

impl SyncCoordinator {
    /// Open the remote session described by `config`.
    ///
    /// This is the single place the "is the share configured" precondition
    /// is checked; no store exists if it fails.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let store = config
            .remote_connector
            .connect(&config.share, config.chunk_size_bytes)?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let queue = UploadQueue::new(Arc::clone(&config.clock)).with_event_bus(event_bus.clone());

        info!(
            share = %config.share.share_url(),
            username = %config.share.username,
            chunk_size_bytes = config.chunk_size_bytes,
            "Remote session opened"
        );

        Ok(Self {
            config,
            store,
            queue,
            planner: SyncPlanner::new(),
            event_bus,
            abort: Mutex::new(CancellationToken::new()),
            scheduler: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Bus carrying upload and share events for this session
    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn subscribe(&self) -> EventStream {
        self.event_bus.stream()
    }

    fn share_url(&self) -> String {
        self.config.share.share_url()
    }

    fn publish(&self, event: RemoteEvent) {
        self.event_bus.emit(CoreEvent::Remote(event)).ok();
    }

    // ------------------------------------------------------------------
    // Remote share
    // ------------------------------------------------------------------

    /// Replace the known remote names with a fresh listing.
    ///
    /// Returns the number of names now known.
    #[instrument(skip(self))]
    pub async fn refresh_remote_names(&self) -> Result<usize> {
        match self.store.list_names().await {
            Ok(listing) => {
                let count = self.queue.replace_remote_names(listing);
                info!(file_count = count, "Remote listing refreshed");
                self.publish(RemoteEvent::Listed {
                    share_url: self.share_url(),
                    file_count: count,
                });
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "Remote listing failed");
                self.publish(RemoteEvent::Unreachable {
                    share_url: self.share_url(),
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// Check that the share is reachable with the configured credentials.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> Result<()> {
        match self.store.test_reachable().await {
            Ok(()) => {
                info!(share = %self.share_url(), "Share reachable");
                self.publish(RemoteEvent::Reachable {
                    share_url: self.share_url(),
                });
                Ok(())
            }
            Err(err) => {
                warn!(share = %self.share_url(), error = %err, "Share unreachable");
                self.publish(RemoteEvent::Unreachable {
                    share_url: self.share_url(),
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    /// List a directory of the share, relative to its root.
    pub async fn browse(&self, relative_path: &str) -> Result<Vec<RemoteEntry>> {
        let entries = self.store.list_entries(relative_path).await?;
        debug!(path = relative_path, entries = entries.len(), "Browsed share");
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Local media and planning
    // ------------------------------------------------------------------

    pub async fn list_local_candidates(&self) -> Result<Vec<FileRef>> {
        Ok(self.config.media_source.list_local_candidates().await?)
    }

    /// Whether the camera volume is present and holds any files.
    pub async fn camera_connected(&self) -> bool {
        match self.list_local_candidates().await {
            Ok(files) => !files.is_empty(),
            Err(err) => {
                debug!(error = %err, "Camera volume not available");
                false
            }
        }
    }

    /// Local candidates that are neither known remotely nor in the queue.
    ///
    /// A failed item still holds its name, so its file is not offered again
    /// until it is retried or cancelled.
    pub async fn eligible_candidates(&self) -> Result<Vec<FileRef>> {
        let local = self.list_local_candidates().await?;
        let (remote_names, queued_names) = (self.queue.remote_names(), self.queue.queued_names());
        Ok(self.planner.plan(&local, &remote_names, &queued_names))
    }

    /// Enqueue every eligible local file, in discovery order.
    ///
    /// Files that become ineligible between planning and enqueue are skipped.
    pub async fn plan_and_enqueue_all(&self) -> Result<Vec<TransferId>> {
        let eligible = self.eligible_candidates().await?;
        let mut enqueued = Vec::with_capacity(eligible.len());

        for file in eligible {
            match self.queue.enqueue(file) {
                Ok(id) => enqueued.push(id),
                Err(err @ (SyncError::AlreadyQueued { .. } | SyncError::AlreadyUploaded { .. })) => {
                    debug!(error = %err, "Skipping ineligible file");
                }
                Err(err) => return Err(err),
            }
        }

        info!(count = enqueued.len(), "Enqueued eligible files");
        if !enqueued.is_empty() {
            self.notify_scheduler();
        }
        Ok(enqueued)
    }

    // ------------------------------------------------------------------
    // Queue operations
    // ------------------------------------------------------------------

    pub fn enqueue(&self, file: FileRef) -> Result<TransferId> {
        let id = self.queue.enqueue(file)?;
        self.notify_scheduler();
        Ok(id)
    }

    pub fn retry(&self, name: &str) -> Result<TransferId> {
        let id = self.queue.retry(name)?;
        self.notify_scheduler();
        Ok(id)
    }

    /// Remove a pending or failed item. Unblocks the queue when the removed
    /// item was the failed one.
    pub fn cancel(&self, name: &str) -> Result<TransferItem> {
        let removed = self.queue.cancel(name)?;
        self.notify_scheduler();
        Ok(removed)
    }

    pub fn acknowledge_completed(&self) -> usize {
        self.queue.acknowledge_completed()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.queue.snapshot()
    }

    /// Remote names and queue taken under one lock.
    pub fn state(&self) -> SyncState {
        let (remote_names, queue) = self.queue.view();
        SyncState {
            remote_names,
            queue,
        }
    }

    // ------------------------------------------------------------------
    // Draining
    // ------------------------------------------------------------------

    fn abort_token(&self) -> CancellationToken {
        self.abort
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Run a single drain step.
    pub async fn drain_once(&self) -> DrainOutcome {
        let cancel = self.abort_token();
        self.queue.drain(self.store.as_ref(), cancel).await
    }

    /// Drain until nothing new can start.
    ///
    /// Returns the outcome that stopped the loop: `Idle`, `Busy`,
    /// `Stalled` or `Failed`.
    pub async fn drain_until_idle(&self) -> DrainOutcome {
        loop {
            match self.drain_once().await {
                DrainOutcome::Completed { .. } => continue,
                outcome => return outcome,
            }
        }
    }

    /// Abort the in-flight upload, if any.
    ///
    /// The store stops at its next chunk boundary and the item turns
    /// `Failed`, after which `retry` and `cancel` apply as usual. Returns
    /// whether an upload was in flight.
    pub fn abort_in_flight(&self) -> bool {
        let in_flight = self.queue.snapshot().uploading().is_some();
        let previous = {
            let mut token = self
                .abort
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *token, CancellationToken::new())
        };
        previous.cancel();

        if in_flight {
            info!("Aborting in-flight upload");
        }
        in_flight
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Start the scheduling loop on the current tokio runtime.
    ///
    /// A loop started earlier is told to shut down first, so at most one
    /// loop drains the queue.
    pub fn spawn_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let (sender, receiver) = mpsc::unbounded_channel();

        // Pick up anything enqueued before the loop existed
        sender.send(SchedulerSignal::QueueChanged).ok();

        let previous = self
            .scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(sender);
        if let Some(previous) = previous {
            debug!("Replacing running scheduler");
            previous.send(SchedulerSignal::Shutdown).ok();
        }

        tokio::spawn(Arc::clone(self).run_scheduler(receiver))
    }

    async fn run_scheduler(self: Arc<Self>, mut receiver: mpsc::UnboundedReceiver<SchedulerSignal>) {
        debug!("Scheduler started");
        while let Some(signal) = receiver.recv().await {
            if signal == SchedulerSignal::Shutdown {
                break;
            }

            // One upload per step; signals are checked between steps so a
            // shutdown stops the loop after the in-flight upload
            let mut shutdown = false;
            let mut run_again = true;
            while run_again && !shutdown {
                let outcome = self.drain_once().await;
                run_again = matches!(outcome, DrainOutcome::Completed { .. })
                    && self.queue.has_runnable_work();

                while let Ok(pending) = receiver.try_recv() {
                    match pending {
                        SchedulerSignal::Shutdown => shutdown = true,
                        SchedulerSignal::QueueChanged => run_again = true,
                    }
                }
                debug!(?outcome, "Scheduler step finished");
            }
            if shutdown {
                break;
            }
        }
        debug!("Scheduler stopped");
    }

    /// Ask the scheduling loop to stop. It finishes the current upload first
    /// and starts no other.
    pub fn shutdown_scheduler(&self) {
        let sender = self
            .scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            sender.send(SchedulerSignal::Shutdown).ok();
        }
    }

    fn notify_scheduler(&self) {
        let slot = self
            .scheduler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(sender) = slot.as_ref() {
            sender.send(SchedulerSignal::QueueChanged).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferStatus;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, ConnectError, Result as BridgeResult, TransferError};
    use bridge_traits::{
        LocalMediaSource, ProgressCallback, RemoteStoreConnector, ShareSettings,
    };
    use core_runtime::events::UploadEvent;
    use mockall::mock;
    use std::time::Duration;

    mock! {
        Store {}
        #[async_trait]
        impl RemoteStore for Store {
            async fn list_names(&self) -> std::result::Result<HashSet<String>, ConnectError>;
            async fn list_entries(&self, relative_path: &str) -> std::result::Result<Vec<RemoteEntry>, ConnectError>;
            async fn test_reachable(&self) -> std::result::Result<(), ConnectError>;
            async fn upload(
                &self,
                file: &FileRef,
                on_progress: ProgressCallback,
                cancel: CancellationToken,
            ) -> std::result::Result<(), TransferError>;
        }
    }

    mock! {
        Connector {}
        impl RemoteStoreConnector for Connector {
            fn connect(
                &self,
                settings: &ShareSettings,
                chunk_size_bytes: usize,
            ) -> std::result::Result<Arc<dyn RemoteStore>, ConnectError>;
        }
    }

    mock! {
        MediaSource {}
        #[async_trait]
        impl LocalMediaSource for MediaSource {
            async fn list_local_candidates(&self) -> BridgeResult<Vec<FileRef>>;
        }
    }

    fn file(name: &str) -> FileRef {
        FileRef::new(name, format!("/cam/DCIM/Camera01/{}", name), 1_000)
    }

    fn share() -> ShareSettings {
        ShareSettings::new("nas.local", "photos", "alice", "secret").with_directory("camera")
    }

    fn media(names: &'static [&'static str]) -> MockMediaSource {
        let mut media = MockMediaSource::new();
        media
            .expect_list_local_candidates()
            .returning(move || Ok(names.iter().map(|name| file(name)).collect()));
        media
    }

    fn coordinator_with(store: Arc<dyn RemoteStore>, media: MockMediaSource) -> SyncCoordinator {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .times(1)
            .returning(move |_, _| Ok(Arc::clone(&store)));

        let config = CoreConfig::builder()
            .share(share())
            .remote_connector(Arc::new(connector))
            .media_source(Arc::new(media))
            .build()
            .unwrap();

        SyncCoordinator::new(config).unwrap()
    }

    fn uploading_store() -> MockStore {
        let mut store = MockStore::new();
        store.expect_upload().returning(|file, on_progress, _| {
            on_progress(file.size_bytes, file.size_bytes);
            Ok(())
        });
        store
    }

    #[test]
    fn test_new_passes_share_and_chunk_size_to_connector() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .withf(|settings, chunk| settings.share_name == "photos" && *chunk == 64 * 1024)
            .times(1)
            .returning(|_, _| Ok(Arc::new(MockStore::new())));

        let config = CoreConfig::builder()
            .share(share())
            .remote_connector(Arc::new(connector))
            .media_source(Arc::new(MockMediaSource::new()))
            .chunk_size_bytes(64 * 1024)
            .build()
            .unwrap();

        assert!(SyncCoordinator::new(config).is_ok());
    }

    #[test]
    fn test_new_rejects_unconfigured_share_before_connecting() {
        let mut connector = MockConnector::new();
        connector.expect_connect().times(0);

        let mut config = CoreConfig::builder()
            .share(share())
            .remote_connector(Arc::new(connector))
            .media_source(Arc::new(MockMediaSource::new()))
            .build()
            .unwrap();
        config.share.server.clear();

        let result = SyncCoordinator::new(config);
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_new_surfaces_connect_error() {
        let mut connector = MockConnector::new();
        connector.expect_connect().returning(|settings, _| {
            Err(ConnectError::AuthenticationFailed {
                username: settings.username.clone(),
            })
        });

        let config = CoreConfig::builder()
            .share(share())
            .remote_connector(Arc::new(connector))
            .media_source(Arc::new(MockMediaSource::new()))
            .build()
            .unwrap();

        let result = SyncCoordinator::new(config);
        assert!(matches!(
            result,
            Err(SyncError::Connect(ConnectError::AuthenticationFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_refresh_remote_names_publishes_listing() {
        let mut store = MockStore::new();
        store.expect_list_names().times(1).returning(|| {
            Ok(HashSet::from(["a.jpg".to_string(), "b.jpg".to_string()]))
        });

        let coordinator = coordinator_with(Arc::new(store), MockMediaSource::new());
        let mut events = coordinator.subscribe();

        assert_eq!(coordinator.refresh_remote_names().await.unwrap(), 2);
        assert!(coordinator.state().remote_names.contains("a.jpg"));

        match events.recv().await.unwrap() {
            CoreEvent::Remote(RemoteEvent::Listed { share_url, file_count }) => {
                assert_eq!(share_url, "smb://nas.local/photos/camera/");
                assert_eq!(file_count, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported() {
        let mut store = MockStore::new();
        store.expect_test_reachable().returning(|| {
            Err(ConnectError::Unreachable {
                location: "nas.local".to_string(),
                reason: "timed out".to_string(),
            })
        });

        let coordinator = coordinator_with(Arc::new(store), MockMediaSource::new());
        let mut events = coordinator.subscribe();

        let err = coordinator.test_connection().await.unwrap_err();
        assert!(matches!(err, SyncError::Connect(ConnectError::Unreachable { .. })));
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Remote(RemoteEvent::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_browse_delegates_to_store() {
        let mut store = MockStore::new();
        store
            .expect_list_entries()
            .withf(|path| path == "camera")
            .returning(|_| {
                Ok(vec![RemoteEntry {
                    name: "2024".to_string(),
                    is_directory: true,
                    size_bytes: None,
                }])
            });

        let coordinator = coordinator_with(Arc::new(store), MockMediaSource::new());
        let entries = coordinator.browse("camera").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_directory);
    }

    #[tokio::test]
    async fn test_camera_connected() {
        let coordinator = coordinator_with(Arc::new(MockStore::new()), media(&["a.jpg"]));
        assert!(coordinator.camera_connected().await);

        let mut missing = MockMediaSource::new();
        missing
            .expect_list_local_candidates()
            .returning(|| Err(BridgeError::NotAvailable("no removable volume".to_string())));
        let coordinator = coordinator_with(Arc::new(MockStore::new()), missing);
        assert!(!coordinator.camera_connected().await);

        let err = coordinator.eligible_candidates().await.unwrap_err();
        assert!(matches!(err, SyncError::Discovery(_)));
    }

    #[tokio::test]
    async fn test_plan_and_enqueue_all_skips_remote_and_queued() {
        let mut store = MockStore::new();
        store
            .expect_list_names()
            .returning(|| Ok(HashSet::from(["b.jpg".to_string()])));

        let coordinator =
            coordinator_with(Arc::new(store), media(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]));
        coordinator.refresh_remote_names().await.unwrap();
        coordinator.enqueue(file("c.jpg")).unwrap();

        let eligible = coordinator.eligible_candidates().await.unwrap();
        let names: Vec<_> = eligible.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "d.jpg"]);

        let enqueued = coordinator.plan_and_enqueue_all().await.unwrap();
        assert_eq!(enqueued.len(), 2);

        let queued: Vec<_> = coordinator
            .snapshot()
            .items
            .iter()
            .map(|item| item.file.name.clone())
            .collect();
        assert_eq!(queued, vec!["c.jpg", "a.jpg", "d.jpg"]);
        assert!(coordinator.eligible_candidates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drain_until_idle_uploads_everything() {
        let coordinator = coordinator_with(Arc::new(uploading_store()), MockMediaSource::new());
        coordinator.enqueue(file("a.jpg")).unwrap();
        coordinator.enqueue(file("b.jpg")).unwrap();

        assert_eq!(coordinator.drain_until_idle().await, DrainOutcome::Idle);

        let state = coordinator.state();
        assert_eq!(state.queue.count(TransferStatus::Uploaded), 2);
        assert!(state.remote_names.contains("a.jpg"));
        assert!(state.remote_names.contains("b.jpg"));
    }

    #[tokio::test]
    async fn test_scheduler_drains_on_enqueue() {
        let coordinator = Arc::new(coordinator_with(
            Arc::new(uploading_store()),
            MockMediaSource::new(),
        ));
        let mut completed = coordinator
            .subscribe()
            .filter(|event| matches!(event, CoreEvent::Upload(UploadEvent::Completed { .. })));

        let scheduler = coordinator.spawn_scheduler();
        coordinator.enqueue(file("a.jpg")).unwrap();
        coordinator.enqueue(file("b.jpg")).unwrap();

        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(5), completed.recv())
                .await
                .expect("upload should complete")
                .unwrap();
        }

        assert_eq!(coordinator.snapshot().count(TransferStatus::Uploaded), 2);

        coordinator.shutdown_scheduler();
        tokio::time::timeout(Duration::from_secs(5), scheduler)
            .await
            .expect("scheduler should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_respawning_scheduler_stops_previous_loop() {
        let coordinator = Arc::new(coordinator_with(
            Arc::new(uploading_store()),
            MockMediaSource::new(),
        ));

        let first = coordinator.spawn_scheduler();
        let second = coordinator.spawn_scheduler();

        tokio::time::timeout(Duration::from_secs(5), first)
            .await
            .expect("replaced scheduler should stop")
            .unwrap();

        coordinator.shutdown_scheduler();
        tokio::time::timeout(Duration::from_secs(5), second)
            .await
            .expect("scheduler should stop")
            .unwrap();

        assert_eq!(Arc::strong_count(&coordinator), 1);
    }

    /// Store whose uploads block until cancelled.
    struct BlockingStore;

    #[async_trait]
    impl RemoteStore for BlockingStore {
        async fn list_names(&self) -> std::result::Result<HashSet<String>, ConnectError> {
            Ok(HashSet::new())
        }

        async fn list_entries(
            &self,
            _relative_path: &str,
        ) -> std::result::Result<Vec<RemoteEntry>, ConnectError> {
            Ok(Vec::new())
        }

        async fn test_reachable(&self) -> std::result::Result<(), ConnectError> {
            Ok(())
        }

        async fn upload(
            &self,
            file: &FileRef,
            on_progress: ProgressCallback,
            cancel: CancellationToken,
        ) -> std::result::Result<(), TransferError> {
            on_progress(0, file.size_bytes);
            cancel.cancelled().await;
            Err(TransferError::Cancelled {
                name: file.name.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_abort_in_flight_fails_item_and_allows_retry() {
        let coordinator = Arc::new(coordinator_with(
            Arc::new(BlockingStore),
            MockMediaSource::new(),
        ));
        let mut started = coordinator
            .subscribe()
            .filter(|event| matches!(event, CoreEvent::Upload(UploadEvent::Started { .. })));

        coordinator.enqueue(file("a.jpg")).unwrap();
        let runner = Arc::clone(&coordinator);
        let drain = tokio::spawn(async move { runner.drain_once().await });

        tokio::time::timeout(Duration::from_secs(5), started.recv())
            .await
            .expect("upload should start")
            .unwrap();

        assert!(matches!(
            coordinator.cancel("a.jpg"),
            Err(SyncError::TransferInProgress { .. })
        ));
        assert!(coordinator.abort_in_flight());

        let outcome = drain.await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Failed { ref message, .. } if message.contains("cancelled")));

        let item = coordinator.snapshot().items[0].clone();
        assert_eq!(item.status, TransferStatus::Failed);
        assert!(!coordinator.state().remote_names.contains("a.jpg"));

        coordinator.retry("a.jpg").unwrap();
        assert_eq!(
            coordinator.snapshot().items[0].status,
            TransferStatus::Pending
        );
        assert!(!coordinator.abort_in_flight());
    }
}
