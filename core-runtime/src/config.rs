//! # Core Configuration Module
//!
//! Provides session configuration for the upload engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! value that holds the share connection settings and the collaborators the
//! engine needs. It is loaded once per session and handed to the coordinator;
//! nothing in the engine reads settings ambiently.
//!
//! Validation is fail-fast: an unconfigured share (missing server, share name
//! or username) is rejected here, so later code can assume a usable session.
//!
//! ## Required Dependencies
//!
//! - `ShareSettings` - server, share, directory and credentials
//! - `RemoteStoreConnector` - builds the remote session (desktop default: mounted share)
//! - `LocalMediaSource` - enumerates camera files (desktop default: removable volumes)
//!
//! When the `desktop-shims` feature is enabled, desktop defaults for the
//! connector and the media source are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let share = CoreConfig::load_share_settings("/home/alice/.config/camsync/share.json")?;
//! let config = CoreConfig::builder()
//!     .share(share)
//!     .remote_connector(Arc::new(MyConnector))
//!     .media_source(Arc::new(MyMediaSource))
//!     .chunk_size_bytes(512 * 1024)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    Clock, LocalMediaSource, RemoteStoreConnector, ShareSettings, SystemClock,
    DEFAULT_CHUNK_SIZE,
};
use std::path::Path;
use std::sync::Arc;

/// Smallest accepted upload chunk (4 KiB).
pub const MIN_CHUNK_SIZE_BYTES: usize = 4 * 1024;

/// Largest accepted upload chunk (64 MiB).
pub const MAX_CHUNK_SIZE_BYTES: usize = 64 * 1024 * 1024;

/// Session configuration for the upload engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Connection settings for the target share
    pub share: ShareSettings,

    /// Builds the remote session from `share`
    pub remote_connector: Arc<dyn RemoteStoreConnector>,

    /// Enumerates upload candidates on the camera volume
    pub media_source: Arc<dyn LocalMediaSource>,

    /// Time source for transfer timestamps
    pub clock: Arc<dyn Clock>,

    /// Upload write granularity
    pub chunk_size_bytes: usize,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("share", &self.share)
            .field("remote_connector", &"RemoteStoreConnector { ... }")
            .field("media_source", &"LocalMediaSource { ... }")
            .field("clock", &"Clock { ... }")
            .field("chunk_size_bytes", &self.chunk_size_bytes)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Read share settings from a JSON file.
    ///
    /// ```json
    /// { "server": "192.168.1.20", "share_name": "photos", "directory": "camera",
    ///   "username": "alice", "password": "..." }
    /// ```
    ///
    /// The settings are not validated here; `build()` does that once.
    pub fn load_share_settings(path: impl AsRef<Path>) -> Result<ShareSettings> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::SettingsFile {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse_share_settings(&raw)
    }

    /// Parse share settings from a JSON document.
    pub fn parse_share_settings(raw: &str) -> Result<ShareSettings> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The share has a server, share name and username
    /// - The chunk size is within 4 KiB..=64 MiB
    /// - The event buffer holds at least one event
    pub fn validate(&self) -> Result<()> {
        self.share.validate().map_err(Error::ShareNotConfigured)?;

        if !(MIN_CHUNK_SIZE_BYTES..=MAX_CHUNK_SIZE_BYTES).contains(&self.chunk_size_bytes) {
            return Err(Error::Config(format!(
                "Chunk size {} is out of range ({}..={} bytes)",
                self.chunk_size_bytes, MIN_CHUNK_SIZE_BYTES, MAX_CHUNK_SIZE_BYTES
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_connector() -> Result<Arc<dyn RemoteStoreConnector>> {
    Err(Error::CapabilityMissing {
        capability: "RemoteStoreConnector".to_string(),
        message: "A RemoteStoreConnector is required to reach the share. \
                 Desktop: enable the 'desktop-shims' feature to use the mounted-share connector. \
                 Mobile: inject an SMB client adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_connector() -> Result<Arc<dyn RemoteStoreConnector>> {
    use bridge_desktop::MountedShareConnector;

    let connector: Arc<dyn RemoteStoreConnector> = Arc::new(MountedShareConnector::default());
    Ok(connector)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_media_source() -> Result<Arc<dyn LocalMediaSource>> {
    Err(Error::CapabilityMissing {
        capability: "LocalMediaSource".to_string(),
        message: "A LocalMediaSource is required to discover camera files. \
                 Desktop: enable the 'desktop-shims' feature to scan removable volumes. \
                 Mobile: inject a storage-volume adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_media_source() -> Result<Arc<dyn LocalMediaSource>> {
    use bridge_desktop::RemovableVolumeSource;

    let source: Arc<dyn LocalMediaSource> = Arc::new(RemovableVolumeSource::default());
    Ok(source)
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    share: Option<ShareSettings>,
    remote_connector: Option<Arc<dyn RemoteStoreConnector>>,
    media_source: Option<Arc<dyn LocalMediaSource>>,
    clock: Option<Arc<dyn Clock>>,
    chunk_size_bytes: Option<usize>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the share connection settings.
    pub fn share(mut self, share: ShareSettings) -> Self {
        self.share = Some(share);
        self
    }

    /// Sets the connector used to open the remote session.
    pub fn remote_connector(mut self, connector: Arc<dyn RemoteStoreConnector>) -> Self {
        self.remote_connector = Some(connector);
        self
    }

    /// Sets the local media source.
    pub fn media_source(mut self, source: Arc<dyn LocalMediaSource>) -> Self {
        self.media_source = Some(source);
        self
    }

    /// Overrides the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the upload chunk size (default 1 MiB).
    pub fn chunk_size_bytes(mut self, size: usize) -> Self {
        self.chunk_size_bytes = Some(size);
        self
    }

    /// Sets the event bus capacity (default 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the share settings are missing or incomplete, a
    /// required collaborator is missing without a platform default, or a
    /// numeric setting is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let share = self.share.ok_or_else(|| {
            Error::Config("Share settings are required. Use .share() to set them.".to_string())
        })?;

        let remote_connector = match self.remote_connector {
            Some(connector) => connector,
            None => provide_default_connector()?,
        };

        let media_source = match self.media_source {
            Some(source) => source,
            None => provide_default_media_source()?,
        };

        let config = CoreConfig {
            share,
            remote_connector,
            media_source,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            chunk_size_bytes: self.chunk_size_bytes.unwrap_or(DEFAULT_CHUNK_SIZE),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
