//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (Linux, macOS).
//!
//! ## Overview
//!
//! - [`MountedShareConnector`] / [`MountedShareStore`]: `RemoteStore` over an
//!   SMB share that the OS has already mounted (gvfs, `mount.cifs`, Finder)
//! - [`RemovableVolumeSource`]: `LocalMediaSource` that finds the camera's
//!   media folder among mounted removable volumes
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{MountedShareConnector, RemovableVolumeSource};
//! use bridge_traits::{LocalMediaSource, RemoteStoreConnector, DEFAULT_CHUNK_SIZE};
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = MountedShareConnector::with_mount_point("/mnt/photos");
//!     let store = connector.connect(&settings, DEFAULT_CHUNK_SIZE).unwrap();
//!     let files = RemovableVolumeSource::new().list_local_candidates().await.unwrap();
//!
//!     // Use in core configuration
//! }
//! ```

mod share;
mod volume;

pub use share::{MountedShareConnector, MountedShareStore};
pub use volume::{RemovableVolumeSource, DEFAULT_MEDIA_SUBDIR};
