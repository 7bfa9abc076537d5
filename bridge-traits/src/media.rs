//! Local Media Discovery
//!
//! The camera's removable storage is enumerated by a platform adapter; the core
//! only needs the resulting list of [`FileRef`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Handle to a local file that is a candidate for upload.
///
/// `name` is the join key against remote listings; two handles with the same
/// name are the same logical file as far as deduplication is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl FileRef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size_bytes,
        }
    }

    /// Build a handle from a path, taking the file name as the join key.
    ///
    /// Returns `None` for paths without a UTF-8 file name.
    pub fn from_path(path: &Path, size_bytes: u64) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        Some(Self::new(name, path, size_bytes))
    }

    /// Open the file for streaming reads.
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }
}

/// Local media discovery trait
///
/// - Desktop: removable volumes mounted under `/media`, `/run/media`, `/Volumes`
/// - Mobile: storage-volume APIs
#[async_trait]
pub trait LocalMediaSource: Send + Sync {
    /// Files on the camera volume that may be uploaded, in display order
    async fn list_local_candidates(&self) -> Result<Vec<FileRef>>;
}
