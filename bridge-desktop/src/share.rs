//! Remote store over an SMB share mounted into the local filesystem
//!
//! Desktop systems already speak SMB: GNOME mounts shares through gvfs under
//! `$XDG_RUNTIME_DIR/gvfs/`, macOS under `/Volumes`, and `mount.cifs` anywhere
//! an administrator likes. This adapter treats such a mount as the share root
//! and uses `tokio::fs` for listing and chunked uploads.

use async_trait::async_trait;
use bridge_traits::{
    error::{ConnectError, TransferError},
    CancellationToken, FileRef, ProgressCallback, RemoteEntry, RemoteStore, RemoteStoreConnector,
    ShareSettings, DEFAULT_CHUNK_SIZE,
};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

const PARTIAL_SUFFIX: &str = ".partial";

/// Builds [`MountedShareStore`] sessions.
///
/// Without an explicit mount point the share is expected at its gvfs
/// location, `$XDG_RUNTIME_DIR/gvfs/smb-share:server=<server>,share=<share>`.
#[derive(Debug, Clone, Default)]
pub struct MountedShareConnector {
    mount_point: Option<PathBuf>,
}

impl MountedShareConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed mount point for the share root (e.g. `/mnt/photos`).
    pub fn with_mount_point(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: Some(mount_point.into()),
        }
    }

    fn share_root(&self, settings: &ShareSettings) -> Result<PathBuf, ConnectError> {
        if let Some(mount_point) = &self.mount_point {
            return Ok(mount_point.clone());
        }

        let runtime_dir = dirs::runtime_dir().ok_or_else(|| {
            ConnectError::NotConfigured(
                "no runtime directory for gvfs mounts; configure an explicit mount point"
                    .to_string(),
            )
        })?;

        Ok(runtime_dir.join("gvfs").join(format!(
            "smb-share:server={},share={}",
            settings.server.to_lowercase(),
            settings.share_name.to_lowercase()
        )))
    }
}

impl RemoteStoreConnector for MountedShareConnector {
    fn connect(
        &self,
        settings: &ShareSettings,
        chunk_size_bytes: usize,
    ) -> Result<Arc<dyn RemoteStore>, ConnectError> {
        settings.validate()?;

        let share_root = self.share_root(settings)?;
        debug!(
            share = %settings.share_url(),
            mount = %share_root.display(),
            "Using mounted share"
        );

        Ok(Arc::new(MountedShareStore::new(
            share_root,
            settings.normalized_directory(),
            settings.share_url(),
            chunk_size_bytes,
        )))
    }
}

/// [`RemoteStore`] backed by a mounted share directory.
///
/// Uploads are written to a hidden `.partial` file and renamed into place
/// once complete, so a listing never shows a truncated file.
#[derive(Debug, Clone)]
pub struct MountedShareStore {
    share_root: PathBuf,
    upload_dir: PathBuf,
    location: String,
    chunk_size: usize,
}

impl MountedShareStore {
    pub fn new(
        share_root: impl Into<PathBuf>,
        directory: &str,
        location: impl Into<String>,
        chunk_size: usize,
    ) -> Self {
        let share_root = share_root.into();
        let upload_dir = directory
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(share_root.clone(), |path, part| path.join(part));

        Self {
            share_root,
            upload_dir,
            location: location.into(),
            chunk_size: if chunk_size == 0 {
                DEFAULT_CHUNK_SIZE
            } else {
                chunk_size
            },
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn unreachable(&self, err: std::io::Error) -> ConnectError {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => ConnectError::Unreachable {
                location: self.location.clone(),
                reason: err.to_string(),
            },
            _ => ConnectError::Io(err),
        }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, ConnectError> {
        let relative = Path::new(relative_path.trim_matches('/'));
        let mut resolved = self.share_root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(ConnectError::Io(std::io::Error::new(
                        ErrorKind::InvalidInput,
                        format!("path escapes the share: {}", relative_path),
                    )))
                }
            }
        }
        Ok(resolved)
    }

    fn partial_path(&self, name: &str) -> PathBuf {
        self.upload_dir.join(format!(".{}{}", name, PARTIAL_SUFFIX))
    }

    async fn write_chunks(
        &self,
        file: &FileRef,
        partial: &Path,
        on_progress: &ProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        let mut source = file
            .open()
            .await
            .map_err(|e| TransferError::SourceUnavailable {
                name: file.name.clone(),
                reason: e.to_string(),
            })?;
        let total = source
            .metadata()
            .await
            .map(|metadata| metadata.len())
            .unwrap_or(file.size_bytes);

        fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| TransferError::Rejected {
                name: file.name.clone(),
                reason: e.to_string(),
            })?;

        let mut target = fs::File::create(partial)
            .await
            .map_err(|e| TransferError::Rejected {
                name: file.name.clone(),
                reason: e.to_string(),
            })?;

        let interrupted = |written: u64, err: std::io::Error| TransferError::Interrupted {
            name: file.name.clone(),
            written,
            reason: err.to_string(),
        };

        let mut buffer = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        if total == 0 {
            on_progress(0, 0);
        }

        loop {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled {
                    name: file.name.clone(),
                });
            }

            let read = read_chunk(&mut source, &mut buffer)
                .await
                .map_err(|e| interrupted(written, e))?;
            if read == 0 {
                break;
            }

            target
                .write_all(&buffer[..read])
                .await
                .map_err(|e| interrupted(written, e))?;
            written += read as u64;
            on_progress(written, total.max(written));
        }

        target.flush().await.map_err(|e| interrupted(written, e))?;
        target.sync_all().await.map_err(|e| interrupted(written, e))?;

        Ok(written)
    }
}

/// Fill `buffer` unless the source ends first. Returns the bytes read.
async fn read_chunk(source: &mut fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = source.read(&mut buffer[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

#[async_trait]
impl RemoteStore for MountedShareStore {
    async fn list_names(&self) -> Result<HashSet<String>, ConnectError> {
        let mut read_dir = match fs::read_dir(&self.upload_dir).await {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                // An upload directory that does not exist yet is empty
                self.test_reachable().await?;
                return Ok(HashSet::new());
            }
            Err(err) => return Err(self.unreachable(err)),
        };

        let mut names = HashSet::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(ConnectError::Io)? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            names.insert(name);
        }

        debug!(count = names.len(), dir = %self.upload_dir.display(), "Listed upload directory");
        Ok(names)
    }

    async fn list_entries(&self, relative_path: &str) -> Result<Vec<RemoteEntry>, ConnectError> {
        let dir = self.resolve(relative_path)?;
        let mut read_dir = fs::read_dir(&dir).await.map_err(|e| self.unreachable(e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(ConnectError::Io)? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().await.map_err(ConnectError::Io)?;
            entries.push(RemoteEntry {
                name,
                is_directory: metadata.is_dir(),
                size_bytes: metadata.is_file().then(|| metadata.len()),
            });
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }

    async fn test_reachable(&self) -> Result<(), ConnectError> {
        let metadata = fs::metadata(&self.share_root)
            .await
            .map_err(|e| self.unreachable(e))?;

        if !metadata.is_dir() {
            return Err(ConnectError::Unreachable {
                location: self.location.clone(),
                reason: format!("{} is not a directory", self.share_root.display()),
            });
        }

        Ok(())
    }

    async fn upload(
        &self,
        file: &FileRef,
        on_progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<(), TransferError> {
        let partial = self.partial_path(&file.name);
        let destination = self.upload_dir.join(&file.name);

        let written = match self
            .write_chunks(file, &partial, &on_progress, &cancel)
            .await
        {
            Ok(written) => written,
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    if cleanup.kind() != ErrorKind::NotFound {
                        warn!(file = %file.name, error = %cleanup, "Failed to remove partial upload");
                    }
                }
                return Err(err);
            }
        };

        fs::rename(&partial, &destination)
            .await
            .map_err(|e| TransferError::Rejected {
                name: file.name.clone(),
                reason: e.to_string(),
            })?;

        info!(file = %file.name, bytes = written, "Wrote file to share");
        Ok(())
    }
}
