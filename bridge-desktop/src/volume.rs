//! Camera discovery on removable volumes
//!
//! Scans the usual desktop mount roots for the first volume that carries the
//! camera's media folder and lists the files in it.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    FileRef, LocalMediaSource,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Media folder written by the camera, relative to the volume root.
pub const DEFAULT_MEDIA_SUBDIR: &str = "DCIM/Camera01";

/// [`LocalMediaSource`] that finds the camera among mounted removable volumes.
#[derive(Debug, Clone)]
pub struct RemovableVolumeSource {
    mount_roots: Vec<PathBuf>,
    media_subdir: PathBuf,
}

impl RemovableVolumeSource {
    /// Scan `/media/$USER`, `/run/media/$USER`, `/media` and `/Volumes`.
    pub fn new() -> Self {
        let mut mount_roots = Vec::new();
        if let Ok(user) = std::env::var("USER") {
            mount_roots.push(PathBuf::from("/media").join(&user));
            mount_roots.push(PathBuf::from("/run/media").join(&user));
        }
        mount_roots.push(PathBuf::from("/media"));
        mount_roots.push(PathBuf::from("/Volumes"));

        Self::with_mount_roots(mount_roots)
    }

    /// Scan only the given directories; each child directory is a volume.
    pub fn with_mount_roots(mount_roots: Vec<PathBuf>) -> Self {
        Self {
            mount_roots,
            media_subdir: PathBuf::from(DEFAULT_MEDIA_SUBDIR),
        }
    }

    pub fn with_media_subdir(mut self, media_subdir: impl Into<PathBuf>) -> Self {
        self.media_subdir = media_subdir.into();
        self
    }

    /// Media folder on the first volume that has one.
    pub async fn find_media_dir(&self) -> Option<PathBuf> {
        for root in &self.mount_roots {
            for volume in sorted_subdirectories(root).await {
                let candidate = volume.join(&self.media_subdir);
                if is_dir(&candidate).await {
                    debug!(volume = %volume.display(), "Found camera volume");
                    return Some(candidate);
                }
            }
        }
        None
    }
}

impl Default for RemovableVolumeSource {
    fn default() -> Self {
        Self::new()
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

async fn sorted_subdirectories(root: &Path) -> Vec<PathBuf> {
    let Ok(mut read_dir) = fs::read_dir(root).await else {
        return Vec::new();
    };

    let mut volumes = Vec::new();
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        let path = entry.path();
        if is_dir(&path).await {
            volumes.push(path);
        }
    }
    volumes.sort();
    volumes
}

#[async_trait]
impl LocalMediaSource for RemovableVolumeSource {
    async fn list_local_candidates(&self) -> Result<Vec<FileRef>> {
        let media_dir = self.find_media_dir().await.ok_or_else(|| {
            BridgeError::NotAvailable(format!(
                "no removable volume with {}",
                self.media_subdir.display()
            ))
        })?;

        let mut read_dir = fs::read_dir(&media_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let path = entry.path();
            match FileRef::from_path(&path, metadata.len()) {
                Some(file) if !file.name.starts_with('.') => files.push(file),
                _ => continue,
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = files.len(), dir = %media_dir.display(), "Listed camera files");
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn mount_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("camsync-media-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[tokio::test]
    async fn test_lists_files_from_first_camera_volume() {
        let root = mount_root();
        std::fs::create_dir_all(root.join("AAA_USB")).unwrap();
        let camera = root.join("CAMERA").join(DEFAULT_MEDIA_SUBDIR);
        std::fs::create_dir_all(camera.join("thumbs")).unwrap();
        std::fs::write(camera.join("IMG_0002.JPG"), vec![0u8; 20]).unwrap();
        std::fs::write(camera.join("IMG_0001.JPG"), vec![0u8; 10]).unwrap();
        std::fs::write(camera.join(".trashinfo"), b"").unwrap();

        let source = RemovableVolumeSource::with_mount_roots(vec![root.clone()]);
        let files = source.list_local_candidates().await.unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["IMG_0001.JPG", "IMG_0002.JPG"]);
        assert_eq!(files[0].size_bytes, 10);
        assert_eq!(files[1].path, camera.join("IMG_0002.JPG"));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_missing_camera_is_not_available() {
        let root = mount_root();
        std::fs::create_dir_all(root.join("USB_STICK").join("docs")).unwrap();

        let source = RemovableVolumeSource::with_mount_roots(vec![root.clone()]);
        assert!(source.find_media_dir().await.is_none());
        assert!(matches!(
            source.list_local_candidates().await,
            Err(BridgeError::NotAvailable(_))
        ));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[tokio::test]
    async fn test_custom_media_subdir() {
        let root = mount_root();
        let media = root.join("SD").join("PRIVATE/M4ROOT/CLIP");
        std::fs::create_dir_all(&media).unwrap();
        std::fs::write(media.join("C0001.MP4"), b"clip").unwrap();

        let source = RemovableVolumeSource::with_mount_roots(vec![root.clone()])
            .with_media_subdir("PRIVATE/M4ROOT/CLIP");
        let files = source.list_local_candidates().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "C0001.MP4");

        std::fs::remove_dir_all(&root).unwrap();
    }
}
