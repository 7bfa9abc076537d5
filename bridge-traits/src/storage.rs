//! Remote Share Abstractions
//!
//! Contracts for the network file share the engine uploads into. The core never
//! opens its own connection: listing, reachability and uploads all go through
//! [`RemoteStore`], which a platform adapter implements over SMB (or a mounted
//! share, or anything else that behaves like a flat directory of named files).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{ConnectError, TransferError};
use crate::media::FileRef;

/// Progress callback invoked by [`RemoteStore::upload`] with
/// `(bytes_written, total_bytes)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Chunk size used by the reference adapters (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Connection parameters for a network share.
///
/// Loaded once per session and handed to a [`RemoteStoreConnector`]; nothing
/// in the core looks these up ambiently.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Host name or IP address of the file server
    pub server: String,
    /// Name of the exported share
    pub share_name: String,
    /// Directory inside the share that receives uploads ("" for the share root)
    #[serde(default)]
    pub directory: String,
    /// Account used to authenticate
    pub username: String,
    /// Account password
    #[serde(default)]
    pub password: String,
}

impl ShareSettings {
    pub fn new(
        server: impl Into<String>,
        share_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            share_name: share_name.into(),
            directory: String::new(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// True when every field required to open a session is present.
    pub fn is_configured(&self) -> bool {
        self.validate().is_ok()
    }

    /// Check that server, share and username are set.
    pub fn validate(&self) -> Result<(), ConnectError> {
        let missing = [
            ("server", self.server.trim().is_empty()),
            ("share_name", self.share_name.trim().is_empty()),
            ("username", self.username.trim().is_empty()),
        ]
        .iter()
        .filter(|(_, empty)| *empty)
        .map(|(field, _)| *field)
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConnectError::NotConfigured(format!(
                "missing {}",
                missing.join(", ")
            )))
        }
    }

    /// Upload directory relative to the share root, without surrounding slashes.
    pub fn normalized_directory(&self) -> &str {
        self.directory.trim_matches('/')
    }

    /// `smb://server/share/` or `smb://server/share/dir/`
    pub fn share_url(&self) -> String {
        let directory = self.normalized_directory();
        if directory.is_empty() {
            format!("smb://{}/{}/", self.server, self.share_name)
        } else {
            format!("smb://{}/{}/{}/", self.server, self.share_name, directory)
        }
    }
}

impl fmt::Debug for ShareSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareSettings")
            .field("server", &self.server)
            .field("share_name", &self.share_name)
            .field("directory", &self.directory)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub is_directory: bool,
    pub size_bytes: Option<u64>,
}

/// Remote share client trait
///
/// Implementations own whatever session state the wire protocol needs
/// (SMB dialect negotiation, NTLM auth, tree connects). The engine only
/// observes the results.
///
/// # Upload contract
///
/// - `on_progress` is invoked at least once per chunk with monotonically
///   non-decreasing `written` values, ending at `written == total` on success
/// - `on_progress` is never invoked after `upload` returns
/// - when `cancel` fires, the implementation stops at the next chunk boundary
///   and returns [`TransferError::Cancelled`]
/// - timeouts are the implementation's concern and surface as `TransferError`
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Names of all entries in the upload directory
    async fn list_names(&self) -> Result<HashSet<String>, ConnectError>;

    /// Entries of a directory relative to the share root ("" for the root)
    async fn list_entries(&self, relative_path: &str) -> Result<Vec<RemoteEntry>, ConnectError>;

    /// Verify the share is reachable with the configured credentials
    async fn test_reachable(&self) -> Result<(), ConnectError>;

    /// Stream a local file into the upload directory under its own name
    async fn upload(
        &self,
        file: &FileRef,
        on_progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<(), TransferError>;
}

/// Builds a [`RemoteStore`] session from [`ShareSettings`].
///
/// This is the one place a store gets constructed, so the "is the share
/// configured" check happens exactly once, before any session exists.
/// `chunk_size_bytes` is the write granularity, and therefore the progress
/// granularity, the session should use for uploads.
pub trait RemoteStoreConnector: Send + Sync {
    fn connect(
        &self,
        settings: &ShareSettings,
        chunk_size_bytes: usize,
    ) -> Result<Arc<dyn RemoteStore>, ConnectError>;
}
