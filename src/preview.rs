//! Preview handles for processed artifacts.
//!
//! A [`PreviewHandle`] is a local URL the presentation layer can display
//! before (or while) the artifact is uploaded. Handles hold resources, so
//! every handle must be released exactly once. The handle type is not
//! `Clone` and [`PreviewStore::revoke`] takes it by value: once revoked it
//! cannot be revoked again.
//!
//! Two stores are provided:
//!
//! | Store | URL | Resource |
//! |---|---|---|
//! | [`MemoryPreviewStore`] | `blob:tripvault/<n>` | artifact bytes kept in a map |
//! | [`DirPreviewStore`] | `file:///…/<digest>-<n>.<ext>` | one file per handle |

use crate::types::ProcessedArtifact;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live reference to a displayed artifact.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    url: String,
}

impl PreviewHandle {
    /// Wrap a URL minted by a [`PreviewStore`] implementation.
    pub fn new(url: String) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Creates and releases preview handles.
pub trait PreviewStore: Send + Sync {
    fn create(&self, artifact: &ProcessedArtifact) -> Result<PreviewHandle, PreviewError>;

    fn revoke(&self, handle: PreviewHandle);
}

/// Keeps preview bytes in memory, keyed by URL.
#[derive(Default)]
pub struct MemoryPreviewStore {
    live: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicU64,
    revoked: AtomicU64,
}

impl MemoryPreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles created and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Number of handles revoked so far.
    pub fn revoked_count(&self) -> u64 {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Bytes behind a live URL.
    pub fn resolve(&self, url: &str) -> Option<Vec<u8>> {
        self.live.lock().unwrap().get(url).cloned()
    }
}

impl PreviewStore for MemoryPreviewStore {
    fn create(&self, artifact: &ProcessedArtifact) -> Result<PreviewHandle, PreviewError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:tripvault/{id}");
        self.live
            .lock()
            .unwrap()
            .insert(url.clone(), artifact.bytes().to_vec());
        Ok(PreviewHandle::new(url))
    }

    fn revoke(&self, handle: PreviewHandle) {
        if self.live.lock().unwrap().remove(handle.url()).is_some() {
            self.revoked.fetch_add(1, Ordering::SeqCst);
        } else {
            warn!(url = %handle.url(), "revoking unknown preview handle");
        }
    }
}

/// Writes each preview to a file in a directory and deletes it on revoke.
pub struct DirPreviewStore {
    dir: PathBuf,
    next_id: AtomicU64,
}

impl DirPreviewStore {
    /// Use `dir` for preview files, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PreviewError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(url: &str) -> Option<&Path> {
        url.strip_prefix("file://").map(Path::new)
    }
}

impl PreviewStore for DirPreviewStore {
    fn create(&self, artifact: &ProcessedArtifact) -> Result<PreviewHandle, PreviewError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ext = artifact
            .filename()
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("bin");
        let digest = artifact.digest();
        let path = self.dir.join(format!("{}-{id}.{ext}", &digest[..12]));
        std::fs::write(&path, artifact.bytes())?;
        Ok(PreviewHandle::new(format!("file://{}", path.display())))
    }

    fn revoke(&self, handle: PreviewHandle) {
        let Some(path) = Self::path_for(handle.url()) else {
            warn!(url = %handle.url(), "preview handle is not a file URL");
            return;
        };
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove preview file");
        }
    }
}
