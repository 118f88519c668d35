//! File selection adapter.
//!
//! Reads a picked image file into an in-memory [`DataUrl`], the form the crop
//! surface consumes. The adapter keeps nothing but the bytes: the path is not
//! retained once the read completes.
//!
//! The picker itself is represented by [`FileInput`]. Pickers suppress a new
//! selection event when the same file is chosen twice, so the slot clears the
//! bound input after every successful read.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// MIME filter advertised to pickers. Advisory only.
pub const IMAGE_ACCEPT: &str = "image/*";

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),
}

/// An encoded file held in memory along with its MIME type.
///
/// Renders as `data:<mime>;base64,<payload>`.
#[derive(Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime: String,
    bytes: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parse a base64 `data:` URL.
    pub fn parse(url: &str) -> Result<Self, ReadError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| ReadError::InvalidDataUrl("missing data: scheme".into()))?;
        let (meta, payload) = rest
            .split_once(',')
            .ok_or_else(|| ReadError::InvalidDataUrl("missing payload separator".into()))?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or_else(|| ReadError::InvalidDataUrl("only base64 payloads are supported".into()))?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ReadError::InvalidDataUrl(e.to_string()))?;
        Ok(Self::new(mime, bytes))
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

// The payload can be megabytes; keep debug output readable.
impl fmt::Debug for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataUrl")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Read `path` into a [`DataUrl`].
///
/// The MIME type is guessed from the extension and falls back to
/// `application/octet-stream`. Non-image files are not rejected here.
pub async fn read_file_as_data_url(path: &Path) -> Result<DataUrl, ReadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(DataUrl::new(mime.essence_str(), bytes))
}

/// A single-file picker bound to an upload slot.
pub trait FileInput: Send + Sync {
    /// The currently selected file, if any.
    fn value(&self) -> Option<&Path>;

    /// Forget the selection so picking the same file fires again.
    fn clear(&mut self);
}

/// In-process picker state, used by the CLI and tests.
#[derive(Debug, Default)]
pub struct PickerInput {
    selected: Option<PathBuf>,
    clears: usize,
}

impl PickerInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, path: impl Into<PathBuf>) {
        self.selected = Some(path.into());
    }

    /// How many times the input has been cleared.
    pub fn clear_count(&self) -> usize {
        self.clears
    }
}

impl FileInput for PickerInput {
    fn value(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    fn clear(&mut self) {
        self.selected = None;
        self.clears += 1;
    }
}
