//! Shared types passed between the pipeline stages.
//!
//! These are the values that flow from one component to the next:
//!
//! ```text
//! selection  →  DataUrl            (raw source, crop input)
//! crop       →  PixelCropRegion    (what to cut)
//! imaging    →  Blob               (cropped raster, intermediate)
//! imaging    →  ProcessedArtifact  (compressed, ready to upload)
//! slot       →  SlotState          (what the presentation layer renders)
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Pixel dimensions of a decoded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn longest_edge(self) -> u32 {
        self.width.max(self.height)
    }
}

/// A rectangle in the source image's natural resolution.
///
/// Produced by the crop session, consumed by
/// [`ImageTransformer::crop_to_region`](crate::imaging::ImageTransformer::crop_to_region).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelCropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelCropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the region is non-empty and lies entirely inside `bounds`.
    pub fn fits_within(&self, bounds: Dimensions) -> bool {
        !self.is_empty()
            && u64::from(self.x) + u64::from(self.width) <= u64::from(bounds.width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(bounds.height)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

impl fmt::Display for PixelCropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Parses `x,y,width,height`, as accepted by the CLI `--region` flag.
impl FromStr for PixelCropRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid region '{s}': {e}"))?;
        match parts[..] {
            [x, y, width, height] if width > 0 && height > 0 => {
                Ok(Self::new(x, y, width, height))
            }
            [_, _, _, _] => Err(format!("invalid region '{s}': width and height must be > 0")),
            _ => Err(format!("invalid region '{s}': expected x,y,width,height")),
        }
    }
}

/// An encoded image held in memory, with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// The final cropped + compressed image.
///
/// Immutable once produced. A later crop cycle supersedes it with a new
/// artifact rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedArtifact {
    bytes: Vec<u8>,
    mime: String,
    filename: String,
    dimensions: Dimensions,
}

impl ProcessedArtifact {
    pub fn new(
        bytes: Vec<u8>,
        mime: impl Into<String>,
        filename: impl Into<String>,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            bytes,
            mime: mime.into(),
            filename: filename.into(),
            dimensions,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Hex SHA-256 of the encoded bytes.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(&self.bytes);
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Lifecycle state of one upload slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    Idle,
    /// A raw source is loaded and the crop UI is open.
    CropPending,
    /// Cropping and compressing.
    Processing,
    /// An artifact and its preview exist, not yet uploaded.
    Ready,
    Uploading,
    Uploaded { url: String },
}

impl SlotState {
    pub fn label(&self) -> &'static str {
        match self {
            SlotState::Idle => "idle",
            SlotState::CropPending => "crop pending",
            SlotState::Processing => "processing",
            SlotState::Ready => "ready",
            SlotState::Uploading => "uploading",
            SlotState::Uploaded { .. } => "uploaded",
        }
    }

    /// States in which the slot exposes a processed artifact.
    pub fn has_artifact(&self) -> bool {
        matches!(
            self,
            SlotState::Ready | SlotState::Uploading | SlotState::Uploaded { .. }
        )
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Uploaded { url } => write!(f, "uploaded ({url})"),
            other => f.write_str(other.label()),
        }
    }
}
