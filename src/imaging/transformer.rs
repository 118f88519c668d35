//! Image transformer trait and error types.
//!
//! The [`ImageTransformer`] trait defines the two pixel operations the upload
//! pipeline needs: cut a region out of the source, then re-encode the result
//! within a size budget.
//!
//! The production implementation is
//! [`RustTransformer`](super::rust_transformer::RustTransformer), built on the
//! pure-Rust decoders and encoders of the `image` crate.

use super::params::{CompressParams, OutputFormat};
use crate::types::{Blob, PixelCropRegion, ProcessedArtifact};
use thiserror::Error;

/// Rendering the crop region failed.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to decode source image: {0}")]
    Decode(String),
    #[error("Crop region {region} does not fit the {width}x{height} source")]
    RegionOutOfBounds {
        region: PixelCropRegion,
        width: u32,
        height: u32,
    },
    #[error("Failed to encode cropped image: {0}")]
    Encode(String),
}

/// Re-encoding the cropped image failed.
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to decode cropped image: {0}")]
    Decode(String),
    #[error("Failed to encode {format}: {message}")]
    Encode {
        format: OutputFormat,
        message: String,
    },
    #[error("Compression worker failed: {0}")]
    Worker(String),
}

/// Pixel operations used by the upload pipeline.
///
/// Both operations are pure: they read their inputs and return new values.
/// Implementations must be `Send + Sync + 'static` so compression can be
/// moved onto a blocking worker.
pub trait ImageTransformer: Send + Sync {
    /// Render exactly `region` of the encoded `source` at 1:1 scale.
    ///
    /// The output raster is `region.width × region.height`, encoded as `format`.
    fn crop_to_region(
        &self,
        source: &[u8],
        region: &PixelCropRegion,
        format: OutputFormat,
    ) -> Result<Blob, TransformError>;

    /// Re-encode `blob` under the limits in `params`.
    ///
    /// The longest edge never exceeds `params.max_edge` and the image is never
    /// upscaled. The output MIME type is always `params.format`. The byte
    /// budget is best-effort.
    fn compress(
        &self,
        blob: &Blob,
        params: &CompressParams,
        filename: &str,
    ) -> Result<ProcessedArtifact, CompressionError>;
}
