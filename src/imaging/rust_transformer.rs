//! Pure Rust transformer: no system image libraries.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader::into_decoder` |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Downscale | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → WebP | `webp::Encoder` (lossy, quality-driven) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality-driven) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! ## Byte budget
//!
//! [`compress`](ImageTransformer::compress) first fits the image inside the
//! longest-edge limit and encodes it. If the result is over the byte budget it
//! shrinks the raster (and, for WebP and JPEG, the quality) by [`SHRINK_FACTOR`] and
//! tries again, at most [`MAX_SHRINK_ITERATIONS`] times. The smallest encoding
//! seen is returned even if the budget was never met.
//!
//! ## Orientation
//!
//! Sources are decoded upright: an EXIF orientation tag is applied before any
//! pixel work, and [`probe_dimensions`] reports the upright size. Crop regions
//! are therefore always in the coordinates the user sees.

use super::calculations::{MAX_SHRINK_ITERATIONS, SHRINK_FACTOR, fit_within, shrink};
use super::params::{CompressParams, OutputFormat, Quality};
use super::transformer::{CompressionError, ImageTransformer, TransformError};
use crate::types::{Blob, Dimensions, PixelCropRegion, ProcessedArtifact};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Quality used for the intermediate crop blob, matching the usual canvas default.
const CROP_QUALITY: Quality = Quality(92);

/// Pure Rust transformer using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustTransformer;

impl RustTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn open_decoder(bytes: &[u8]) -> Result<impl ImageDecoder + '_, image::ImageError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()
}

/// EXIF orientation of the source, `NoTransforms` when absent or unreadable.
fn orientation(decoder: &mut impl ImageDecoder) -> Orientation {
    decoder.orientation().unwrap_or(Orientation::NoTransforms)
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Decode `bytes` and rotate the raster upright.
fn decode(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    let mut decoder = open_decoder(bytes)?;
    let orientation = orientation(&mut decoder);
    let mut img = DynamicImage::from_decoder(decoder)?;
    if orientation != Orientation::NoTransforms {
        debug!(?orientation, "applying EXIF orientation");
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// Read the upright pixel dimensions from an encoded image's header without
/// decoding the raster.
///
/// Width and height are swapped for EXIF orientations that rotate by a
/// quarter turn. Returns `None` when the format is not recognised.
pub fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let mut decoder = open_decoder(bytes).ok()?;
    let (width, height) = decoder.dimensions();
    if swaps_axes(orientation(&mut decoder)) {
        Some(Dimensions::new(height, width))
    } else {
        Some(Dimensions::new(width, height))
    }
}

/// Encode `img` into memory as `format`.
///
/// Pixels are normalized to 8-bit RGB/RGBA first since the encoders only
/// accept those layouts; alpha is dropped for JPEG.
fn encode(img: &DynamicImage, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, String> {
    let normalized = if format.supports_alpha() && img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    match format {
        OutputFormat::WebP => webp::Encoder::from_image(&normalized)
            .map(|encoder| encoder.encode(f32::from(quality.value())).to_vec())
            .map_err(str::to_string),
        OutputFormat::Jpeg => {
            let mut buf = Vec::new();
            normalized
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.value()))
                .map_err(|e| e.to_string())?;
            Ok(buf)
        }
        OutputFormat::Png => {
            let mut buf = Vec::new();
            normalized
                .write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(|e| e.to_string())?;
            Ok(buf)
        }
    }
}

impl ImageTransformer for RustTransformer {
    fn crop_to_region(
        &self,
        source: &[u8],
        region: &PixelCropRegion,
        format: OutputFormat,
    ) -> Result<Blob, TransformError> {
        let img = decode(source).map_err(|e| TransformError::Decode(e.to_string()))?;
        let (width, height) = img.dimensions();
        if !region.fits_within(Dimensions::new(width, height)) {
            return Err(TransformError::RegionOutOfBounds {
                region: *region,
                width,
                height,
            });
        }

        let cropped = img.crop_imm(region.x, region.y, region.width, region.height);
        let bytes = encode(&cropped, format, CROP_QUALITY).map_err(TransformError::Encode)?;

        Ok(Blob {
            bytes,
            mime: format.mime().to_string(),
        })
    }

    fn compress(
        &self,
        blob: &Blob,
        params: &CompressParams,
        filename: &str,
    ) -> Result<ProcessedArtifact, CompressionError> {
        let img = decode(&blob.bytes).map_err(|e| CompressionError::Decode(e.to_string()))?;
        let source = Dimensions::new(img.width(), img.height());

        let mut target = fit_within(source, params.max_edge);
        let mut quality = params.quality;
        let mut best: Option<(Vec<u8>, Dimensions)> = None;

        for iteration in 0..=MAX_SHRINK_ITERATIONS {
            let resized;
            let frame = if target == source {
                &img
            } else {
                resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
                &resized
            };

            let bytes = encode(frame, params.format, quality).map_err(|message| {
                CompressionError::Encode {
                    format: params.format,
                    message,
                }
            })?;
            let size = bytes.len() as u64;

            if best.as_ref().is_none_or(|(b, _)| bytes.len() < b.len()) {
                best = Some((bytes, target));
            }
            if size <= params.max_bytes {
                break;
            }

            debug!(
                iteration,
                size,
                budget = params.max_bytes,
                width = target.width,
                height = target.height,
                "over byte budget, shrinking"
            );
            target = shrink(target, SHRINK_FACTOR);
            if params.format.honours_quality() {
                quality = quality.scaled(SHRINK_FACTOR);
            }
        }

        let (bytes, dimensions) = best.ok_or_else(|| {
            CompressionError::Worker("compression produced no output".to_string())
        })?;
        Ok(ProcessedArtifact::new(
            bytes,
            params.format.mime(),
            filename,
            dimensions,
        ))
    }
}
