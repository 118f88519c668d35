//! Shared test utilities for the tripvault test suite.
//!
//! Provides synthetic images (so no binary fixtures are checked in) and small
//! helpers for inspecting encoded output.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = write_gradient_jpeg(tmp.path(), "beach.jpg", 2000, 1500);
//! let bytes = std::fs::read(&path).unwrap();
//! assert_eq!(decoded_dimensions(&bytes), Dimensions::new(2000, 1500));
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub use crate::types::Dimensions;

// =========================================================================
// Synthetic images
// =========================================================================

/// A `width × height` RGB gradient, distinct at every pixel so crops are
/// verifiable.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

/// Write a gradient JPEG into `dir` and return its path.
pub fn write_gradient_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, gradient_jpeg(width, height)).unwrap();
    path
}

/// A gradient JPEG carrying an EXIF APP1 block with the given orientation
/// tag (1-8). The raster itself is stored unrotated, as a camera writes it.
pub fn exif_oriented_jpeg(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = gradient_jpeg(width, height);
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing SOI marker");

    // Big-endian TIFF header, one IFD entry: 0x0112 Orientation, SHORT, count 1.
    let mut tiff = b"MM\x00\x2A\x00\x00\x00\x08".to_vec();
    tiff.extend_from_slice(&[0x00, 0x01]);
    tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    tiff.extend_from_slice(&orientation.to_be_bytes());
    tiff.extend_from_slice(&[0x00, 0x00]);
    tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(&tiff);
    let segment_len = (payload.len() + 2) as u16;

    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Output inspection
// =========================================================================

/// Decode `bytes` and return the raster size. Panics if undecodable.
pub fn decoded_dimensions(bytes: &[u8]) -> Dimensions {
    let img = image::load_from_memory(bytes)
        .unwrap_or_else(|e| panic!("output is not a decodable image: {e}"));
    Dimensions::new(img.width(), img.height())
}
