//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [upload slot](crate::slot) (which decides what
//! artifact to produce) and the [transformer](super::transformer) (which does
//! the pixel work). This separation allows swapping transformers (e.g. a
//! failing one in tests) without changing orchestration logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`OutputFormat`]: Target encoding, serialized as its MIME type.
//! - [`CompressParams`]: Byte budget, longest-edge limit, format and quality
//!   for one compression run.

use crate::config::CompressionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    /// Convert a 0–1 quality fraction (as used in slot configs).
    pub fn from_fraction(fraction: f64) -> Self {
        Self::new((fraction.clamp(0.0, 1.0) * 100.0).round() as u32)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Scale quality down by `factor`, never below 1.
    pub fn scaled(self, factor: f32) -> Self {
        Self::new((f32::from(self.0) * factor).floor() as u32)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Output encoding for cropped and compressed images.
///
/// Serialized as the MIME type, so configs read `file_type = "image/webp"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    #[serde(rename = "image/webp")]
    WebP,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl OutputFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/webp" => Some(Self::WebP),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Whether the quality parameter affects the encoder. PNG is lossless.
    pub fn honours_quality(self) -> bool {
        matches!(self, Self::WebP | Self::Jpeg)
    }

    /// Whether the encoder can store an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Parameters for a single compression run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressParams {
    /// Byte budget. Best-effort: see [`compress`](super::ImageTransformer::compress).
    pub max_bytes: u64,
    /// Longest edge limit in pixels. Downscale only.
    pub max_edge: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

impl CompressParams {
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            max_bytes: (config.max_size_mb * 1024.0 * 1024.0).round() as u64,
            max_edge: config.max_width_or_height,
            format: config.file_type,
            quality: Quality::from_fraction(config.initial_quality),
        }
    }
}
