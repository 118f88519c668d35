//! Client configuration module.
//!
//! Handles loading, validating, and merging `tripvault.toml`. Stock defaults
//! are serialized to a TOML value and the user file is merged on top, so a
//! config file only needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [api]
//! base_url = "http://localhost:3000/api"
//! timeout_secs = 30
//! # token = "..."              # Bearer credential sent with every request
//!
//! [slots.profile_pic.compression]
//! max_size_mb = 0.3
//! max_width_or_height = 400
//! file_type = "image/webp"
//! initial_quality = 0.85
//!
//! [slots.profile_pic.crop]
//! aspect = 1.0
//! shape = "round"
//! min_zoom = 1.0
//! max_zoom = 4.0
//! ```
//!
//! The same `compression`/`crop` tables exist for `slots.default` and
//! `slots.cover_photo`. Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default file name looked up by the CLI.
pub const CONFIG_FILENAME: &str = "tripvault.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Client configuration loaded from `tripvault.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Backend API connection settings.
    pub api: ApiConfig,
    /// Per-slot compression and crop settings.
    pub slots: SlotsConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "api.base_url must not be empty".into(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }
        for kind in SlotKind::ALL {
            self.slots
                .get(kind)
                .validate()
                .map_err(|msg| ConfigError::Validation(format!("slots.{}.{msg}", kind.key())))?;
        }
        Ok(())
    }
}

/// Backend API connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Opaque bearer credential. Omitted requests are sent unauthenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 30,
            token: None,
        }
    }
}

/// The upload slots the client knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SlotKind {
    Default,
    ProfilePic,
    CoverPhoto,
}

impl SlotKind {
    pub const ALL: [SlotKind; 3] = [SlotKind::Default, SlotKind::ProfilePic, SlotKind::CoverPhoto];

    /// Table name under `[slots]`.
    pub fn key(self) -> &'static str {
        match self {
            SlotKind::Default => "default",
            SlotKind::ProfilePic => "profile_pic",
            SlotKind::CoverPhoto => "cover_photo",
        }
    }

    /// Context tag sent with uploads so the backend picks the right bucket.
    pub fn context_tag(self) -> Option<&'static str> {
        match self {
            SlotKind::Default => None,
            SlotKind::ProfilePic => Some("profile-pic"),
            SlotKind::CoverPhoto => Some("cover-photo"),
        }
    }
}

/// Slot configurations, one table per [`SlotKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlotsConfig {
    pub default: UploadSlotConfig,
    pub profile_pic: UploadSlotConfig,
    pub cover_photo: UploadSlotConfig,
}

impl Default for SlotsConfig {
    fn default() -> Self {
        Self {
            default: UploadSlotConfig::default(),
            profile_pic: UploadSlotConfig::profile_pic(),
            cover_photo: UploadSlotConfig::cover_photo(),
        }
    }
}

impl SlotsConfig {
    pub fn get(&self, kind: SlotKind) -> &UploadSlotConfig {
        match kind {
            SlotKind::Default => &self.default,
            SlotKind::ProfilePic => &self.profile_pic,
            SlotKind::CoverPhoto => &self.cover_photo,
        }
    }
}

/// Everything one upload slot needs: how to crop and how to compress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadSlotConfig {
    pub compression: CompressionConfig,
    pub crop: CropConfig,
}

impl UploadSlotConfig {
    /// Square, round-overlay avatar.
    pub fn profile_pic() -> Self {
        Self {
            compression: CompressionConfig {
                max_size_mb: 0.3,
                max_width_or_height: 400,
                file_type: OutputFormat::WebP,
                initial_quality: 0.85,
            },
            crop: CropConfig {
                aspect: Some(1.0),
                shape: CropShape::Round,
                min_zoom: 1.0,
                max_zoom: 4.0,
            },
        }
    }

    /// Wide 16:4 banner.
    pub fn cover_photo() -> Self {
        Self {
            compression: CompressionConfig {
                max_size_mb: 0.8,
                max_width_or_height: 1920,
                file_type: OutputFormat::WebP,
                initial_quality: 0.82,
            },
            crop: CropConfig {
                aspect: Some(16.0 / 4.0),
                shape: CropShape::Rect,
                min_zoom: 1.0,
                max_zoom: 3.0,
            },
        }
    }

    /// Check ranges for a caller-built config. Returns the offending key and
    /// reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let c = &self.compression;
        if !(c.max_size_mb > 0.0) {
            return Err("compression.max_size_mb must be greater than 0".into());
        }
        if c.max_width_or_height == 0 {
            return Err("compression.max_width_or_height must be greater than 0".into());
        }
        if !(c.initial_quality > 0.0 && c.initial_quality <= 1.0) {
            return Err("compression.initial_quality must be in (0, 1]".into());
        }
        let crop = &self.crop;
        if let Some(aspect) = crop.aspect {
            if !(aspect.is_finite() && aspect > 0.0) {
                return Err("crop.aspect must be a positive number".into());
            }
        }
        if !(crop.min_zoom >= 1.0 && crop.min_zoom <= crop.max_zoom) {
            return Err("crop zoom range must satisfy 1 <= min_zoom <= max_zoom".into());
        }
        Ok(())
    }
}

/// Compression settings for the final artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Target output size in MiB. Best-effort.
    pub max_size_mb: f64,
    /// Longest edge limit in pixels. Images are never upscaled.
    pub max_width_or_height: u32,
    /// Output MIME type.
    pub file_type: OutputFormat,
    /// Encoder quality, 0–1.
    pub initial_quality: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 0.5,
            max_width_or_height: 1600,
            file_type: OutputFormat::WebP,
            initial_quality: 0.82,
        }
    }
}

/// Shape of the crop overlay. Purely presentational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropShape {
    #[default]
    Rect,
    Round,
}

/// Crop surface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Width / height. Absent means free aspect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect: Option<f64>,
    pub shape: CropShape,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            aspect: None,
            shape: CropShape::Rect,
            min_zoom: 1.0,
            max_zoom: 3.0,
        }
    }
}

impl CropConfig {
    /// Badge text shown on the crop overlay.
    pub fn aspect_label(&self) -> String {
        const EPSILON: f64 = 1e-9;
        match self.aspect {
            None => "Free".to_string(),
            Some(a) if (a - 1.0).abs() < EPSILON => "1 : 1".to_string(),
            Some(a) if (a - 16.0 / 9.0).abs() < EPSILON => "16 : 9".to_string(),
            Some(a) if (a - 16.0 / 5.0).abs() < EPSILON => "16 : 5".to_string(),
            Some(a) => format!("{a:.2} : 1"),
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `tripvault.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tripvault configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Backend API
# ---------------------------------------------------------------------------
[api]
# Every endpoint path (/media/upload, /user/profile) is appended to this.
base_url = "http://localhost:3000/api"

# Request timeout in seconds.
timeout_secs = 30

# Bearer credential attached to every request.
# token = "..."

# ---------------------------------------------------------------------------
# Upload slots
# ---------------------------------------------------------------------------
# Each slot has a [compression] and a [crop] table.
#
# compression.max_size_mb          target size in MiB (best-effort)
# compression.max_width_or_height  longest edge in px (never upscales)
# compression.file_type            "image/webp", "image/jpeg" or "image/png"
# compression.initial_quality      0-1, only honoured by lossy encoders
#
# crop.aspect                      width / height; omit for free aspect
# crop.shape                       "rect" or "round" (overlay only)
# crop.min_zoom / crop.max_zoom    zoom slider range

[slots.default.compression]
max_size_mb = 0.5
max_width_or_height = 1600
file_type = "image/webp"
initial_quality = 0.82

[slots.default.crop]
shape = "rect"
min_zoom = 1.0
max_zoom = 3.0

[slots.profile_pic.compression]
max_size_mb = 0.3
max_width_or_height = 400
file_type = "image/webp"
initial_quality = 0.85

[slots.profile_pic.crop]
aspect = 1.0
shape = "round"
min_zoom = 1.0
max_zoom = 4.0

[slots.cover_photo.compression]
max_size_mb = 0.8
max_width_or_height = 1920
file_type = "image/webp"
initial_quality = 0.82

[slots.cover_photo.crop]
aspect = 4.0
shape = "rect"
min_zoom = 1.0
max_zoom = 3.0
"##
}
