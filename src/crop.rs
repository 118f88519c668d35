//! Interactive crop session.
//!
//! A [`CropSession`] holds what the user is doing on the crop surface:
//! offset (pan), zoom and rotation. The surface reports the resulting pixel
//! rectangle through [`CropSession::on_region_computed`] and the session keeps
//! the latest one. Confirming hands that rectangle out; there is no separate
//! computation at confirm time.
//!
//! ```text
//! open ──► pan / zoom / rotate ──► region emitted ──► confirm ──► PixelCropRegion
//!   │                                                    │
//!   └──────────────────────── cancel ◄───────────────────┘
//! ```
//!
//! When a [`CropSurface`] is attached the session computes regions itself,
//! emitting one on attach and after every gesture. Without a surface the
//! caller must feed regions in.

use crate::config::CropConfig;
use crate::types::{Dimensions, PixelCropRegion};

/// Increment used by the zoom buttons.
pub const ZOOM_STEP: f64 = 0.1;
pub const MIN_ROTATION: f64 = -180.0;
pub const MAX_ROTATION: f64 = 180.0;

/// Media translation on the crop surface, in natural source pixels.
///
/// Moving the media right (positive `x`) shows more of its left side, so the
/// crop window moves left in source coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of the crop surface for one source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropSurface {
    natural: Dimensions,
    aspect: Option<f64>,
}

impl CropSurface {
    pub fn new(natural: Dimensions, aspect: Option<f64>) -> Self {
        Self { natural, aspect }
    }

    pub fn natural(&self) -> Dimensions {
        self.natural
    }

    /// The pixel region visible through the crop window.
    ///
    /// At zoom 1 the window is the largest rectangle of the configured aspect
    /// that fits the source (the whole source for free aspect). Zooming
    /// divides its size; the offset moves its center. The result is rounded
    /// to whole pixels and clamped inside the source.
    pub fn region(&self, offset: Offset, zoom: f64) -> PixelCropRegion {
        let w = f64::from(self.natural.width.max(1));
        let h = f64::from(self.natural.height.max(1));

        let (base_w, base_h) = match self.aspect {
            Some(aspect) if w / h > aspect => (h * aspect, h),
            Some(aspect) => (w, w / aspect),
            None => (w, h),
        };

        let zoom = if zoom.is_finite() { zoom.max(1.0) } else { 1.0 };
        let crop_w = (base_w / zoom).round().clamp(1.0, w);
        let crop_h = (base_h / zoom).round().clamp(1.0, h);

        let center_x = w / 2.0 - offset.x;
        let center_y = h / 2.0 - offset.y;
        let x = (center_x - crop_w / 2.0).round().clamp(0.0, w - crop_w);
        let y = (center_y - crop_h / 2.0).round().clamp(0.0, h - crop_h);

        PixelCropRegion::new(x as u32, y as u32, crop_w as u32, crop_h as u32)
    }
}

/// State of one crop interaction.
#[derive(Debug, Clone)]
pub struct CropSession {
    config: CropConfig,
    offset: Offset,
    zoom: f64,
    rotation: f64,
    live_region: Option<PixelCropRegion>,
    surface: Option<CropSurface>,
}

/// Keep `value` inside the configured zoom range.
///
/// The config may come straight from a caller, so an inverted range resolves
/// to `max_zoom`, NaN bounds are ignored and a non-positive result falls
/// back to 1.
fn limit_zoom(config: &CropConfig, value: f64) -> f64 {
    let zoom = value.max(config.min_zoom).min(config.max_zoom);
    if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 }
}

impl CropSession {
    /// Open a session for a freshly loaded source image.
    pub fn new(config: &CropConfig) -> Self {
        Self {
            config: config.clone(),
            offset: Offset::default(),
            zoom: limit_zoom(config, config.min_zoom),
            rotation: 0.0,
            live_region: None,
            surface: None,
        }
    }

    /// Attach surface geometry; emits the initial region.
    pub fn attach_surface(&mut self, natural: Dimensions) {
        self.surface = Some(CropSurface::new(natural, self.config.aspect));
        self.recompute();
    }

    pub fn surface(&self) -> Option<&CropSurface> {
        self.surface.as_ref()
    }

    pub fn pan(&mut self, delta: Offset) {
        self.offset.x += delta.x;
        self.offset.y += delta.y;
        self.recompute();
    }

    pub fn set_zoom(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.zoom = limit_zoom(&self.config, value);
        self.recompute();
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - ZOOM_STEP);
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        if degrees.is_nan() {
            return;
        }
        self.rotation = degrees.clamp(MIN_ROTATION, MAX_ROTATION);
        self.recompute();
    }

    pub fn reset_rotation(&mut self) {
        self.set_rotation(0.0);
    }

    /// Record the latest region reported by the crop surface.
    pub fn on_region_computed(&mut self, region: PixelCropRegion) {
        self.live_region = Some(region);
    }

    /// The region to crop, or `None` if the surface has not reported one yet.
    pub fn confirm(&self) -> Option<PixelCropRegion> {
        self.live_region
    }

    /// Discard everything, back to the state of a fresh session.
    pub fn cancel(&mut self) {
        *self = Self::new(&self.config);
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn live_region(&self) -> Option<PixelCropRegion> {
        self.live_region
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    pub fn aspect_label(&self) -> String {
        self.config.aspect_label()
    }

    fn recompute(&mut self) {
        if let Some(surface) = self.surface {
            let region = surface.region(self.offset, self.zoom);
            self.on_region_computed(region);
        }
    }
}
