//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::types::Dimensions;

/// Scale factor applied to dimensions and quality on each shrink iteration.
pub const SHRINK_FACTOR: f32 = 0.95;

/// Upper bound on shrink iterations when chasing the byte budget.
pub const MAX_SHRINK_ITERATIONS: u32 = 10;

/// Fit `source` so its longest edge is at most `max_edge`.
///
/// Downscale only: a source that already fits is returned unchanged. The
/// aspect ratio is preserved and the longest edge lands exactly on
/// `max_edge`.
///
/// # Examples
/// ```
/// # use tripvault::imaging::fit_within;
/// # use tripvault::types::Dimensions;
/// assert_eq!(fit_within(Dimensions::new(1000, 1000), 400), Dimensions::new(400, 400));
/// assert_eq!(fit_within(Dimensions::new(2000, 1500), 400), Dimensions::new(400, 300));
/// assert_eq!(fit_within(Dimensions::new(300, 200), 400), Dimensions::new(300, 200));
/// ```
pub fn fit_within(source: Dimensions, max_edge: u32) -> Dimensions {
    let longest = source.longest_edge();
    if longest <= max_edge || max_edge == 0 {
        return source;
    }

    let scale = max_edge as f64 / longest as f64;
    if source.width >= source.height {
        let h = ((source.height as f64 * scale).round() as u32).max(1);
        Dimensions::new(max_edge, h)
    } else {
        let w = ((source.width as f64 * scale).round() as u32).max(1);
        Dimensions::new(w, max_edge)
    }
}

/// Shrink both edges by `factor`, keeping each at least 1px.
pub fn shrink(dims: Dimensions, factor: f32) -> Dimensions {
    let w = ((dims.width as f32 * factor).round() as u32).max(1);
    let h = ((dims.height as f32 * factor).round() as u32).max(1);
    Dimensions::new(w, h)
}

/// Basename of a selected file with its last extension stripped.
///
/// Falls back to `"image"` when nothing is left (e.g. `".png"`).
pub fn base_filename(name: &str) -> String {
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    if stem.is_empty() {
        "image".to_string()
    } else {
        stem.to_string()
    }
}
