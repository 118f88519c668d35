//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Crop** | `crop_imm` at 1:1, re-encoded as the slot's output format |
//! | **Compress** | Lanczos3 downscale + WebP/JPEG/PNG encode under a byte budget |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Transformer**: [`ImageTransformer`] trait + error types
//! - **Rust transformer**: [`RustTransformer`], the production implementation

mod calculations;
mod params;
pub mod rust_transformer;
pub mod transformer;

pub use calculations::{base_filename, fit_within};
pub use params::{CompressParams, OutputFormat, Quality};
pub use rust_transformer::{RustTransformer, probe_dimensions};
pub use transformer::{CompressionError, ImageTransformer, TransformError};

#[cfg(test)]
pub use transformer::tests::ScriptedTransformer;
