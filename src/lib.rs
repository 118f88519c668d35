//! # tripvault
//!
//! The media core of a travel-journaling client: the pipeline that turns a
//! picked photo into a cropped, compressed image stored by the backend, used
//! for profile pictures and cover photos.
//!
//! # Architecture: One Pipeline per Slot
//!
//! Every upload target (avatar, cover photo, ...) is an independent
//! [`slot::UploadSlot`] with its own settings and lifecycle:
//!
//! ```text
//! 1. Select    file       →  DataUrl             (selection)
//! 2. Crop      DataUrl    →  PixelCropRegion     (crop session, user driven)
//! 3. Process   region     →  ProcessedArtifact   (imaging: crop, then compress)
//! 4. Preview   artifact   →  PreviewHandle       (preview store)
//! 5. Upload    artifact   →  remote URL          (api)
//! ```
//!
//! The slot owns every resource it creates. Cancelling, failing, resetting
//! or dropping a slot always leaves it in a well-defined settled state with
//! no leaked preview handles.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`slot`] | Upload orchestrator: per-slot state machine, preview ownership, events |
//! | [`selection`] | Reads a picked file into a [`selection::DataUrl`]; file-input abstraction |
//! | [`crop`] | Crop session (pan, zoom, rotation) and crop-surface region geometry |
//! | [`imaging`] | Pure-Rust crop and byte-budgeted compression behind [`imaging::ImageTransformer`] |
//! | [`preview`] | Preview handle stores (in memory or on disk) |
//! | [`api`] | Backend HTTP client: multipart media upload, profile update |
//! | [`profile`] | Current-user cache and profile save flow |
//! | [`config`] | `tripvault.toml` loading, merging over stock presets, validation |
//! | [`types`] | Values passed between stages (`PixelCropRegion`, `ProcessedArtifact`, `SlotState`) |
//! | [`output`] | CLI output formatting for slot events and artifacts |
//!
//! # Design Decisions
//!
//! ## Traits at Every Seam
//!
//! Pixel work, preview storage, uploading and the profile cache are each a
//! trait object injected into the component that uses them. Tests swap in
//! scripted implementations without touching the network or, where it
//! matters, the encoder.
//!
//! ## Compression Off the Async Task
//!
//! Encoding a large image takes long enough to stall an executor thread, so
//! [`imaging::ImageTransformer::compress`] runs under
//! `tokio::task::spawn_blocking`. Cropping is a single 1:1 copy and stays
//! inline.
//!
//! ## Best-Effort Byte Budget
//!
//! Each slot has a maximum file size. The transformer shrinks the image in
//! small steps until the encoding fits or a fixed number of attempts is used
//! up, then keeps the smallest encoding it produced. A result slightly over
//! budget is preferred to failing the user's upload.
//!
//! ## Events over Callbacks
//!
//! Slots publish [`slot::SlotEvent`]s over `std::sync::mpsc` channels. The
//! CLI drains them on a printer thread; a UI would re-render from them.

pub mod api;
pub mod config;
pub mod crop;
pub mod imaging;
pub mod output;
pub mod preview;
pub mod profile;
pub mod selection;
pub mod slot;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
