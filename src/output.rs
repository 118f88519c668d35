//! CLI output formatting for slot activity.
//!
//! # Slot-First Display
//!
//! Every line is led by the slot it concerns, so output from several slots
//! interleaved on one terminal stays readable. Details about an artifact are
//! indented under a header line, the same two-level shape for every command.
//!
//! # Output Format
//!
//! ## Events
//!
//! ```text
//! [avatar] crop pending
//! [avatar] processing
//! [avatar] ready
//! [avatar] failed: Compression error: ...
//! [avatar] uploaded
//!     URL: https://cdn.example.com/avatar.webp
//! ```
//!
//! ## Artifact summary
//!
//! ```text
//! avatar.webp (image/webp)
//!     Size: 400x400, 41.2 KB
//!     Crop: 1000x1000+0+0
//!     Written: out/avatar.webp
//! ```
//!
//! # Architecture
//!
//! Each `format_*` function returns `Vec<String>` for testability and has a
//! `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::slot::SlotEvent;
use crate::types::{PixelCropRegion, ProcessedArtifact, SlotState};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count using binary units.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// Format a slot event as display lines.
pub fn format_slot_event(event: &SlotEvent) -> Vec<String> {
    match event {
        SlotEvent::StateChanged {
            slot,
            state: SlotState::Uploaded { url },
        } => vec![
            format!("[{slot}] uploaded"),
            format!("{}URL: {url}", indent(1)),
        ],
        SlotEvent::StateChanged { slot, state } => vec![format!("[{slot}] {}", state.label())],
        SlotEvent::Failed { slot, error } => vec![format!("[{slot}] failed: {error}")],
    }
}

pub fn print_slot_event(event: &SlotEvent) {
    for line in format_slot_event(event) {
        println!("{line}");
    }
}

/// Format a processed artifact with the region it was cut from and, when
/// saved, where it was written.
pub fn format_artifact_summary(
    artifact: &ProcessedArtifact,
    region: Option<&PixelCropRegion>,
    written: Option<&Path>,
) -> Vec<String> {
    let dims = artifact.dimensions();
    let mut lines = vec![
        format!("{} ({})", artifact.filename(), artifact.mime()),
        format!(
            "{}Size: {}x{}, {}",
            indent(1),
            dims.width,
            dims.height,
            format_size(artifact.size())
        ),
    ];
    if let Some(region) = region {
        lines.push(format!("{}Crop: {region}", indent(1)));
    }
    if let Some(path) = written {
        lines.push(format!("{}Written: {}", indent(1), path.display()));
    }
    lines
}

pub fn print_artifact_summary(
    artifact: &ProcessedArtifact,
    region: Option<&PixelCropRegion>,
    written: Option<&Path>,
) {
    for line in format_artifact_summary(artifact, region, written) {
        println!("{line}");
    }
}
