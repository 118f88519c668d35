//! Upload orchestrator: one [`UploadSlot`] per upload target.
//!
//! A slot composes file selection, the crop session, the image transformer,
//! the preview store and an uploader into a single lifecycle:
//!
//! ```text
//!            select              confirm               ok
//!   Idle ───────────► CropPending ───────► Processing ─────► Ready ──► Uploading ──► Uploaded
//!    ▲                    │                    │               ▲           │
//!    │     cancel         │       error        │               │   error   │
//!    └────────────────────┴────────────────────┘               └───────────┘
//!              (back to the prior settled state)
//! ```
//!
//! ## Settled vs in-flight
//!
//! The slot keeps two things apart:
//!
//! | Part | Holds | Visible as |
//! |---|---|---|
//! | Settled | last artifact, its preview handle, upload phase | `Ready` / `Uploading` / `Uploaded` (or `Idle` when empty) |
//! | In-flight | the raw source and crop session, or a running crop | `CropPending` / `Processing` |
//!
//! A failed or cancelled cycle simply drops the in-flight part, so the slot
//! falls back to whatever was settled before. The settled artifact is only
//! exposed through [`UploadSlot::processed_artifact`] when no cycle is in
//! flight. Its preview stays displayed throughout.
//!
//! ## Preview handles
//!
//! A slot owns at most one live [`PreviewHandle`]. It is revoked when a newer
//! artifact replaces it, on [`reset`](UploadSlot::reset), on
//! [`dispose`](UploadSlot::dispose) and on drop.
//!
//! ## Events
//!
//! Every state change is broadcast as a [`SlotEvent`] to the channels handed
//! out by [`subscribe`](UploadSlot::subscribe). Recovered errors are
//! broadcast as [`SlotEvent::Failed`] as well as returned.
//!
//! Every operation takes `&mut self`, so operations on one slot never
//! interleave. Separate slots share nothing and may run concurrently.

use crate::api::{MediaUploader, UploadError};
use crate::config::UploadSlotConfig;
use crate::crop::CropSession;
use crate::imaging::{
    CompressParams, CompressionError, ImageTransformer, TransformError, base_filename,
    probe_dimensions,
};
use crate::preview::{PreviewError, PreviewHandle, PreviewStore};
use crate::selection::{DataUrl, FileInput, ReadError, read_file_as_data_url};
use crate::types::{PixelCropRegion, ProcessedArtifact, SlotState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
    #[error("Crop error: {0}")]
    Transform(#[from] TransformError),
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),
    #[error("Preview error: {0}")]
    Preview(#[from] PreviewError),
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
    #[error("Slot '{slot}' has nothing to upload (state: {state})")]
    NotReady { slot: String, state: SlotState },
}

/// Notification sent to slot subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent {
    StateChanged { slot: String, state: SlotState },
    Failed { slot: String, error: String },
}

enum Cycle {
    Idle,
    CropPending {
        source: DataUrl,
        session: CropSession,
        base_name: String,
    },
    Processing,
}

enum UploadPhase {
    Ready,
    Uploading,
    Uploaded(String),
}

struct Settled {
    artifact: ProcessedArtifact,
    preview: PreviewHandle,
    phase: UploadPhase,
}

/// One independent upload target with its own config and state.
pub struct UploadSlot {
    name: String,
    config: UploadSlotConfig,
    transformer: Arc<dyn ImageTransformer>,
    previews: Arc<dyn PreviewStore>,
    input: Option<Box<dyn FileInput>>,
    cycle: Cycle,
    settled: Option<Settled>,
    subscribers: Vec<Sender<SlotEvent>>,
}

impl UploadSlot {
    pub fn new(
        name: impl Into<String>,
        config: UploadSlotConfig,
        transformer: Arc<dyn ImageTransformer>,
        previews: Arc<dyn PreviewStore>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            transformer,
            previews,
            input: None,
            cycle: Cycle::Idle,
            settled: None,
            subscribers: Vec::new(),
        }
    }

    /// Bind the file picker this slot clears after each successful read.
    pub fn bind_input(&mut self, input: Box<dyn FileInput>) {
        self.input = Some(input);
    }

    pub fn input(&self) -> Option<&dyn FileInput> {
        self.input.as_deref()
    }

    /// Receive every subsequent [`SlotEvent`] from this slot.
    pub fn subscribe(&mut self) -> Receiver<SlotEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &UploadSlotConfig {
        &self.config
    }

    pub fn state(&self) -> SlotState {
        match (&self.cycle, &self.settled) {
            (Cycle::Processing, _) => SlotState::Processing,
            (Cycle::CropPending { .. }, _) => SlotState::CropPending,
            (Cycle::Idle, None) => SlotState::Idle,
            (Cycle::Idle, Some(settled)) => match &settled.phase {
                UploadPhase::Ready => SlotState::Ready,
                UploadPhase::Uploading => SlotState::Uploading,
                UploadPhase::Uploaded(url) => SlotState::Uploaded { url: url.clone() },
            },
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.cycle, Cycle::Processing)
    }

    /// URL of the live preview, if any.
    pub fn preview_url(&self) -> Option<&str> {
        self.settled.as_ref().map(|s| s.preview.url())
    }

    /// The current artifact. `None` while a crop cycle is in flight.
    pub fn processed_artifact(&self) -> Option<&ProcessedArtifact> {
        match self.cycle {
            Cycle::Idle => self.settled.as_ref().map(|s| &s.artifact),
            _ => None,
        }
    }

    /// Remote URL returned by the last successful upload.
    pub fn remote_url(&self) -> Option<&str> {
        match self.settled.as_ref().map(|s| &s.phase) {
            Some(UploadPhase::Uploaded(url)) => Some(url),
            _ => None,
        }
    }

    /// Raw source awaiting crop.
    pub fn crop_source(&self) -> Option<&DataUrl> {
        match &self.cycle {
            Cycle::CropPending { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn crop_session(&self) -> Option<&CropSession> {
        match &self.cycle {
            Cycle::CropPending { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn crop_session_mut(&mut self) -> Option<&mut CropSession> {
        match &mut self.cycle {
            Cycle::CropPending { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Read the selected file and open a crop session for it.
    ///
    /// A pending source from an earlier selection is discarded. On a read
    /// error the slot is left unchanged.
    pub async fn handle_file_selected(&mut self, path: &Path) -> Result<(), SlotError> {
        let source = match read_file_as_data_url(path).await {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e.into())),
        };
        if let Some(input) = self.input.as_mut() {
            input.clear();
        }

        let mut session = CropSession::new(&self.config.crop);
        match probe_dimensions(source.bytes()) {
            Some(natural) => session.attach_surface(natural),
            None => debug!(slot = %self.name, mime = source.mime(), "source dimensions unknown"),
        }

        let base_name = base_filename(
            &path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        debug!(slot = %self.name, mime = source.mime(), size = source.bytes().len(), "source loaded");

        self.cycle = Cycle::CropPending {
            source,
            session,
            base_name,
        };
        self.notify();
        Ok(())
    }

    /// Select whatever file the bound input currently holds.
    pub async fn handle_input_changed(&mut self) -> Result<(), SlotError> {
        let selected: Option<PathBuf> = self
            .input
            .as_ref()
            .and_then(|input| input.value())
            .map(Path::to_path_buf);
        match selected {
            Some(path) => self.handle_file_selected(&path).await,
            None => Ok(()),
        }
    }

    /// Crop the pending source to `region`, compress it and publish a preview.
    ///
    /// No-op unless a crop is pending. If the returned future is dropped
    /// before it completes, the pending source is discarded and the slot falls
    /// back to its settled state.
    pub async fn confirm_crop(&mut self, region: PixelCropRegion) -> Result<(), SlotError> {
        if !matches!(self.cycle, Cycle::CropPending { .. }) {
            debug!(slot = %self.name, state = %self.state(), "confirm without pending crop, ignoring");
            return Ok(());
        }
        let Cycle::CropPending {
            source, base_name, ..
        } = std::mem::replace(&mut self.cycle, Cycle::Processing)
        else {
            return Ok(());
        };
        self.notify();
        debug!(slot = %self.name, %region, "cropping");

        let guard = Rollback::arm(self);
        let processed = guard.slot.process(&source, region, &base_name).await;
        guard.disarm();

        let artifact = match processed {
            Ok(artifact) => artifact,
            Err(e) => {
                self.cycle = Cycle::Idle;
                self.notify();
                return Err(self.fail(e));
            }
        };

        if let Some(old) = self.settled.take() {
            self.previews.revoke(old.preview);
        }
        let preview = match self.previews.create(&artifact) {
            Ok(preview) => preview,
            Err(e) => {
                self.cycle = Cycle::Idle;
                self.notify();
                return Err(self.fail(e.into()));
            }
        };

        info!(
            slot = %self.name,
            filename = artifact.filename(),
            size = artifact.size(),
            width = artifact.dimensions().width,
            height = artifact.dimensions().height,
            "artifact ready"
        );
        self.settled = Some(Settled {
            artifact,
            preview,
            phase: UploadPhase::Ready,
        });
        self.cycle = Cycle::Idle;
        self.notify();
        Ok(())
    }

    /// Confirm using the latest region reported by the owned crop session.
    ///
    /// No-op when no crop is pending or the session has no region yet.
    pub async fn confirm_pending_crop(&mut self) -> Result<(), SlotError> {
        match self.crop_session().and_then(CropSession::confirm) {
            Some(region) => self.confirm_crop(region).await,
            None => {
                debug!(slot = %self.name, "no crop region to confirm");
                Ok(())
            }
        }
    }

    /// Abandon the pending crop and return to the prior settled state.
    pub fn cancel_crop(&mut self) {
        if matches!(self.cycle, Cycle::CropPending { .. }) {
            self.cycle = Cycle::Idle;
            debug!(slot = %self.name, "crop cancelled");
            self.notify();
        }
    }

    /// Drop everything and return to `Idle`. Safe to call repeatedly.
    pub fn reset(&mut self) {
        let before = self.state();
        self.release_preview();
        self.cycle = Cycle::Idle;
        if let Some(input) = self.input.as_mut() {
            input.clear();
        }
        if before != SlotState::Idle {
            self.notify();
        }
    }

    /// Upload the current artifact and return its remote URL.
    ///
    /// On failure the slot goes back to `Ready` with the same artifact so the
    /// caller can retry. An already uploaded artifact may be sent again.
    /// Dropping the returned future mid-request also returns the slot to
    /// `Ready`.
    pub async fn upload(
        &mut self,
        uploader: &dyn MediaUploader,
        context: Option<&str>,
    ) -> Result<String, SlotError> {
        let state = self.state();
        if !matches!(state, SlotState::Ready | SlotState::Uploaded { .. }) {
            return Err(SlotError::NotReady {
                slot: self.name.clone(),
                state,
            });
        }
        let Some(settled) = self.settled.as_mut() else {
            return Err(SlotError::NotReady {
                slot: self.name.clone(),
                state,
            });
        };
        settled.phase = UploadPhase::Uploading;
        self.notify();

        let guard = Rollback::arm(self);
        let result = match guard.slot.settled.as_ref() {
            Some(settled) => uploader.upload(&settled.artifact, context).await,
            None => {
                let state = guard.slot.state();
                return Err(SlotError::NotReady {
                    slot: guard.slot.name.clone(),
                    state,
                });
            }
        };
        guard.disarm();

        match result {
            Ok(url) => {
                info!(slot = %self.name, %url, "uploaded");
                if let Some(settled) = self.settled.as_mut() {
                    settled.phase = UploadPhase::Uploaded(url.clone());
                }
                self.notify();
                Ok(url)
            }
            Err(e) => {
                if let Some(settled) = self.settled.as_mut() {
                    settled.phase = UploadPhase::Ready;
                }
                self.notify();
                Err(self.fail(e.into()))
            }
        }
    }

    /// Release the preview and consume the slot.
    pub fn dispose(mut self) {
        debug!(slot = %self.name, "disposing");
        self.release_preview();
    }

    async fn process(
        &self,
        source: &DataUrl,
        region: PixelCropRegion,
        base_name: &str,
    ) -> Result<ProcessedArtifact, SlotError> {
        let params = CompressParams::from_config(&self.config.compression);
        let blob = self
            .transformer
            .crop_to_region(source.bytes(), &region, params.format)?;

        let filename = format!("{base_name}.{}", params.format.extension());
        let transformer = Arc::clone(&self.transformer);
        let artifact =
            tokio::task::spawn_blocking(move || transformer.compress(&blob, &params, &filename))
                .await
                .map_err(|e| CompressionError::Worker(e.to_string()))??;
        Ok(artifact)
    }

    /// Drop whatever operation was in flight and fall back to the settled
    /// state.
    fn abandon_in_flight(&mut self) {
        let mut changed = false;
        if matches!(self.cycle, Cycle::Processing) {
            self.cycle = Cycle::Idle;
            changed = true;
        }
        if let Some(settled) = self.settled.as_mut() {
            if matches!(settled.phase, UploadPhase::Uploading) {
                settled.phase = UploadPhase::Ready;
                changed = true;
            }
        }
        if changed {
            warn!(slot = %self.name, "operation abandoned before completion");
            self.notify();
        }
    }

    fn release_preview(&mut self) {
        if let Some(settled) = self.settled.take() {
            debug!(slot = %self.name, url = settled.preview.url(), "revoking preview");
            self.previews.revoke(settled.preview);
        }
    }

    fn notify(&mut self) {
        let state = self.state();
        info!(slot = %self.name, %state, "state changed");
        self.broadcast(SlotEvent::StateChanged {
            slot: self.name.clone(),
            state,
        });
    }

    /// Log and broadcast a recovered error, handing it back to the caller.
    fn fail(&mut self, error: SlotError) -> SlotError {
        warn!(slot = %self.name, error = %error, "operation failed");
        self.broadcast(SlotEvent::Failed {
            slot: self.name.clone(),
            error: error.to_string(),
        });
        error
    }

    fn broadcast(&mut self, event: SlotEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Holds the slot across an await; unless disarmed, dropping it rolls the
/// slot back to its settled state.
struct Rollback<'a> {
    slot: &'a mut UploadSlot,
    armed: bool,
}

impl<'a> Rollback<'a> {
    fn arm(slot: &'a mut UploadSlot) -> Self {
        Self { slot, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.slot.abandon_in_flight();
        }
    }
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        self.release_preview();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{OutputFormat, RustTransformer, ScriptedTransformer};
    use crate::preview::MemoryPreviewStore;
    use crate::selection::PickerInput;
    use crate::test_helpers::{decoded_dimensions, exif_oriented_jpeg, write_gradient_jpeg};
    use crate::types::{Blob, Dimensions};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Uploader that answers with a fixed URL or fails when told to.
    #[derive(Default)]
    struct FakeUploader {
        fail: AtomicBool,
        contexts: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl MediaUploader for FakeUploader {
        async fn upload(
            &self,
            artifact: &ProcessedArtifact,
            context: Option<&str>,
        ) -> Result<String, UploadError> {
            self.contexts
                .lock()
                .unwrap()
                .push(context.map(str::to_string));
            if self.fail.load(Ordering::SeqCst) {
                return Err(UploadError::InvalidResponse("network down".into()));
            }
            Ok(format!("https://cdn.example.com/{}", artifact.filename()))
        }
    }

    /// Uploader whose request never completes.
    struct StalledUploader;

    #[async_trait]
    impl MediaUploader for StalledUploader {
        async fn upload(
            &self,
            _artifact: &ProcessedArtifact,
            _context: Option<&str>,
        ) -> Result<String, UploadError> {
            std::future::pending().await
        }
    }

    /// Transformer whose compression takes long enough to be interrupted.
    struct SlowTransformer;

    impl ImageTransformer for SlowTransformer {
        fn crop_to_region(
            &self,
            source: &[u8],
            region: &PixelCropRegion,
            format: OutputFormat,
        ) -> Result<Blob, TransformError> {
            RustTransformer::new().crop_to_region(source, region, format)
        }

        fn compress(
            &self,
            blob: &Blob,
            params: &CompressParams,
            filename: &str,
        ) -> Result<ProcessedArtifact, CompressionError> {
            std::thread::sleep(Duration::from_millis(300));
            RustTransformer::new().compress(blob, params, filename)
        }
    }

    struct Fixture {
        _tmp: TempDir,
        photo: PathBuf,
        transformer: Arc<ScriptedTransformer>,
        previews: Arc<MemoryPreviewStore>,
        slot: UploadSlot,
    }

    fn fixture(config: UploadSlotConfig) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let photo = write_gradient_jpeg(tmp.path(), "sunset.beach.jpg", 320, 240);
        let transformer = Arc::new(ScriptedTransformer::new());
        let previews = Arc::new(MemoryPreviewStore::new());
        let slot = UploadSlot::new("avatar", config, transformer.clone(), previews.clone());
        Fixture {
            _tmp: tmp,
            photo,
            transformer,
            previews,
            slot,
        }
    }

    fn drain(rx: &Receiver<SlotEvent>) -> Vec<SlotEvent> {
        rx.try_iter().collect()
    }

    fn states(events: &[SlotEvent]) -> Vec<SlotState> {
        events
            .iter()
            .filter_map(|e| match e {
                SlotEvent::StateChanged { state, .. } => Some(state.clone()),
                SlotEvent::Failed { .. } => None,
            })
            .collect()
    }

    async fn make_ready(f: &mut Fixture) {
        f.slot.handle_file_selected(&f.photo).await.unwrap();
        f.slot
            .confirm_crop(PixelCropRegion::new(0, 0, 200, 200))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn new_slot_is_idle() {
        let f = fixture(UploadSlotConfig::profile_pic());
        assert_eq!(f.slot.state(), SlotState::Idle);
        assert!(f.slot.processed_artifact().is_none());
        assert!(f.slot.preview_url().is_none());
        assert!(!f.slot.is_processing());
    }

    #[tokio::test]
    async fn select_opens_crop_session_with_surface() {
        let mut f = fixture(UploadSlotConfig::profile_pic());
        let rx = f.slot.subscribe();

        f.slot.handle_file_selected(&f.photo).await.unwrap();

        assert_eq!(f.slot.state(), SlotState::CropPending);
        assert_eq!(f.slot.crop_source().unwrap().mime(), "image/jpeg");
        let session = f.slot.crop_session().unwrap();
        assert_eq!(session.zoom(), 1.0);
        assert_eq!(
            session.confirm(),
            Some(PixelCropRegion::new(40, 0, 240, 240))
        );
        assert_eq!(states(&drain(&rx)), vec![SlotState::CropPending]);
    }

    #[tokio::test]
    async fn select_clears_bound_input() {
        let mut f = fixture(UploadSlotConfig::default());
        let mut input = PickerInput::new();
        input.select(&f.photo);
        f.slot.bind_input(Box::new(input));

        f.slot.handle_input_changed().await.unwrap();

        assert_eq!(f.slot.state(), SlotState::CropPending);
        assert!(f.slot.input().unwrap().value().is_none());
    }

    #[tokio::test]
    async fn read_error_leaves_state_unchanged() {
        let mut f = fixture(UploadSlotConfig::default());
        let rx = f.slot.subscribe();

        let result = f.slot.handle_file_selected(Path::new("/missing/pic.jpg")).await;

        assert!(matches!(result, Err(SlotError::Read(_))));
        assert_eq!(f.slot.state(), SlotState::Idle);
        let events = drain(&rx);
        assert!(states(&events).is_empty());
        assert!(matches!(events[0], SlotEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn confirm_produces_ready_artifact() {
        let mut f = fixture(UploadSlotConfig::profile_pic());
        let rx = f.slot.subscribe();
        make_ready(&mut f).await;

        assert_eq!(f.slot.state(), SlotState::Ready);
        let artifact = f.slot.processed_artifact().unwrap();
        assert_eq!(artifact.mime(), "image/webp");
        assert_eq!(artifact.filename(), "sunset.beach.webp");
        assert_eq!(decoded_dimensions(artifact.bytes()).width, 200);
        assert!(f.slot.preview_url().unwrap().starts_with("blob:"));
        assert_eq!(
            states(&drain(&rx)),
            vec![
                SlotState::CropPending,
                SlotState::Processing,
                SlotState::Ready
            ]
        );
        assert_eq!(
            f.transformer.get_calls(),
            vec![
                "crop 200x200+0+0".to_string(),
                "compress sunset.beach.webp".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn confirm_pending_crop_uses_session_region() {
        let mut f = fixture(UploadSlotConfig::profile_pic());
        f.slot.handle_file_selected(&f.photo).await.unwrap();
        f.slot.crop_session_mut().unwrap().set_zoom(2.0);

        f.slot.confirm_pending_crop().await.unwrap();

        assert_eq!(f.slot.state(), SlotState::Ready);
        assert_eq!(f.transformer.get_calls()[0], "crop 120x120+100+60");
    }

    #[tokio::test]
    async fn confirm_without_pending_crop_is_noop() {
        let mut f = fixture(UploadSlotConfig::default());
        let rx = f.slot.subscribe();

        f.slot
            .confirm_crop(PixelCropRegion::new(0, 0, 10, 10))
            .await
            .unwrap();
        f.slot.confirm_pending_crop().await.unwrap();
        f.slot.cancel_crop();

        assert_eq!(f.slot.state(), SlotState::Idle);
        assert!(drain(&rx).is_empty());
        assert!(f.transformer.get_calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_returns_to_idle_without_artifact() {
        let mut f = fixture(UploadSlotConfig::default());
        f.slot.handle_file_selected(&f.photo).await.unwrap();
        f.slot.cancel_crop();

        assert_eq!(f.slot.state(), SlotState::Idle);
        assert!(f.slot.crop_source().is_none());
        assert_eq!(f.previews.live_count(), 0);
    }

    #[tokio::test]
    async fn cancel_returns_to_ready_with_earlier_artifact() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        let before = f.slot.processed_artifact().unwrap().clone();
        let preview = f.slot.preview_url().unwrap().to_string();

        f.slot.handle_file_selected(&f.photo).await.unwrap();
        assert!(f.slot.processed_artifact().is_none());
        assert_eq!(f.slot.preview_url(), Some(preview.as_str()));

        f.slot.cancel_crop();
        assert_eq!(f.slot.state(), SlotState::Ready);
        assert_eq!(f.slot.processed_artifact(), Some(&before));
    }

    #[tokio::test]
    async fn compression_failure_keeps_prior_artifact() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        let before = f.slot.processed_artifact().unwrap().clone();
        let preview = f.slot.preview_url().unwrap().to_string();

        f.transformer.set_fail_compress(true);
        f.slot.handle_file_selected(&f.photo).await.unwrap();
        let result = f
            .slot
            .confirm_crop(PixelCropRegion::new(0, 0, 50, 50))
            .await;

        assert!(matches!(result, Err(SlotError::Compression(_))));
        assert_eq!(f.slot.state(), SlotState::Ready);
        assert_eq!(f.slot.processed_artifact(), Some(&before));
        assert_eq!(f.slot.preview_url(), Some(preview.as_str()));
        assert_eq!(f.previews.live_count(), 1);
    }

    #[tokio::test]
    async fn out_of_bounds_region_is_transform_error() {
        let mut f = fixture(UploadSlotConfig::default());
        let rx = f.slot.subscribe();
        f.slot.handle_file_selected(&f.photo).await.unwrap();

        let result = f
            .slot
            .confirm_crop(PixelCropRegion::new(300, 200, 100, 100))
            .await;

        assert!(matches!(result, Err(SlotError::Transform(_))));
        assert_eq!(f.slot.state(), SlotState::Idle);
        let events = drain(&rx);
        assert_eq!(
            states(&events),
            vec![
                SlotState::CropPending,
                SlotState::Processing,
                SlotState::Idle
            ]
        );
        assert!(matches!(events.last(), Some(SlotEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn repeated_confirms_keep_one_live_preview() {
        let mut f = fixture(UploadSlotConfig::default());
        for _ in 0..4 {
            make_ready(&mut f).await;
        }
        assert_eq!(f.previews.live_count(), 1);
        assert_eq!(f.previews.revoked_count(), 3);
        assert!(f.previews.resolve(f.slot.preview_url().unwrap()).is_some());
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        let rx = f.slot.subscribe();

        f.slot.reset();
        f.slot.reset();

        assert_eq!(f.slot.state(), SlotState::Idle);
        assert!(f.slot.preview_url().is_none());
        assert_eq!(f.previews.live_count(), 0);
        assert_eq!(f.previews.revoked_count(), 1);
        assert_eq!(states(&drain(&rx)), vec![SlotState::Idle]);
    }

    #[tokio::test]
    async fn upload_success_and_context() {
        let mut f = fixture(UploadSlotConfig::profile_pic());
        make_ready(&mut f).await;
        let rx = f.slot.subscribe();
        let uploader = FakeUploader::default();

        let url = f.slot.upload(&uploader, Some("profile-pic")).await.unwrap();

        assert_eq!(url, "https://cdn.example.com/sunset.beach.webp");
        assert_eq!(f.slot.state(), SlotState::Uploaded { url: url.clone() });
        assert_eq!(f.slot.remote_url(), Some(url.as_str()));
        assert!(f.slot.processed_artifact().is_some());
        assert_eq!(
            *uploader.contexts.lock().unwrap(),
            vec![Some("profile-pic".to_string())]
        );
        assert_eq!(
            states(&drain(&rx)),
            vec![SlotState::Uploading, SlotState::Uploaded { url }]
        );
    }

    #[tokio::test]
    async fn upload_failure_returns_to_ready_for_retry() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        let before = f.slot.processed_artifact().unwrap().clone();
        let uploader = FakeUploader::default();
        uploader.fail.store(true, Ordering::SeqCst);

        let result = f.slot.upload(&uploader, None).await;
        assert!(matches!(result, Err(SlotError::Upload(_))));
        assert_eq!(f.slot.state(), SlotState::Ready);
        assert_eq!(f.slot.processed_artifact(), Some(&before));

        uploader.fail.store(false, Ordering::SeqCst);
        f.slot.upload(&uploader, None).await.unwrap();
        assert!(matches!(f.slot.state(), SlotState::Uploaded { .. }));
        assert_eq!(f.slot.processed_artifact(), Some(&before));
    }

    #[tokio::test]
    async fn upload_without_artifact_is_not_ready() {
        let mut f = fixture(UploadSlotConfig::default());
        let uploader = FakeUploader::default();
        assert!(matches!(
            f.slot.upload(&uploader, None).await,
            Err(SlotError::NotReady { .. })
        ));

        f.slot.handle_file_selected(&f.photo).await.unwrap();
        assert!(matches!(
            f.slot.upload(&uploader, None).await,
            Err(SlotError::NotReady {
                state: SlotState::CropPending,
                ..
            })
        ));
        assert!(uploader.contexts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_confirm_after_upload_is_ready_again() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        f.slot.upload(&FakeUploader::default(), None).await.unwrap();

        make_ready(&mut f).await;
        assert_eq!(f.slot.state(), SlotState::Ready);
        assert_eq!(f.slot.remote_url(), None);
    }

    #[tokio::test]
    async fn dispose_and_drop_release_preview() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        let previews = f.previews.clone();
        let tmp = TempDir::new().unwrap();
        let photo = write_gradient_jpeg(tmp.path(), "b.jpg", 64, 64);

        let Fixture { slot, .. } = f;
        slot.dispose();
        assert_eq!(previews.live_count(), 0);
        assert_eq!(previews.revoked_count(), 1);

        let mut other = UploadSlot::new(
            "cover",
            UploadSlotConfig::default(),
            Arc::new(ScriptedTransformer::new()),
            previews.clone(),
        );
        other.handle_file_selected(&photo).await.unwrap();
        other.confirm_pending_crop().await.unwrap();
        assert_eq!(previews.live_count(), 1);
        drop(other);
        assert_eq!(previews.live_count(), 0);
        assert_eq!(previews.revoked_count(), 2);
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let mut f = fixture(UploadSlotConfig::default());
        let rx = f.slot.subscribe();
        drop(rx);
        let kept = f.slot.subscribe();

        f.slot.handle_file_selected(&f.photo).await.unwrap();
        assert_eq!(f.slot.subscribers.len(), 1);
        assert_eq!(states(&drain(&kept)), vec![SlotState::CropPending]);
    }

    #[tokio::test]
    async fn reselect_while_pending_replaces_source() {
        let mut f = fixture(UploadSlotConfig::profile_pic());
        let tmp = TempDir::new().unwrap();
        let second = write_gradient_jpeg(tmp.path(), "harbor.jpg", 100, 80);
        let second_bytes = std::fs::read(&second).unwrap();
        let rx = f.slot.subscribe();

        f.slot.handle_file_selected(&f.photo).await.unwrap();
        f.slot.handle_file_selected(&second).await.unwrap();

        assert_eq!(f.slot.state(), SlotState::CropPending);
        assert_eq!(f.slot.crop_source().unwrap().bytes(), second_bytes.as_slice());
        assert_eq!(
            f.slot.crop_session().unwrap().confirm(),
            Some(PixelCropRegion::new(10, 0, 80, 80))
        );

        f.slot.confirm_pending_crop().await.unwrap();

        assert_eq!(f.slot.state(), SlotState::Ready);
        assert!(f.slot.crop_source().is_none());
        assert_eq!(f.slot.processed_artifact().unwrap().filename(), "harbor.webp");
        assert_eq!(
            f.transformer.get_calls(),
            vec!["crop 80x80+10+0".to_string(), "compress harbor.webp".to_string()]
        );
        assert_eq!(
            states(&drain(&rx)),
            vec![
                SlotState::CropPending,
                SlotState::CropPending,
                SlotState::Processing,
                SlotState::Ready
            ]
        );
        assert_eq!(f.previews.live_count(), 1);
    }

    #[tokio::test]
    async fn abandoned_confirm_falls_back_to_settled_state() {
        let f = fixture(UploadSlotConfig::default());
        let mut slot = UploadSlot::new(
            "avatar",
            UploadSlotConfig::default(),
            Arc::new(SlowTransformer),
            f.previews.clone(),
        );
        let rx = slot.subscribe();
        slot.handle_file_selected(&f.photo).await.unwrap();

        tokio::select! {
            biased;
            _ = slot.confirm_pending_crop() => panic!("compression finished too early"),
            _ = std::future::ready(()) => {}
        }

        assert_eq!(slot.state(), SlotState::Idle);
        assert!(!slot.is_processing());
        assert!(slot.crop_source().is_none());
        assert_eq!(f.previews.live_count(), 0);
        assert_eq!(
            states(&drain(&rx)),
            vec![
                SlotState::CropPending,
                SlotState::Processing,
                SlotState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn abandoned_upload_returns_to_ready() {
        let mut f = fixture(UploadSlotConfig::default());
        make_ready(&mut f).await;
        let before = f.slot.processed_artifact().unwrap().clone();
        let rx = f.slot.subscribe();

        tokio::select! {
            biased;
            _ = f.slot.upload(&StalledUploader, None) => panic!("stalled upload completed"),
            _ = std::future::ready(()) => {}
        }

        assert_eq!(f.slot.state(), SlotState::Ready);
        assert_eq!(f.slot.processed_artifact(), Some(&before));
        assert_eq!(
            states(&drain(&rx)),
            vec![SlotState::Uploading, SlotState::Ready]
        );

        f.slot.upload(&FakeUploader::default(), None).await.unwrap();
        assert!(matches!(f.slot.state(), SlotState::Uploaded { .. }));
    }

    #[tokio::test]
    async fn rotated_phone_photo_is_cropped_upright() {
        let mut f = fixture(UploadSlotConfig::profile_pic());
        let tmp = TempDir::new().unwrap();
        let photo = tmp.path().join("portrait.jpg");
        std::fs::write(&photo, exif_oriented_jpeg(200, 100, 6)).unwrap();

        f.slot.handle_file_selected(&photo).await.unwrap();
        let surface = f.slot.crop_session().unwrap().surface().unwrap();
        assert_eq!(surface.natural(), Dimensions::new(100, 200));
        assert_eq!(
            f.slot.crop_session().unwrap().confirm(),
            Some(PixelCropRegion::new(0, 50, 100, 100))
        );

        f.slot.confirm_pending_crop().await.unwrap();
        let artifact = f.slot.processed_artifact().unwrap();
        assert_eq!(decoded_dimensions(artifact.bytes()), Dimensions::new(100, 100));
    }
}
