//! Camera loop: sample frames, find faces, register them, signal new visitors.

use crate::config::Config;
use crate::context::CoordinationContext;
use greeter_core::{AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer};
use greeter_hw::{Camera, CameraError, CropStore, Frame, FrameStream};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("face model unavailable: {0}")]
    Model(#[from] AnalyzerError),
    #[error("crop directory: {0}")]
    CropDir(#[from] std::io::Error),
}

/// Something that yields camera frames. Any error other than
/// [`CameraError::BadFrame`] ends monitoring.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, CameraError>;
}

impl FrameSource for FrameStream<'_> {
    fn next_frame(&mut self) -> Result<Frame, CameraError> {
        FrameStream::next_frame(self)
    }
}

/// Counts "no face" → "face" transitions, independent of identity.
#[derive(Debug, Default)]
struct PresenceTracker {
    was_present: bool,
    appearances: u64,
}

impl PresenceTracker {
    /// Returns true on a rising edge.
    fn observe(&mut self, present: bool) -> bool {
        let rising = present && !self.was_present;
        if rising {
            self.appearances += 1;
        }
        self.was_present = present;
        rising
    }
}

pub struct FaceMonitor<S, A> {
    source: S,
    analyzer: A,
    ctx: Arc<CoordinationContext>,
    crops: CropStore,
    sample_every: u64,
    frame_index: u64,
    presence: PresenceTracker,
}

impl<S: FrameSource, A: FaceAnalyzer> FaceMonitor<S, A> {
    pub fn new(
        source: S,
        analyzer: A,
        ctx: Arc<CoordinationContext>,
        crops: CropStore,
        sample_every: u64,
    ) -> Self {
        Self {
            source,
            analyzer,
            ctx,
            crops,
            sample_every: sample_every.max(1),
            frame_index: 0,
            presence: PresenceTracker::default(),
        }
    }

    pub fn appearances(&self) -> u64 {
        self.presence.appearances
    }

    /// Run until shutdown (`Ok`) or until the stream fails (`Err`).
    /// Unreadable frames are skipped and do not count towards sampling.
    pub fn run(&mut self) -> Result<(), MonitorError> {
        tracing::info!(sample_every = self.sample_every, "face monitor started; looking for faces");
        while !self.ctx.shutdown().is_triggered() {
            let frame = match self.source.next_frame() {
                Ok(frame) => frame,
                Err(CameraError::BadFrame(reason)) => {
                    tracing::warn!(%reason, "skipping unreadable frame");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            self.frame_index += 1;
            if self.frame_index % self.sample_every == 0 {
                self.process(&frame);
            }
        }
        tracing::info!("face monitor stopped");
        Ok(())
    }

    /// Analyze one sampled frame. Returns the number of faces in it.
    ///
    /// Model errors are logged and the frame counts as faceless for display.
    fn process(&mut self, frame: &Frame) -> usize {
        let faces = match self.analyzer.analyze(&frame.data, frame.width, frame.height) {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = %e, frame = self.frame_index, "face analysis failed; skipping frame");
                return 0;
            }
        };

        if self.presence.observe(!faces.is_empty()) {
            tracing::info!(appearances = self.presence.appearances, "face appeared");
        }

        for face in &faces {
            let outcome = self.ctx.register_face(&face.embedding);
            if !outcome.registration.is_new {
                continue;
            }

            let crop = face
                .region
                .clamped_region(frame.width, frame.height)
                .and_then(|(x, y, w, h)| frame.crop(x, y, w, h));
            match crop {
                Some(crop) => match self.crops.save(outcome.unique_faces, &crop) {
                    Ok(path) => tracing::info!(
                        index = outcome.unique_faces,
                        path = %path.display(),
                        "saved new unique face"
                    ),
                    Err(e) => tracing::warn!(error = %e, index = outcome.unique_faces, "failed to save face crop"),
                },
                None => tracing::warn!(region = ?face.region, "new face region is outside the frame"),
            }

            if outcome.signalled {
                tracing::info!(index = outcome.unique_faces, "new unique face; signalling conversation");
            }
        }

        let status = self.ctx.snapshot();
        tracing::debug!(
            faces = faces.len(),
            appearances = self.presence.appearances,
            unique = status.unique_faces,
            chatbot = if status.conversation_active { "active" } else { "ready" },
            "status"
        );
        faces.len()
    }
}

/// Open the camera and models, then monitor until shutdown or camera failure.
pub fn run_monitor(config: &Config, ctx: Arc<CoordinationContext>) -> Result<(), MonitorError> {
    let crops = CropStore::open(&config.faces_dir)?;
    tracing::info!(dir = %crops.dir().display(), "saving new faces");
    let camera = Camera::open(&config.camera_device, config.frame_width, config.frame_height)?;
    tracing::info!(
        device = %camera.device_path,
        width = camera.width,
        height = camera.height,
        fourcc = ?camera.fourcc,
        "camera opened"
    );

    let analyzer = OnnxFaceAnalyzer::load(&config.model_dir)?;
    tracing::info!(dir = %config.model_dir.display(), "face models loaded");

    let stream = camera.stream()?;
    FaceMonitor::new(stream, analyzer, ctx, crops, config.sample_every).run()
}
