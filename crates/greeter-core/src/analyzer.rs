//! Detector + recognizer combined behind [`FaceAnalyzer`].

use crate::detector::FaceDetector;
use crate::recognizer::FaceRecognizer;
use crate::types::{AnalyzerError, DetectedFace, FaceAnalyzer};
use std::path::Path;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// Recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceAnalyzer {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, AnalyzerError> {
        let detector_path = model_dir.join(DETECTOR_MODEL_FILE);
        let recognizer_path = model_dir.join(RECOGNIZER_MODEL_FILE);

        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;

        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, frame: &[u8], width: u32, height: u32)
        -> Result<Vec<DetectedFace>, AnalyzerError>
    {
        let boxes = self.detector.detect(frame, width, height)?;
        let mut faces = Vec::with_capacity(boxes.len());

        for region in boxes {
            match self.recognizer.extract(frame, width, height, &region) {
                Ok(embedding) => faces.push(DetectedFace { embedding, region }),
                // Boxes lying entirely off the frame have nothing to embed.
                Err(crate::recognizer::RecognizerError::EmptyCrop) => {
                    tracing::debug!(?region, "skipping face outside frame");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(faces)
    }
}
