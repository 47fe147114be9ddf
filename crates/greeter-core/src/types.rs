use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Axis-aligned bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Integer region `(x, y, w, h)` clamped to a `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` when the box lies entirely outside the frame.
    pub fn clamped_region(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0.0).floor() as u32;
        let y0 = self.y.max(0.0).floor() as u32;
        let x1 = ((self.x + self.width).ceil().max(0.0) as u32).min(frame_width);
        let y1 = ((self.y + self.height).ceil().max(0.0) as u32).min(frame_height);

        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Face embedding vector produced by the recognizer for one face in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// A zero-length or zero-norm vector has similarity 0.0 with everything.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Cosine distance `1 - similarity`, in [0, 2]. Lower = more similar.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }
}

/// One face found by a [`FaceAnalyzer`]: its identity embedding and where it is.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub embedding: Embedding,
    pub region: BoundingBox,
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] crate::detector::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] crate::recognizer::RecognizerError),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Black-box face model: grayscale frame in, zero or more faces out.
///
/// "No face" is an empty `Vec`, never an error.
pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &[u8], width: u32, height: u32)
        -> Result<Vec<DetectedFace>, AnalyzerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
        assert!(a.cosine_distance(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!((a.cosine_distance(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.cosine_distance(&b) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_scale_invariant() {
        let a = Embedding::new(vec![1.0, 2.0, 3.0]);
        let b = Embedding::new(vec![10.0, 20.0, 30.0]);
        assert!(a.cosine_distance(&b).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_maximally_unrelated() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
        assert_eq!(a.cosine_distance(&b), 1.0);
    }

    #[test]
    fn test_clamped_region_inside() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 30.0, height: 40.0, confidence: 0.9 };
        assert_eq!(b.clamped_region(320, 240), Some((10, 20, 30, 40)));
    }

    #[test]
    fn test_clamped_region_negative_origin() {
        let b = BoundingBox { x: -5.0, y: -5.0, width: 20.0, height: 20.0, confidence: 0.9 };
        assert_eq!(b.clamped_region(320, 240), Some((0, 0, 15, 15)));
    }

    #[test]
    fn test_clamped_region_past_edge() {
        let b = BoundingBox { x: 300.0, y: 230.0, width: 50.0, height: 50.0, confidence: 0.9 };
        assert_eq!(b.clamped_region(320, 240), Some((300, 230, 20, 10)));
    }

    #[test]
    fn test_clamped_region_outside() {
        let b = BoundingBox { x: 400.0, y: 10.0, width: 10.0, height: 10.0, confidence: 0.9 };
        assert_eq!(b.clamped_region(320, 240), None);
    }
}
