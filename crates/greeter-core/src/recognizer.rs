//! ArcFace-style face recognizer via ONNX Runtime.
//!
//! Crops a square around the detected box, resizes it to 112×112 and runs
//! the embedding model. Output embeddings are L2-normalized.

use crate::types::{BoundingBox, Embedding};
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const CROP_SIZE: u32 = 112;
const CROP_MEAN: f32 = 127.5;
const CROP_STD: f32 = 127.5;
/// Extra context kept around the detector box before cropping.
const CROP_MARGIN: f32 = 0.1;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0} — place the recognition model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face box lies outside the frame")]
    EmptyCrop,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    pub fn load(model_path: &str) -> Result<Self, RecognizerError> {
        if !Path::new(model_path).exists() {
            return Err(RecognizerError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded recognition model"
        );

        Ok(Self { session })
    }

    /// Extract an embedding for `face` from a grayscale frame.
    pub fn extract(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Embedding, RecognizerError> {
        let crop = square_crop(frame, width, height, face).ok_or(RecognizerError::EmptyCrop)?;
        let input = to_tensor(&crop);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.is_empty() {
            return Err(RecognizerError::InferenceFailed("empty embedding".into()));
        }

        Ok(Embedding::new(l2_normalize(raw)))
    }
}

/// Square, margin-padded crop around `face`, resized to `CROP_SIZE`.
fn square_crop(frame: &[u8], width: u32, height: u32, face: &BoundingBox) -> Option<GrayImage> {
    let side = face.width.max(face.height) * (1.0 + 2.0 * CROP_MARGIN);
    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;
    let square = BoundingBox {
        x: cx - side / 2.0,
        y: cy - side / 2.0,
        width: side,
        height: side,
        confidence: face.confidence,
    };

    let (x, y, w, h) = square.clamped_region(width, height)?;
    let pixels = (width as usize) * (height as usize);
    let image = GrayImage::from_raw(width, height, frame.get(..pixels)?.to_vec())?;
    let cropped = imageops::crop_imm(&image, x, y, w, h).to_image();
    Some(imageops::resize(&cropped, CROP_SIZE, CROP_SIZE, FilterType::Triangle))
}

/// Grayscale crop to a normalized NCHW tensor with the channel replicated.
fn to_tensor(crop: &GrayImage) -> Array4<f32> {
    let size = CROP_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in crop.enumerate_pixels() {
        let v = (pixel.0[0] as f32 - CROP_MEAN) / CROP_STD;
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = v;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_crop_has_model_size() {
        let frame = vec![90u8; 320 * 240];
        let face = BoundingBox { x: 100.0, y: 60.0, width: 40.0, height: 60.0, confidence: 0.9 };
        let crop = square_crop(&frame, 320, 240, &face).unwrap();
        assert_eq!(crop.dimensions(), (CROP_SIZE, CROP_SIZE));
        assert!(crop.pixels().all(|p| p.0[0] == 90));
    }

    #[test]
    fn test_square_crop_outside_frame() {
        let frame = vec![0u8; 100 * 100];
        let face = BoundingBox { x: 500.0, y: 500.0, width: 20.0, height: 20.0, confidence: 0.9 };
        assert!(square_crop(&frame, 100, 100, &face).is_none());
    }

    #[test]
    fn test_square_crop_short_buffer() {
        let frame = vec![0u8; 10];
        let face = BoundingBox { x: 0.0, y: 0.0, width: 20.0, height: 20.0, confidence: 0.9 };
        assert!(square_crop(&frame, 100, 100, &face).is_none());
    }

    #[test]
    fn test_to_tensor_shape_and_channels() {
        let crop = GrayImage::from_pixel(CROP_SIZE, CROP_SIZE, image::Luma([128u8]));
        let t = to_tensor(&crop);
        let size = CROP_SIZE as usize;
        assert_eq!(t.shape(), &[1, 3, size, size]);
        let expected = (128.0 - CROP_MEAN) / CROP_STD;
        assert!((t[[0, 0, 5, 7]] - expected).abs() < 1e-6);
        assert_eq!(t[[0, 0, 5, 7]], t[[0, 1, 5, 7]]);
        assert_eq!(t[[0, 1, 5, 7]], t[[0, 2, 5, 7]]);
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
