//! SCRFD face detector via ONNX Runtime.
//!
//! Letterboxes the grayscale frame into a square input, decodes the
//! anchor-free score/box heads of the three strides, and merges overlapping
//! boxes with NMS.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: usize = 640;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — place the SCRFD model in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("frame buffer is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Where the original frame sits inside the square model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(width: usize, height: usize, target: usize) -> Self {
        let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
        let new_w = (width as f32 * scale).round();
        let new_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((target as f32 - new_w) / 2.0).floor(),
            pad_y: ((target as f32 - new_h) / 2.0).floor(),
        }
    }

    /// Map a point from model-input space back to frame space.
    fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

pub struct FaceDetector {
    session: Session,
    /// `(score_output, bbox_output)` for each of [`STRIDES`].
    heads: [(usize, usize); 3],
}

impl FaceDetector {
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model needs score and bbox outputs for 3 strides, got {} outputs",
                names.len()
            )));
        }

        let heads = locate_heads(&names);
        tracing::info!(path = model_path, outputs = ?names, ?heads, "loaded SCRFD model");

        Ok(Self { session, heads })
    }

    /// Detect faces in a grayscale frame, highest confidence first.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError> {
        let expected = (width as usize) * (height as usize);
        if frame.len() < expected || expected == 0 {
            return Err(DetectorError::FrameSize { expected, actual: frame.len() });
        }

        let letterbox = Letterbox::fit(width as usize, height as usize, INPUT_SIZE);
        let input = letterbox_tensor(&frame[..expected], width, height, &letterbox);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (&stride, &(score_idx, bbox_idx)) in STRIDES.iter().zip(self.heads.iter()) {
            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, boxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("boxes stride {stride}: {e}")))?;

            candidates.extend(decode_stride(scores, boxes, stride, &letterbox));
        }

        Ok(nms(candidates, NMS_IOU_THRESHOLD))
    }
}

/// Resize `frame` into the letterboxed NCHW input, padding with the mean.
fn letterbox_tensor(frame: &[u8], width: u32, height: u32, letterbox: &Letterbox) -> Array4<f32> {
    let new_w = ((width as f32 * letterbox.scale).round() as u32).max(1);
    let new_h = ((height as f32 * letterbox.scale).round() as u32).max(1);

    let resized = GrayImage::from_raw(width, height, frame.to_vec())
        .map(|img| imageops::resize(&img, new_w, new_h, FilterType::Triangle));

    // Pad value normalizes to 0.0.
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    let Some(resized) = resized else {
        return tensor;
    };

    let off_x = letterbox.pad_x as usize;
    let off_y = letterbox.pad_y as usize;
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (tx, ty) = (x as usize + off_x, y as usize + off_y);
        if tx >= INPUT_SIZE || ty >= INPUT_SIZE {
            continue;
        }
        let v = (pixel.0[0] as f32 - INPUT_MEAN) / INPUT_STD;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = v;
        }
    }

    tensor
}

/// Find the score/bbox outputs for each stride.
///
/// Exports that name their tensors `score_8`, `bbox_8`, ... are mapped by name;
/// anything else uses the standard order `[scores 8/16/32, bboxes 8/16/32, ...]`.
fn locate_heads(names: &[String]) -> [(usize, usize); 3] {
    let position = |prefix: &str, stride: usize| {
        let wanted = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == wanted)
    };

    let mut heads = [(0usize, 3usize), (1, 4), (2, 5)];
    for (slot, &stride) in STRIDES.iter().enumerate() {
        match (position("score", stride), position("bbox", stride)) {
            (Some(s), Some(b)) => heads[slot] = (s, b),
            _ => return [(0, 3), (1, 4), (2, 5)],
        }
    }
    heads
}

/// Decode one stride's anchors above [`SCORE_THRESHOLD`] into frame-space boxes.
fn decode_stride(scores: &[f32], boxes: &[f32], stride: usize, letterbox: &Letterbox) -> Vec<BoundingBox> {
    let cells_per_row = INPUT_SIZE / stride;
    let anchors = (INPUT_SIZE / stride) * cells_per_row * ANCHORS_PER_CELL;
    let s = stride as f32;

    (0..anchors)
        .filter_map(|idx| {
            let score = *scores.get(idx)?;
            if score <= SCORE_THRESHOLD {
                return None;
            }
            let d = boxes.get(idx * 4..idx * 4 + 4)?;

            let cell = idx / ANCHORS_PER_CELL;
            let cx = (cell % cells_per_row) as f32 * s;
            let cy = (cell / cells_per_row) as f32 * s;

            let (x1, y1) = letterbox.unmap(cx - d[0] * s, cy - d[1] * s);
            let (x2, y2) = letterbox.unmap(cx + d[2] * s, cy + d[3] * s);

            Some(BoundingBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
                confidence: score,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression; output is sorted by confidence.
fn nms(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}
