//! Frame type and pixel conversions.

use image::GrayImage;

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    /// Copy out the `w` × `h` region at `(x, y)`.
    ///
    /// The region is clamped to the frame; `None` if nothing remains.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<GrayImage> {
        let x1 = x.saturating_add(w).min(self.width);
        let y1 = y.saturating_add(h).min(self.height);
        if x >= x1 || y >= y1 {
            return None;
        }

        let row_len = self.width as usize;
        let mut out = Vec::with_capacity(((x1 - x) * (y1 - y)) as usize);
        for row in y..y1 {
            let start = row as usize * row_len + x as usize;
            let end = row as usize * row_len + x1 as usize;
            out.extend_from_slice(self.data.get(start..end)?);
        }
        GrayImage::from_raw(x1 - x, y1 - y, out)
    }
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Decode one MJPG buffer to grayscale, checking it matches the negotiated size.
pub fn mjpeg_to_grayscale(jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)?.to_luma8();
    if decoded.dimensions() != (width, height) {
        return Err(FrameError::SizeMismatch {
            expected: (width, height),
            actual: decoded.dimensions(),
        });
    }
    Ok(decoded.into_raw())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("decoded frame is {actual:?}, expected {expected:?}")]
    SizeMismatch { expected: (u32, u32), actual: (u32, u32) },
    #[error("image decode: {0}")]
    Decode(#[from] image::ImageError),
}
