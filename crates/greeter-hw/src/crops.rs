//! One JPEG snapshot per newly seen individual.

use image::GrayImage;
use std::path::{Path, PathBuf};

/// Directory of `face_<n>.jpg` files, `n` being the unique-individual count.
#[derive(Debug, Clone)]
pub struct CropStore {
    dir: PathBuf,
}

impl CropStore {
    /// Create the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("face_{index}.jpg"))
    }

    /// Write `crop` as `face_<index>.jpg`, replacing any earlier file.
    pub fn save(&self, index: u64, crop: &GrayImage) -> Result<PathBuf, image::ImageError> {
        let path = self.path_for(index);
        crop.save_with_format(&path, image::ImageFormat::Jpeg)?;
        Ok(path)
    }
}
