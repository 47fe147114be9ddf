//! greeter-hw — Camera capture and on-disk face crops.
//!
//! Provides V4L2-based frame capture normalized to 8-bit grayscale, and the
//! directory store that keeps one snapshot per newly seen individual.

pub mod camera;
pub mod crops;
pub mod frame;

pub use camera::{Camera, CameraError, FrameStream, PixelFormat};
pub use crops::CropStore;
pub use frame::Frame;
