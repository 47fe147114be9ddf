//! greeter-core — Face identity primitives for the greeter kiosk.
//!
//! Holds the embedding/box types, the append-only deduplication registry
//! that decides whether a face is a new individual, the shutdown latch shared
//! by every long-running activity, and an ONNX-backed face analyzer.

pub mod analyzer;
pub mod detector;
pub mod recognizer;
pub mod registry;
pub mod shutdown;
pub mod types;

pub use analyzer::OnnxFaceAnalyzer;
pub use registry::{FaceRegistry, Registration, RegistryEntry};
pub use shutdown::ShutdownSignal;
pub use types::{AnalyzerError, BoundingBox, DetectedFace, Embedding, FaceAnalyzer};

/// Default directory for ONNX model files: `$XDG_DATA_HOME/greeter/models`.
pub fn default_model_dir() -> std::path::PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            std::path::PathBuf::from(home).join(".local/share")
        });
    data_dir.join("greeter").join("models")
}
