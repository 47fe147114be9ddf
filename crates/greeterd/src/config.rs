use greeter_voice::VoiceConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture width; lower is faster.
    pub frame_width: u32,
    /// Requested capture height.
    pub frame_height: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Where one crop per new individual is written.
    pub faces_dir: PathBuf,
    /// Cosine distance below which two faces are the same person.
    pub distance_threshold: f32,
    /// Time before a known face's last-seen timestamp may be refreshed.
    pub cooldown: Duration,
    /// Run the face model on every Nth frame.
    pub sample_every: u64,
    /// Upper bound on each dispatcher wait, so shutdown is noticed.
    pub dispatch_poll: Duration,
    pub voice: VoiceConfig,
}

impl Config {
    /// Load configuration from `GREETER_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("GREETER_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| greeter_core::default_model_dir());

        Self {
            camera_device: std::env::var("GREETER_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            frame_width: env_u32("GREETER_FRAME_WIDTH", 320),
            frame_height: env_u32("GREETER_FRAME_HEIGHT", 240),
            model_dir,
            faces_dir: std::env::var("GREETER_FACES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("unique_faces")),
            distance_threshold: env_f32("GREETER_DISTANCE_THRESHOLD", 0.65),
            cooldown: Duration::from_secs(env_u64("GREETER_COOLDOWN_SECS", 20)),
            sample_every: env_u64("GREETER_SAMPLE_EVERY", 10).max(1),
            dispatch_poll: Duration::from_millis(env_u64("GREETER_DISPATCH_POLL_MS", 1000).max(1)),
            voice: VoiceConfig::from_env(),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
