use crate::vad::VadAggressiveness;
use std::time::Duration;

const DEFAULT_STT_COMMAND: &str = "whisper-cli -nt -np -m /usr/share/whisper/ggml-base.en.bin -f {wav}";

/// Voice settings, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// pico2wave language tag (e.g. "en-US", "en-GB").
    pub language: String,
    /// How long to wait for speech to start.
    pub listen_timeout: Duration,
    /// Longest utterance captured once speech has started.
    pub phrase_limit: Duration,
    /// Lowest RMS level (0.0–1.0) a 30 ms chunk must reach to count as
    /// speech. Ambient calibration may raise the bar for a given listen.
    pub energy_threshold: f32,
    /// Room noise sampled at the start of every listen to set the onset level.
    pub ambient_duration: Duration,
    /// WebRTC VAD mode; higher rejects more background noise.
    pub vad_mode: VadAggressiveness,
    /// Silence after speech that ends the utterance early.
    pub trailing_silence: Duration,
    /// Speech-to-text argv; `{wav}` is replaced with the capture file path.
    pub stt_command: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            listen_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(5),
            energy_threshold: 0.02,
            ambient_duration: Duration::from_millis(500),
            vad_mode: VadAggressiveness::default(),
            trailing_silence: Duration::from_millis(800),
            stt_command: split_command(DEFAULT_STT_COMMAND),
        }
    }
}

impl VoiceConfig {
    /// Load from `GREETER_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            language: std::env::var("GREETER_VOICE_LANG").unwrap_or(defaults.language),
            listen_timeout: Duration::from_secs(env_u64("GREETER_LISTEN_TIMEOUT_SECS", 5)),
            phrase_limit: Duration::from_secs(env_u64("GREETER_PHRASE_LIMIT_SECS", 5)),
            energy_threshold: env_f32("GREETER_ENERGY_THRESHOLD", defaults.energy_threshold),
            ambient_duration: Duration::from_millis(env_u64("GREETER_AMBIENT_MS", 500)),
            vad_mode: std::env::var("GREETER_VAD_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(VadAggressiveness::from_level)
                .unwrap_or(defaults.vad_mode),
            trailing_silence: Duration::from_millis(env_u64("GREETER_TRAILING_SILENCE_MS", 800)),
            stt_command: std::env::var("GREETER_STT_COMMAND")
                .ok()
                .map(|v| split_command(&v))
                .filter(|argv| !argv.is_empty())
                .unwrap_or(defaults.stt_command),
        }
    }
}

fn split_command(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

fn env_f32(key: &str, default: f32) -> f32 {
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
