//! Listening and offline speech-to-text.
//!
//! Audio from the default microphone is read as 16 kHz mono S16_LE in 30 ms
//! frames and passed through a [`SpeechGate`], which calibrates against room
//! noise, waits for speech within the listen timeout, and stops at the phrase
//! limit or after trailing silence. The utterance is written to a temporary
//! WAV and handed to the configured recognizer command.

use crate::capture::MicStream;
use crate::config::VoiceConfig;
use crate::vad::{GateStep, SpeechGate, VoiceDetector, WebRtcDetector, FRAME_SAMPLES, SAMPLE_RATE};
use std::io::{ErrorKind, Read};
use std::process::Command;
use thiserror::Error;

const WAV_PLACEHOLDER: &str = "{wav}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenError {
    #[error("no speech detected within the listen timeout")]
    NoSpeech,
    #[error("speech could not be understood")]
    Unintelligible,
    #[error("speech recognizer unavailable: {0}")]
    ServiceUnreachable(String),
    #[error("audio capture failed: {0}")]
    Capture(String),
}

/// Captures one utterance and returns it as lower-cased text.
pub trait Listener {
    fn listen(&mut self) -> Result<String, ListenError>;
}

/// Read frames until the gate completes. Only audio from onset on is kept.
fn read_utterance<R: Read, D: VoiceDetector>(
    reader: &mut R,
    gate: &mut SpeechGate<D>,
) -> Result<Vec<i16>, ListenError> {
    let mut bytes = vec![0u8; FRAME_SAMPLES * 2];
    let mut utterance = Vec::new();

    loop {
        if let Err(e) = reader.read_exact(&mut bytes) {
            if e.kind() == ErrorKind::UnexpectedEof && !utterance.is_empty() {
                return Ok(utterance);
            }
            return Err(ListenError::Capture(format!("audio stream ended: {e}")));
        }

        let chunk: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        match gate.push(&chunk) {
            GateStep::Calibrating | GateStep::Waiting => {}
            GateStep::Capturing => utterance.extend_from_slice(&chunk),
            GateStep::Complete => {
                utterance.extend_from_slice(&chunk);
                return Ok(utterance);
            }
            GateStep::TimedOut => return Err(ListenError::NoSpeech),
        }
    }
}

/// Drop recognizer annotations such as `[BLANK_AUDIO]` or `(music)`.
fn clean_transcript(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Microphone listener backed by cpal, WebRTC VAD and an external recognizer.
pub struct MicListener {
    config: VoiceConfig,
}

impl MicListener {
    pub fn new(config: VoiceConfig) -> Self {
        Self { config }
    }

    fn capture(&self) -> Result<Vec<i16>, ListenError> {
        let mut mic = MicStream::open_default()?;
        let mut gate = SpeechGate::new(&self.config, WebRtcDetector::new(self.config.vad_mode));
        read_utterance(&mut mic, &mut gate)
    }

    fn transcribe(&self, samples: &[i16]) -> Result<String, ListenError> {
        let wav = tempfile::Builder::new()
            .prefix("greeter-utterance-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| ListenError::Capture(format!("temp file: {e}")))?;
        write_wav(wav.path(), samples).map_err(|e| ListenError::Capture(format!("wav write: {e}")))?;

        let path = wav.path().to_string_lossy().into_owned();
        let argv = recognizer_argv(&self.config.stt_command, &path);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ListenError::ServiceUnreachable("no recognizer command configured".into()))?;

        let output = Command::new(program).args(args).output().map_err(|e| {
            ListenError::ServiceUnreachable(format!("{program}: {e}"))
        })?;
        if !output.status.success() {
            return Err(ListenError::ServiceUnreachable(format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = clean_transcript(&String::from_utf8_lossy(&output.stdout));
        if text.is_empty() {
            return Err(ListenError::Unintelligible);
        }
        Ok(text)
    }
}

impl Listener for MicListener {
    fn listen(&mut self) -> Result<String, ListenError> {
        tracing::debug!("listening");
        let samples = self.capture()?;
        tracing::debug!(
            seconds = samples.len() as f32 / SAMPLE_RATE as f32,
            "utterance captured; recognizing"
        );
        let text = self.transcribe(&samples)?;
        tracing::info!(you = %text, "recognized");
        Ok(text)
    }
}

/// Substitute the capture path for `{wav}`, or append it if absent.
fn recognizer_argv(template: &[String], wav_path: &str) -> Vec<String> {
    let mut argv: Vec<String> = template.iter().map(|a| a.replace(WAV_PLACEHOLDER, wav_path)).collect();
    if !template.iter().any(|a| a.contains(WAV_PLACEHOLDER)) {
        argv.push(wav_path.to_string());
    }
    argv
}

fn write_wav(path: &std::path::Path, samples: &[i16]) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    const LOUD: i16 = 8_000;

    /// Leaves the speech decision to the energy threshold.
    struct AnyVoice;

    impl VoiceDetector for AnyVoice {
        fn is_voice(&mut self, _frame: &[i16]) -> bool {
            true
        }
    }

    fn config() -> VoiceConfig {
        VoiceConfig {
            listen_timeout: Duration::from_millis(300),
            phrase_limit: Duration::from_millis(600),
            trailing_silence: Duration::from_millis(150),
            ambient_duration: Duration::ZERO,
            ..VoiceConfig::default()
        }
    }

    fn energy_gate(config: &VoiceConfig) -> SpeechGate<AnyVoice> {
        SpeechGate::new(config, AnyVoice)
    }

    fn stream(chunks: &[(i16, usize)]) -> Cursor<Vec<u8>> {
        let mut bytes = Vec::new();
        for &(level, count) in chunks {
            for _ in 0..count * FRAME_SAMPLES {
                bytes.extend_from_slice(&level.to_le_bytes());
            }
        }
        Cursor::new(bytes)
    }

    #[test]
    fn test_silence_times_out() {
        let mut gate = energy_gate(&config());
        // 300 ms = 10 chunks of silence, give it more than enough.
        let err = read_utterance(&mut stream(&[(0, 20)]), &mut gate).unwrap_err();
        assert_eq!(err, ListenError::NoSpeech);
    }

    #[test]
    fn test_trailing_silence_ends_utterance() {
        let mut gate = energy_gate(&config());
        // 2 quiet, 4 loud, then silence; 150 ms of silence = 5 chunks.
        let samples = read_utterance(&mut stream(&[(0, 2), (LOUD, 4), (0, 30)]), &mut gate).unwrap();
        assert_eq!(samples.len(), (4 + 5) * FRAME_SAMPLES);
        assert!(samples[..4 * FRAME_SAMPLES].iter().all(|&s| s == LOUD));
    }

    #[test]
    fn test_phrase_limit_caps_utterance() {
        let mut gate = energy_gate(&config());
        // 600 ms = 20 chunks.
        let samples = read_utterance(&mut stream(&[(LOUD, 100)]), &mut gate).unwrap();
        assert_eq!(samples.len(), 20 * FRAME_SAMPLES);
    }

    #[test]
    fn test_stream_end_mid_utterance_keeps_audio() {
        let mut gate = energy_gate(&config());
        let samples = read_utterance(&mut stream(&[(LOUD, 3)]), &mut gate).unwrap();
        assert_eq!(samples.len(), 3 * FRAME_SAMPLES);
    }

    #[test]
    fn test_ambient_noise_is_not_mistaken_for_speech() {
        // Half a second of room noise calibrates; the same noise then waits
        // and only the louder voice starts the utterance.
        let cfg = VoiceConfig {
            ambient_duration: Duration::from_millis(480),
            ..config()
        };
        let mut gate = energy_gate(&cfg);
        let noise = 2_000;
        let samples =
            read_utterance(&mut stream(&[(noise, 16), (noise, 4), (LOUD, 3), (0, 30)]), &mut gate).unwrap();

        assert!(gate.threshold() > cfg.energy_threshold);
        assert_eq!(samples.len(), (3 + 5) * FRAME_SAMPLES);
        assert!(samples[..3 * FRAME_SAMPLES].iter().all(|&s| s == LOUD));
    }

    #[test]
    fn test_uncalibrated_noise_would_open_the_gate() {
        let mut gate = energy_gate(&config());
        let samples = read_utterance(&mut stream(&[(2_000, 4), (0, 30)]), &mut gate).unwrap();
        assert!(samples.starts_with(&[2_000; FRAME_SAMPLES]));
    }

    #[test]
    fn test_stream_end_before_speech_is_capture_error() {
        let mut gate = energy_gate(&config());
        let err = read_utterance(&mut stream(&[(0, 2)]), &mut gate).unwrap_err();
        assert!(matches!(err, ListenError::Capture(_)));
    }

    #[test]
    fn test_clean_transcript() {
        assert_eq!(clean_transcript(" Hello  World\n"), "hello world");
        assert_eq!(clean_transcript("[BLANK_AUDIO]"), "");
        assert_eq!(clean_transcript("(music) Courses please"), "courses please");
    }

    #[test]
    fn test_recognizer_argv_placeholder() {
        let template: Vec<String> = ["stt", "-f", "{wav}"].iter().map(|s| s.to_string()).collect();
        assert_eq!(recognizer_argv(&template, "/tmp/a.wav"), vec!["stt", "-f", "/tmp/a.wav"]);
    }

    #[test]
    fn test_recognizer_argv_appends_when_no_placeholder() {
        let template = vec!["stt".to_string()];
        assert_eq!(recognizer_argv(&template, "/tmp/a.wav"), vec!["stt", "/tmp/a.wav"]);
    }

    #[test]
    fn test_transcribe_with_echo_command() {
        let listener = MicListener::new(VoiceConfig {
            stt_command: vec!["echo".into(), "Tell me about COURSES".into()],
            ..VoiceConfig::default()
        });
        // echo also prints the appended wav path; only check the prefix.
        let text = listener.transcribe(&[0i16; 160]).unwrap();
        assert!(text.starts_with("tell me about courses"));
    }

    #[test]
    fn test_transcribe_empty_output_is_unintelligible() {
        let listener = MicListener::new(VoiceConfig {
            stt_command: vec!["true".into()],
            ..VoiceConfig::default()
        });
        assert_eq!(listener.transcribe(&[0i16; 160]).unwrap_err(), ListenError::Unintelligible);
    }

    #[test]
    fn test_transcribe_missing_recognizer_is_unreachable() {
        let listener = MicListener::new(VoiceConfig {
            stt_command: vec!["greeter-no-such-recognizer".into()],
            ..VoiceConfig::default()
        });
        assert!(matches!(
            listener.transcribe(&[0i16; 160]).unwrap_err(),
            ListenError::ServiceUnreachable(_)
        ));
    }

    #[test]
    fn test_transcribe_failing_recognizer_is_unreachable() {
        let listener = MicListener::new(VoiceConfig {
            stt_command: vec!["false".into()],
            ..VoiceConfig::default()
        });
        assert!(matches!(
            listener.transcribe(&[0i16; 160]).unwrap_err(),
            ListenError::ServiceUnreachable(_)
        ));
    }
}
