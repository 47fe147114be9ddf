//! Speech onset and offset detection over 30 ms frames.
//!
//! A frame counts as speech when WebRTC VAD classifies it as voice and its
//! RMS level clears the onset threshold. The threshold is recalibrated at the
//! start of every listen from the room's ambient level, never dropping below
//! the configured energy floor.

use crate::config::VoiceConfig;
use std::time::Duration;
use webrtc_vad::{SampleRate, Vad, VadMode};

pub(crate) const SAMPLE_RATE: u32 = 16_000;
/// 30 ms at 16 kHz.
pub(crate) const FRAME_SAMPLES: usize = 480;
/// Onset threshold as a multiple of the mean ambient level.
const AMBIENT_MARGIN: f32 = 1.5;

/// WebRTC VAD aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VadAggressiveness {
    Quality,
    LowBitrate,
    #[default]
    Aggressive,
    VeryAggressive,
}

impl VadAggressiveness {
    /// Map the numeric WebRTC modes 0–3; anything else is the default.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Quality,
            1 => Self::LowBitrate,
            3 => Self::VeryAggressive,
            _ => Self::Aggressive,
        }
    }
}

impl From<VadAggressiveness> for VadMode {
    fn from(mode: VadAggressiveness) -> Self {
        match mode {
            VadAggressiveness::Quality => VadMode::Quality,
            VadAggressiveness::LowBitrate => VadMode::LowBitrate,
            VadAggressiveness::Aggressive => VadMode::Aggressive,
            VadAggressiveness::VeryAggressive => VadMode::VeryAggressive,
        }
    }
}

/// Per-frame voice classification.
pub trait VoiceDetector {
    fn is_voice(&mut self, frame: &[i16]) -> bool;
}

/// WebRTC VAD at 16 kHz. `Vad` is `!Send`, so build one per listen.
pub struct WebRtcDetector {
    vad: Vad,
}

impl WebRtcDetector {
    pub fn new(mode: VadAggressiveness) -> Self {
        Self {
            vad: Vad::new_with_rate_and_mode(SampleRate::Rate16kHz, mode.into()),
        }
    }
}

impl VoiceDetector for WebRtcDetector {
    fn is_voice(&mut self, frame: &[i16]) -> bool {
        match self.vad.is_voice_segment(frame) {
            Ok(voice) => voice,
            Err(()) => {
                tracing::warn!(samples = frame.len(), "VAD rejected frame");
                false
            }
        }
    }
}

/// Progress of the gate after each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateStep {
    /// Still sampling room noise; the frame is not part of any utterance.
    Calibrating,
    Waiting,
    Capturing,
    Complete,
    TimedOut,
}

/// Onset/offset state for one listen, timed by sample count.
pub(crate) struct SpeechGate<D> {
    detector: D,
    floor: f32,
    threshold: f32,
    calibration: usize,
    ambient_samples: usize,
    ambient_level_sum: f32,
    ambient_frames: usize,
    onset_timeout: usize,
    phrase_limit: usize,
    trailing_silence: usize,
    elapsed: usize,
    onset_at: Option<usize>,
    silent_run: usize,
}

impl<D: VoiceDetector> SpeechGate<D> {
    pub(crate) fn new(config: &VoiceConfig, detector: D) -> Self {
        Self {
            detector,
            floor: config.energy_threshold,
            threshold: config.energy_threshold,
            calibration: samples_in(config.ambient_duration),
            ambient_samples: 0,
            ambient_level_sum: 0.0,
            ambient_frames: 0,
            onset_timeout: samples_in(config.listen_timeout),
            phrase_limit: samples_in(config.phrase_limit),
            trailing_silence: samples_in(config.trailing_silence),
            elapsed: 0,
            onset_at: None,
            silent_run: 0,
        }
    }

    /// Current onset threshold.
    #[cfg(test)]
    pub(crate) fn threshold(&self) -> f32 {
        self.threshold
    }

    pub(crate) fn push(&mut self, frame: &[i16]) -> GateStep {
        let level = rms(frame);

        if self.ambient_samples < self.calibration {
            self.ambient_samples += frame.len();
            self.ambient_level_sum += level;
            self.ambient_frames += 1;
            if self.ambient_samples >= self.calibration {
                let ambient = self.ambient_level_sum / self.ambient_frames as f32;
                self.threshold = self.floor.max(ambient * AMBIENT_MARGIN);
                tracing::debug!(ambient, threshold = self.threshold, "ambient noise calibrated");
            }
            return GateStep::Calibrating;
        }

        let start = self.elapsed;
        self.elapsed += frame.len();
        let speech = level >= self.threshold && self.detector.is_voice(frame);

        let Some(onset) = self.onset_at else {
            if speech {
                self.onset_at = Some(start);
                return GateStep::Capturing;
            }
            return if self.elapsed >= self.onset_timeout {
                GateStep::TimedOut
            } else {
                GateStep::Waiting
            };
        };

        self.silent_run = if speech { 0 } else { self.silent_run + frame.len() };
        if self.elapsed - onset >= self.phrase_limit || self.silent_run >= self.trailing_silence {
            GateStep::Complete
        } else {
            GateStep::Capturing
        }
    }
}

fn samples_in(d: Duration) -> usize {
    (d.as_secs_f64() * SAMPLE_RATE as f64) as usize
}

/// RMS of a frame, normalized to 0.0–1.0.
fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples
        .iter()
        .map(|&s| {
            let v = s as f32 / i16::MAX as f32;
            v * v
        })
        .sum();
    (sum_sq / samples.len() as f32).sqrt()
}
