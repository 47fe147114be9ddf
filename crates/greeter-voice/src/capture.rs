//! Microphone capture with cpal.
//!
//! The input callback mixes to mono, decimates to 16 kHz and hands each
//! block to a bounded queue. [`MicStream`] drains that queue as a byte stream
//! of S16_LE samples, so the utterance reader works the same on live audio
//! and on in-memory buffers.

use crate::listen::ListenError;
use crate::vad::SAMPLE_RATE;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::io::{self, Read};
use std::time::Duration;

/// Callback blocks buffered between the audio thread and the reader.
const QUEUE_BLOCKS: usize = 64;
/// No audio for this long means the device has stalled.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// An open default input device. Capture stops when this is dropped.
pub struct MicStream {
    _stream: cpal::Stream,
    blocks: Receiver<Vec<i16>>,
    pending: Vec<u8>,
    offset: usize,
}

impl MicStream {
    /// Open the default input device and start capturing.
    #[allow(deprecated)] // cpal 0.17 deprecates name() but description() is not yet stable
    pub fn open_default() -> Result<Self, ListenError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| ListenError::Capture("no default input device available".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let config = input_config(&device)?;
        let source_rate = config.sample_rate();
        let channels = config.channels() as usize;
        if source_rate % SAMPLE_RATE != 0 {
            return Err(ListenError::Capture(format!(
                "input rate {source_rate} Hz is not a multiple of {SAMPLE_RATE} Hz"
            )));
        }
        tracing::debug!(device = %device_name, rate = source_rate, channels, "opening microphone");

        let (tx, rx) = bounded::<Vec<i16>>(QUEUE_BLOCKS);
        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if tx.try_send(downsample_and_convert(data, source_rate, channels)).is_err() {
                        tracing::warn!(samples = data.len(), "microphone queue full; dropping audio");
                    }
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| ListenError::Capture(format!("{device_name}: {e}")))?;
        stream
            .play()
            .map_err(|e| ListenError::Capture(format!("{device_name}: {e}")))?;

        Ok(Self {
            _stream: stream,
            blocks: rx,
            pending: Vec::new(),
            offset: 0,
        })
    }
}

impl Read for MicStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.pending.len() {
            let block = match self.blocks.recv_timeout(STALL_TIMEOUT) {
                Ok(block) => block,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "microphone stopped delivering audio",
                    ))
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            };
            self.pending.clear();
            self.pending.extend(block.iter().flat_map(|s| s.to_le_bytes()));
            self.offset = 0;
        }

        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Prefer an f32 configuration that runs natively at 16 kHz, fewest channels
/// first; otherwise fall back to the device default.
fn input_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, ListenError> {
    let native = device
        .supported_input_configs()
        .map_err(|e| ListenError::Capture(format!("cannot query input formats: {e}")))?
        .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
        .filter(|range| range.min_sample_rate() <= SAMPLE_RATE && range.max_sample_rate() >= SAMPLE_RATE)
        .min_by_key(|range| range.channels());

    match native {
        Some(range) => Ok(range.with_sample_rate(SAMPLE_RATE)),
        None => device
            .default_input_config()
            .map_err(|e| ListenError::Capture(format!("no usable input format: {e}"))),
    }
}

/// Mix interleaved frames to mono, decimate to 16 kHz and convert to i16.
fn downsample_and_convert(samples: &[f32], source_rate: u32, channels: usize) -> Vec<i16> {
    let ratio = (source_rate / SAMPLE_RATE) as usize;
    samples
        .chunks(channels.max(1))
        .step_by(ratio.max(1))
        .map(|frame| {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            (mono * 32767.0).clamp(-32768.0, 32767.0) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downsample_stereo_48k_to_mono_16k() {
        // Three stereo frames at 48 kHz become one mono sample.
        let stereo = [0.5f32, -0.5, 0.3, -0.3, 0.1, -0.1];
        assert_eq!(downsample_and_convert(&stereo, 48_000, 2), vec![0]);
    }

    #[test]
    fn test_downsample_passthrough_at_16k() {
        let mono = [0.5f32, 0.25, 0.0, -0.25, -1.0];
        let out = downsample_and_convert(&mono, 16_000, 1);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], (0.5 * 32767.0) as i16);
        assert_eq!(out[4], -32767);
    }

    #[test]
    fn test_downsample_clamps_overdriven_input() {
        assert_eq!(downsample_and_convert(&[2.0, -2.0], 16_000, 1), vec![32767, -32768]);
    }

    #[test]
    fn test_open_default_without_device_fails_cleanly() {
        // Only meaningful on machines without an input device (CI).
        if cpal::default_host().default_input_device().is_some() {
            return;
        }
        assert!(matches!(MicStream::open_default(), Err(ListenError::Capture(_))));
    }
}
