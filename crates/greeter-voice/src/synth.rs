//! Text-to-speech via `pico2wave` with playback through `aplay`.

use std::io::ErrorKind;
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeakError {
    #[error("'{tool}' not found — {hint}")]
    ToolMissing { tool: &'static str, hint: &'static str },
    #[error("'{tool}' failed: {stderr}")]
    CommandFailed { tool: &'static str, stderr: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Speaks text aloud. Returns once playback has finished.
pub trait Speaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeakError>;
}

const PICO: &str = "pico2wave";
const PICO_HINT: &str = "install libttspico-utils (sudo apt install libttspico-utils)";
const APLAY: &str = "aplay";
const APLAY_HINT: &str = "install alsa-utils (sudo apt install alsa-utils)";

/// Pico TTS speaker. Each line is synthesized into a temporary WAV that is
/// removed when `speak` returns, whatever the outcome.
pub struct PicoSpeaker {
    language: String,
}

impl PicoSpeaker {
    pub fn new(language: impl Into<String>) -> Self {
        Self { language: language.into() }
    }
}

impl Speaker for PicoSpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeakError> {
        let wav = tempfile::Builder::new()
            .prefix("greeter-speech-")
            .suffix(".wav")
            .tempfile()?;
        let path = wav.path().to_string_lossy().into_owned();

        run_tool(
            Command::new(PICO).args(["-w", path.as_str(), "-l", self.language.as_str(), text]),
            PICO,
            PICO_HINT,
        )?;
        run_tool(Command::new(APLAY).args(["-q", path.as_str()]), APLAY, APLAY_HINT)?;

        tracing::debug!(chars = text.len(), "playback finished");
        Ok(())
    }
}

/// Run `cmd` to completion, mapping spawn and exit failures.
fn run_tool(cmd: &mut Command, tool: &'static str, hint: &'static str) -> Result<(), SpeakError> {
    let output = cmd.output().map_err(|e| match e.kind() {
        ErrorKind::NotFound => SpeakError::ToolMissing { tool, hint },
        _ => SpeakError::Io(e),
    })?;

    if !output.status.success() {
        return Err(SpeakError::CommandFailed {
            tool,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
