//! greeter-voice — Spoken conversation for the greeter kiosk.
//!
//! A [`ConversationSession`] drives a fixed dialogue over two seams:
//! [`Speaker`] (text to audio, blocking until playback ends) and
//! [`Listener`] (one bounded utterance to lower-cased text). The production
//! implementations shell out to pico2wave/aplay for speech, and capture the
//! microphone with cpal, gated by WebRTC VAD, before running an offline
//! speech-to-text command.

pub mod capture;
pub mod config;
pub mod intent;
pub mod listen;
pub mod script;
pub mod session;
pub mod synth;
pub mod vad;

pub use config::VoiceConfig;
pub use intent::{classify, Intent};
pub use listen::{ListenError, Listener, MicListener};
pub use session::{ConversationSession, SessionState, SessionStats};
pub use synth::{PicoSpeaker, SpeakError, Speaker};
pub use vad::{VadAggressiveness, VoiceDetector, WebRtcDetector};
