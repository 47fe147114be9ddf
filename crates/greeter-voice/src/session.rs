//! Scripted conversation: greeting, name capture, then a menu loop.
//!
//! Turn-taking is strictly sequential because [`Speaker::speak`] blocks until
//! playback ends. Neither speech errors nor listen errors leave the session:
//! a failed speak is logged and the text stays in the log, a failed listen
//! is answered with a spoken apology and treated as an empty utterance.

use crate::intent::{classify, Intent};
use crate::listen::{ListenError, Listener};
use crate::script;
use crate::synth::{SpeakError, Speaker};
use greeter_core::ShutdownSignal;
use serde::Serialize;

/// Where the dialogue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Greeting,
    NameCapture,
    Menu,
    Ended,
}

/// Per-session tallies, reported when the session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Menu answers that matched a non-exit intent.
    pub answered: u32,
    /// Menu answers that matched nothing.
    pub not_understood: u32,
}

pub struct ConversationSession<S, L> {
    speaker: S,
    listener: L,
    state: SessionState,
    name: Option<String>,
    stats: SessionStats,
}

impl<S: Speaker, L: Listener> ConversationSession<S, L> {
    pub fn new(speaker: S, listener: L) -> Self {
        Self {
            speaker,
            listener,
            state: SessionState::Greeting,
            name: None,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The visitor's name, if one was heard.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run to `Ended`. `shutdown` is checked before every turn.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> SessionStats {
        while self.state != SessionState::Ended {
            if shutdown.is_triggered() {
                tracing::info!(state = ?self.state, "ending conversation for shutdown");
                self.state = SessionState::Ended;
                break;
            }
            self.step();
        }
        tracing::info!(stats = ?self.stats, "conversation ended");
        self.stats
    }

    /// Perform one turn and return the new state.
    pub fn step(&mut self) -> SessionState {
        self.state = match self.state {
            SessionState::Greeting => {
                self.say(script::WELCOME);
                SessionState::NameCapture
            }
            SessionState::NameCapture => {
                self.say(script::ASK_NAME);
                match self.hear() {
                    Some(name) => {
                        self.say(&script::greet_by_name(&name));
                        self.name = Some(name);
                    }
                    None => self.say(script::NO_NAME),
                }
                SessionState::Menu
            }
            SessionState::Menu => self.menu_turn(),
            SessionState::Ended => SessionState::Ended,
        };
        self.state
    }

    fn menu_turn(&mut self) -> SessionState {
        self.say(script::MENU_PROMPT);
        self.say(script::MENU_OPTIONS);

        let Some(utterance) = self.hear() else {
            return SessionState::Menu;
        };

        match classify(&utterance) {
            Some(Intent::Exit) => {
                self.say_all(script::response(Intent::Exit));
                SessionState::Ended
            }
            Some(intent) => {
                tracing::debug!(?intent, "answering");
                self.say_all(script::response(intent));
                self.stats.answered += 1;
                SessionState::Menu
            }
            None => {
                self.say(script::NOT_UNDERSTOOD);
                self.stats.not_understood += 1;
                SessionState::Menu
            }
        }
    }

    fn say_all(&mut self, lines: &[&str]) {
        for line in lines {
            self.say(line);
        }
    }

    /// Speak one line; failures are logged and the dialogue carries on.
    fn say(&mut self, text: &str) {
        tracing::info!(bot = text);
        match self.speaker.speak(text) {
            Ok(()) => {}
            Err(e @ SpeakError::ToolMissing { .. }) => {
                tracing::error!(error = %e, "speech output unavailable; continuing without audio");
            }
            Err(e) => tracing::warn!(error = %e, "failed to speak line"),
        }
    }

    /// Listen once. `None` for silence or any failure, after an apology.
    fn hear(&mut self) -> Option<String> {
        let apology = match self.listener.listen() {
            Ok(text) if !text.trim().is_empty() => return Some(text.trim().to_lowercase()),
            Ok(_) | Err(ListenError::Unintelligible) => {
                tracing::debug!("could not understand audio");
                script::APOLOGY_UNINTELLIGIBLE
            }
            Err(ListenError::NoSpeech) => {
                tracing::debug!("no speech detected within timeout");
                script::APOLOGY_NO_SPEECH
            }
            Err(e @ ListenError::ServiceUnreachable(_)) => {
                tracing::warn!(error = %e, "speech recognition request failed");
                script::APOLOGY_SERVICE
            }
            Err(e @ ListenError::Capture(_)) => {
                tracing::warn!(error = %e, "listening failed");
                script::APOLOGY_UNEXPECTED
            }
        };

        self.say(apology);
        None
    }
}
