//! Keyword intent classification for menu answers.

use serde::Serialize;

/// A topic the menu understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Courses,
    Internship,
    Certification,
    Trainers,
    Exit,
}

/// Checked in this order; the first intent with a contained keyword wins.
const KEYWORDS: [(Intent, &[&str]); 5] = [
    (Intent::Courses, &["course"]),
    (Intent::Internship, &["internship"]),
    (Intent::Certification, &["certification"]),
    (Intent::Trainers, &["trainer", "mentor"]),
    (Intent::Exit, &["exit", "quit", "bye"]),
];

impl Intent {
    /// Whether this intent ends the conversation.
    pub fn is_exit(self) -> bool {
        self == Intent::Exit
    }
}

/// Classify an utterance by substring containment. `None` if nothing matches.
pub fn classify(utterance: &str) -> Option<Intent> {
    let text = utterance.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|&(intent, _)| intent)
}
