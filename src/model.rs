//! Domain types shared across the client surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message in the conversation transcript.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

/// Conversation mode sent as the `mod` form field.
///
/// The backend dispatches on the Turkish mode names; the default mode is
/// free-form chat (`sohbet`). Unknown values fall back to chat server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// Free-form chat.
    #[default]
    Sohbet,
    /// Task/work mode (`is`).
    Is,
    /// Research mode (`arastirma`).
    Arastirma,
}

impl ChatMode {
    /// Wire value of the mode discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMode::Sohbet => "sohbet",
            ChatMode::Is => "is",
            ChatMode::Arastirma => "arastirma",
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the active transcript as returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryMessage {
    pub role: Role,
    pub text: String,
    /// ISO-8601 timestamp assigned by the backend when the message was saved.
    pub timestamp: String,
}

/// Whether the backend is currently generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Generating,
}

/// Snapshot of the backend's generation progress.
///
/// While generating, `percent` moves through 20-99 and reaches 100 at the
/// end, at which point `status` flips back to idle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressReport {
    pub status: ProgressStatus,
    pub percent: u8,
    #[serde(default)]
    pub message: String,
}

/// One item of a streaming session.
///
/// Both variants carry the full accumulated text so far, not the increment:
/// a renderer performs a plain replace on every event and never has to track
/// partial state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// More text arrived; the payload is everything received so far.
    Delta(String),
    /// The session ended normally; the payload is the canonical final text.
    Complete(String),
}
