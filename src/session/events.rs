//! Notifications exposed to the surrounding application.
//!
//! Serialized as `{"event": "<variant>", "data": {...}}` JSON lines, one per
//! line on stdout when run as a binary. The host is responsible for
//! persistence, rendering, and proctoring policy; the core only emits.

use serde::Serialize;

use super::SessionState;

/// All events emitted to the host application.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum CoreEvent {
    /// The session state machine moved.
    StateChange {
        new: SessionState,
        previous: SessionState,
    },
    /// The AI yielded the floor; the microphone is now live.
    ReadyToListen,
    /// A candidate turn was accepted; carries the cleaned committed text.
    FinalCandidateText { text: String },
    /// Instantaneous microphone loudness for UI metering, 0-100.
    Volume { level: u8 },
}
