//! Remote conversational AI session boundary.
//!
//! The core depends only on this shape: two outbound primitives and an
//! inbound event stream. Transport, auth, and reconnection policy live
//! outside the crate.

use serde::{Deserialize, Serialize};

use crate::transcript::Speaker;

/// Outbound primitives exposed by the remote AI voice session.
pub trait RemoteSession {
    /// Forward one base64-encoded PCM16 capture frame.
    fn send_audio_frame(&mut self, encoded_frame: &str) -> anyhow::Result<()>;

    /// Forward a cleaned, committed candidate turn as text.
    fn send_committed_text_turn(&mut self, text: &str) -> anyhow::Result<()>;
}

/// Inbound events from the remote session.
///
/// Deserialized from `{"event": "<variant>", "data": {...}}` JSON lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum RemoteEvent {
    /// The AI finished its speaking turn; the candidate has the floor.
    TurnComplete,
    /// The candidate barged in while the AI was speaking.
    Interrupted,
    /// A chunk of AI speech audio, base64-encoded PCM16.
    AudioChunk { pcm: String },
    /// The AI finished generating its full response.
    GenerationComplete,
    /// A streaming partial recognition for either speaker. Each carries the
    /// full partial so far, not a delta.
    PartialTranscript { speaker: Speaker, text: String },
}
