//! Real-time turn coordination for spoken mock interviews.
//!
//! Turns a noisy, continuous microphone stream and an asynchronous AI
//! response stream into a coherent half-duplex conversation: when the
//! candidate has finished speaking, when the AI may speak, how barge-in is
//! handled, and how audio is captured, resampled, transmitted, and played
//! back without gaps or overlaps.
//!
//! The crate is organized as five components composed per active session:
//! the capture pipeline and playback scheduler ([`audio`]), the
//! voice-activity turn detector ([`turn`]), the transcript accumulator
//! ([`transcript`]), and the half-duplex session controller ([`session`]).
//! The remote AI voice session is only a trait boundary ([`remote`]);
//! transport, auth, and persistence live in the host application.

pub mod audio;
pub mod config;
pub mod error;
pub mod remote;
pub mod session;
pub mod transcript;
pub mod turn;

pub use audio::capture::{CaptureFrame, CapturePipeline};
pub use audio::playback::PlaybackScheduler;
pub use config::TurnTuning;
pub use error::CoreError;
pub use remote::{RemoteEvent, RemoteSession};
pub use session::events::CoreEvent;
pub use session::{SessionController, SessionState};
pub use transcript::{InterviewContext, Speaker, TranscriptAccumulator, TranscriptEntry};
pub use turn::{TurnDetector, TurnEvent, TurnPhase};
