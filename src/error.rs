//! Error taxonomy for the turn-coordination core.
//!
//! Only `DeviceUnavailable` ever crosses the library boundary as an `Err`:
//! a live conversation cannot pause to surface a dropped frame, so every
//! in-stream anomaly is absorbed where it occurs and logged instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Microphone or speaker acquisition failed. Fatal to that pipeline
    /// instance; surfaced to the caller as a failed `start()`.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// An inbound audio payload could not be decoded. The chunk is dropped
    /// and playback continues with the next one.
    #[error("malformed audio chunk: {0}")]
    MalformedChunk(String),

    /// A commit was rejected by the session controller's guard. Expected
    /// under normal operation (redundant detector signals), never raised.
    #[error("commit rejected: {0}")]
    InvalidCommit(&'static str),

    /// A remote event arrived for a state that was not expecting it. The
    /// controller re-derives the correct state rather than rejecting it.
    #[error("stale remote event: {0}")]
    StaleEvent(&'static str),
}

pub type Result<T> = std::result::Result<T, CoreError>;
