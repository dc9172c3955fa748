//! Turn-taking session controller.
//!
//! The top-level half-duplex state machine for one active interview session.
//! It owns the single authoritative microphone gate, reacts to remote-session
//! signals, and guards answer commits against the duplicate-signal races that
//! a voice-activity detector inevitably produces.
//!
//! The controller holds no back-references to the detector or the playback
//! scheduler: it consumes typed [`RemoteEvent`]s, talks to the remote through
//! the [`RemoteSession`] trait, and publishes [`CoreEvent`]s on a channel the
//! orchestrating layer subscribes to.

pub mod events;

use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::TurnTuning;
use crate::error::CoreError;
use crate::remote::{RemoteEvent, RemoteSession};
use events::CoreEvent;

/// Minimum committed-answer length in characters.
const MIN_ANSWER_CHARS: usize = 2;

/// Half-duplex session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session created; kickoff not yet sent to the remote AI.
    Kickoff,
    /// The AI holds the floor; microphone forwarding is off.
    ModelSpeaking,
    /// The candidate holds the floor; microphone forwarding is on.
    Listening,
    /// Relay step while an accepted answer is forwarded; never a wait state.
    Committing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kickoff => write!(f, "kickoff"),
            Self::ModelSpeaking => write!(f, "model_speaking"),
            Self::Listening => write!(f, "listening"),
            Self::Committing => write!(f, "committing"),
        }
    }
}

/// One half-duplex gate over one active interview session.
pub struct SessionController<R: RemoteSession> {
    session_id: Uuid,
    tuning: TurnTuning,
    remote: R,
    events: UnboundedSender<CoreEvent>,
    state: SessionState,
    /// Set when the AI has yielded the floor and an answer is expected.
    awaiting_answer: bool,
    turn_count: u32,
    last_commit_at: Option<Instant>,
}

impl<R: RemoteSession> SessionController<R> {
    pub fn new(tuning: TurnTuning, remote: R, events: UnboundedSender<CoreEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            tuning,
            remote,
            events,
            state: SessionState::Kickoff,
            awaiting_answer: false,
            turn_count: 0,
            last_commit_at: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Committed candidate turns so far.
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn awaiting_answer(&self) -> bool {
        self.awaiting_answer
    }

    /// The single authoritative microphone gate: true iff the candidate
    /// holds the floor. The capture pipeline must query this (or track the
    /// state-change events) before forwarding any frame.
    pub fn should_forward_mic(&self) -> bool {
        self.state == SessionState::Listening
    }

    /// Forward one encoded capture frame iff the candidate holds the floor.
    ///
    /// Routing frames through the controller keeps the gate and the send in
    /// one place: a frame can never reach the remote while forwarding is
    /// disabled. Returns whether the frame was forwarded.
    pub fn forward_mic_frame(&mut self, encoded_frame: &str) -> bool {
        if !self.should_forward_mic() {
            return false;
        }
        if let Err(e) = self.remote.send_audio_frame(encoded_frame) {
            warn!("failed to forward mic frame: {e:#}");
        }
        true
    }

    /// Send the kickoff instruction and hand the floor to the AI.
    pub fn send_kickoff(&mut self, kickoff_text: &str) -> anyhow::Result<()> {
        self.remote.send_committed_text_turn(kickoff_text)?;
        info!(session = %self.session_id, "kickoff sent");
        self.transition(SessionState::ModelSpeaking);
        Ok(())
    }

    /// React to one inbound remote-session signal.
    ///
    /// Audio payloads and partial transcripts are routed elsewhere by the
    /// orchestrating layer; this method only derives state. Remote timing
    /// cannot be fully controlled, so unexpected events re-derive the
    /// correct state instead of being rejected.
    pub fn handle_remote_event(&mut self, event: &RemoteEvent) {
        match event {
            RemoteEvent::TurnComplete => {
                self.awaiting_answer = true;
                self.transition(SessionState::Listening);
                let _ = self.events.send(CoreEvent::ReadyToListen);
            }
            RemoteEvent::Interrupted => {
                // Barge-in always yields the floor to the candidate.
                self.awaiting_answer = true;
                self.transition(SessionState::Listening);
            }
            RemoteEvent::AudioChunk { .. } => {
                if self.state == SessionState::Listening {
                    // The remote started speaking before we expected it to.
                    debug!(
                        "{}",
                        CoreError::StaleEvent("audio while listening, re-deriving model_speaking")
                    );
                    self.awaiting_answer = false;
                    self.transition(SessionState::ModelSpeaking);
                }
            }
            RemoteEvent::GenerationComplete => {
                debug!(session = %self.session_id, "remote generation complete");
            }
            RemoteEvent::PartialTranscript { .. } => {
                // Accumulator's concern; nothing to derive here.
            }
        }
    }

    /// Attempt to commit the candidate's answer.
    ///
    /// Rejected (a logged no-op, not an error) when no answer is awaited,
    /// the text is trivial, or the previous accepted commit was less than
    /// `debounce_ms` ago. Returns whether the commit was accepted.
    pub fn commit_user_answer(&mut self, text: &str) -> bool {
        if !self.awaiting_answer {
            debug!("{}", CoreError::InvalidCommit("not awaiting an answer"));
            return false;
        }
        let text = text.trim();
        if text.len() < MIN_ANSWER_CHARS {
            debug!("{}", CoreError::InvalidCommit("text below minimum length"));
            return false;
        }
        if let Some(last) = self.last_commit_at {
            if (last.elapsed().as_millis() as u64) < self.tuning.debounce_ms {
                debug!("{}", CoreError::InvalidCommit("within debounce window"));
                return false;
            }
        }

        self.transition(SessionState::Committing);
        self.turn_count += 1;
        self.last_commit_at = Some(Instant::now());
        self.awaiting_answer = false;
        if let Err(e) = self.remote.send_committed_text_turn(text) {
            // Absorbed: the session must outlive a dropped send.
            warn!("failed to forward committed turn: {e:#}");
        }
        let _ = self.events.send(CoreEvent::FinalCandidateText {
            text: text.to_string(),
        });
        info!(turn = self.turn_count, "candidate turn committed");
        // Committing is a relay step, not a wait state.
        self.transition(SessionState::ModelSpeaking);
        true
    }

    /// Re-enter the conversation after a reconnect, keeping the turn counter.
    pub fn resume_session(&mut self) {
        info!(session = %self.session_id, turns = self.turn_count, "session resumed");
        self.awaiting_answer = false;
        self.transition(SessionState::ModelSpeaking);
    }

    /// Fully reinitialize to `Kickoff`, clearing all counters.
    pub fn reset(&mut self) {
        self.turn_count = 0;
        self.awaiting_answer = false;
        self.last_commit_at = None;
        self.transition(SessionState::Kickoff);
    }

    fn transition(&mut self, new: SessionState) {
        if new == self.state {
            return;
        }
        let previous = self.state;
        self.state = new;
        debug!(%previous, %new, "session state change");
        let _ = self.events.send(CoreEvent::StateChange { new, previous });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    /// Remote double that accepts everything.
    struct NullRemote;

    impl RemoteSession for NullRemote {
        fn send_audio_frame(&mut self, _encoded_frame: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn send_committed_text_turn(&mut self, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn controller(
        tuning: TurnTuning,
    ) -> (
        SessionController<NullRemote>,
        mpsc::UnboundedReceiver<CoreEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionController::new(tuning, NullRemote, tx), rx)
    }

    fn listening_controller() -> (
        SessionController<NullRemote>,
        mpsc::UnboundedReceiver<CoreEvent>,
    ) {
        let tuning = TurnTuning {
            debounce_ms: 0,
            ..TurnTuning::default()
        };
        let (mut c, rx) = controller(tuning);
        c.send_kickoff("begin the interview").unwrap();
        c.handle_remote_event(&RemoteEvent::TurnComplete);
        (c, rx)
    }

    #[test]
    fn kickoff_hands_floor_to_model() {
        let (mut c, _rx) = controller(TurnTuning::default());
        assert_eq!(c.state(), SessionState::Kickoff);
        assert!(!c.should_forward_mic());
        c.send_kickoff("begin").unwrap();
        assert_eq!(c.state(), SessionState::ModelSpeaking);
        assert!(!c.should_forward_mic());
    }

    #[test]
    fn turn_complete_opens_the_mic() {
        let (c, _rx) = listening_controller();
        assert_eq!(c.state(), SessionState::Listening);
        assert!(c.awaiting_answer());
        assert!(c.should_forward_mic());
    }

    #[test]
    fn accepted_commit_relays_and_returns_floor() {
        let (mut c, _rx) = listening_controller();
        assert!(c.commit_user_answer("I used a hash map for O(1) lookups"));
        assert_eq!(c.turn_count(), 1);
        assert_eq!(c.state(), SessionState::ModelSpeaking);
        assert!(!c.awaiting_answer());
        assert!(!c.should_forward_mic());
    }

    #[test]
    fn commit_rejected_when_not_awaiting() {
        let (mut c, _rx) = controller(TurnTuning::default());
        c.send_kickoff("begin").unwrap();
        assert!(!c.commit_user_answer("a perfectly fine answer"));
        assert_eq!(c.turn_count(), 0);
    }

    #[test]
    fn commit_rejected_for_trivial_text() {
        let (mut c, _rx) = listening_controller();
        assert!(!c.commit_user_answer(""));
        assert!(!c.commit_user_answer(" a "));
        assert_eq!(c.turn_count(), 0);
        // Guard rejection leaves the floor with the candidate.
        assert_eq!(c.state(), SessionState::Listening);
    }

    #[test]
    fn double_commit_within_debounce_accepts_exactly_one() {
        let tuning = TurnTuning {
            debounce_ms: 60_000,
            ..TurnTuning::default()
        };
        let (mut c, _rx) = controller(tuning);
        c.send_kickoff("begin").unwrap();
        c.handle_remote_event(&RemoteEvent::TurnComplete);
        assert!(c.commit_user_answer("first answer"));
        c.handle_remote_event(&RemoteEvent::TurnComplete);
        assert!(!c.commit_user_answer("duplicate detector signal"));
        assert_eq!(c.turn_count(), 1);
    }

    #[test]
    fn barge_in_yields_floor_from_any_speaking_state() {
        let (mut c, _rx) = listening_controller();
        assert!(c.commit_user_answer("an answer"));
        assert_eq!(c.state(), SessionState::ModelSpeaking);
        c.handle_remote_event(&RemoteEvent::Interrupted);
        assert_eq!(c.state(), SessionState::Listening);
        assert!(c.awaiting_answer());
        assert!(c.should_forward_mic());
    }

    #[test]
    fn early_remote_audio_rederives_model_speaking() {
        let (mut c, _rx) = listening_controller();
        c.handle_remote_event(&RemoteEvent::AudioChunk { pcm: "AAAA".into() });
        assert_eq!(c.state(), SessionState::ModelSpeaking);
        assert!(!c.awaiting_answer());
        // While the model already holds the floor, chunks change nothing.
        c.handle_remote_event(&RemoteEvent::AudioChunk { pcm: "AAAA".into() });
        assert_eq!(c.state(), SessionState::ModelSpeaking);
    }

    #[test]
    fn resume_keeps_counter_reset_clears_it() {
        let (mut c, _rx) = listening_controller();
        assert!(c.commit_user_answer("an answer"));
        c.resume_session();
        assert_eq!(c.state(), SessionState::ModelSpeaking);
        assert_eq!(c.turn_count(), 1);
        c.reset();
        assert_eq!(c.state(), SessionState::Kickoff);
        assert_eq!(c.turn_count(), 0);
    }

    #[test]
    fn mic_frames_only_forward_while_listening() {
        let (mut c, _rx) = controller(TurnTuning::default());
        assert!(!c.forward_mic_frame("AAAA"));
        c.send_kickoff("begin").unwrap();
        assert!(!c.forward_mic_frame("AAAA"));
        c.handle_remote_event(&RemoteEvent::TurnComplete);
        assert!(c.forward_mic_frame("AAAA"));
    }

    #[test]
    fn events_trace_the_state_walk() {
        let (mut c, mut rx) = listening_controller();
        assert!(c.commit_user_answer("an answer"));
        let mut walk = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            match ev {
                CoreEvent::StateChange { new, .. } => walk.push(new),
                CoreEvent::FinalCandidateText { text } => {
                    assert_eq!(text, "an answer");
                }
                CoreEvent::ReadyToListen | CoreEvent::Volume { .. } => {}
            }
        }
        assert_eq!(
            walk,
            vec![
                SessionState::ModelSpeaking,
                SessionState::Listening,
                SessionState::Committing,
                SessionState::ModelSpeaking,
            ]
        );
    }
}
