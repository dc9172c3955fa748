//! Voice-activity turn detector.
//!
//! Consumes a per-frame speaking/silence signal and classifies the stream
//! into turn phases, applying pause-tolerance and hard-timeout policies.
//! Pure logic — no audio types, no device handles — so it can be driven
//! from any frame source and tested deterministically.

use tracing::debug;

use crate::config::TurnTuning;

/// Phase of the candidate's current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn open; waiting for sustained speech.
    Idle,
    /// Turn open, candidate actively speaking.
    Speaking,
    /// Turn open, candidate silent; may resume or commit.
    InPause,
    /// Transient: a commit is firing this step, then back to `Idle`.
    Committing,
}

/// Event emitted by the detector on a completed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// A turn opened (sustained speech observed).
    SpeechStarted,
    /// A turn closed; carries the total accumulated speech duration.
    Commit { speech_ms: u64 },
}

/// Turn phase machine.
///
/// Feed frames in capture order via [`process_frame`](Self::process_frame).
/// `Committing` never outlives a processing step: the same call that reaches
/// it emits [`TurnEvent::Commit`] and resets to `Idle`.
pub struct TurnDetector {
    tuning: TurnTuning,
    phase: TurnPhase,
    /// Consecutive speech observed while still `Idle` (resets on any silence).
    speech_start_ms: u64,
    /// Total speech accumulated in the open turn.
    accumulated_speech_ms: u64,
    /// Silence accumulated since entering `InPause`.
    pause_ms: u64,
}

impl TurnDetector {
    pub fn new(tuning: TurnTuning) -> Self {
        Self {
            tuning,
            phase: TurnPhase::Idle,
            speech_start_ms: 0,
            accumulated_speech_ms: 0,
            pause_ms: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Total speech accumulated in the currently open turn, in milliseconds.
    pub fn accumulated_speech_ms(&self) -> u64 {
        self.accumulated_speech_ms
    }

    /// Advance the phase machine by one frame.
    ///
    /// `is_speaking` is the upstream VAD verdict for this frame and
    /// `frame_ms` its duration. Returns an event on a completed transition.
    pub fn process_frame(&mut self, is_speaking: bool, frame_ms: u64) -> Option<TurnEvent> {
        match self.phase {
            TurnPhase::Idle => {
                if is_speaking {
                    self.speech_start_ms += frame_ms;
                    if self.speech_start_ms >= self.tuning.speech_start_ms {
                        self.phase = TurnPhase::Speaking;
                        self.accumulated_speech_ms = self.speech_start_ms;
                        self.speech_start_ms = 0;
                        debug!("turn opened");
                        return Some(TurnEvent::SpeechStarted);
                    }
                } else {
                    // Transient noise: any silence resets the start tracker.
                    self.speech_start_ms = 0;
                }
                None
            }
            TurnPhase::Speaking => {
                if is_speaking {
                    self.accumulated_speech_ms += frame_ms;
                } else {
                    self.phase = TurnPhase::InPause;
                    self.pause_ms = frame_ms;
                }
                None
            }
            TurnPhase::InPause => {
                if is_speaking {
                    self.phase = TurnPhase::Speaking;
                    self.pause_ms = 0;
                    self.accumulated_speech_ms += frame_ms;
                    return None;
                }
                self.pause_ms += frame_ms;
                let hard_end = self.pause_ms >= self.tuning.hard_end_ms;
                let soft_end = self.pause_ms >= self.tuning.pause_tolerance_ms
                    && self.accumulated_speech_ms >= self.tuning.min_speech_ms;
                if hard_end || soft_end {
                    return Some(self.fire_commit());
                }
                None
            }
            // Unreachable in practice: Committing resets within the same step.
            TurnPhase::Committing => None,
        }
    }

    /// Force an early commit of the open turn, if any.
    pub fn force_commit(&mut self) -> Option<TurnEvent> {
        match self.phase {
            TurnPhase::Speaking | TurnPhase::InPause => Some(self.fire_commit()),
            TurnPhase::Idle | TurnPhase::Committing => None,
        }
    }

    /// Return to `Idle`, discarding any open turn.
    pub fn reset(&mut self) {
        self.phase = TurnPhase::Idle;
        self.speech_start_ms = 0;
        self.accumulated_speech_ms = 0;
        self.pause_ms = 0;
    }

    fn fire_commit(&mut self) -> TurnEvent {
        self.phase = TurnPhase::Committing;
        let speech_ms = self.accumulated_speech_ms;
        debug!(speech_ms, "turn committed");
        self.reset();
        TurnEvent::Commit { speech_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TurnDetector {
        TurnDetector::new(TurnTuning::default())
    }

    /// Feed `count` frames of `frame_ms` each with the given VAD verdict,
    /// collecting any emitted events.
    fn feed(d: &mut TurnDetector, speaking: bool, count: u64, frame_ms: u64) -> Vec<TurnEvent> {
        (0..count)
            .filter_map(|_| d.process_frame(speaking, frame_ms))
            .collect()
    }

    #[test]
    fn sustained_speech_opens_turn_exactly_once() {
        let mut d = detector();
        // 200 ms threshold at 50 ms frames = 4 frames.
        let events = feed(&mut d, true, 40, 50);
        assert_eq!(events, vec![TurnEvent::SpeechStarted]);
        assert_eq!(d.phase(), TurnPhase::Speaking);
    }

    #[test]
    fn transient_noise_below_threshold_never_opens() {
        let mut d = detector();
        // Alternate speech/silence; speech never sustains 200 ms.
        for _ in 0..50 {
            assert_eq!(d.process_frame(true, 100), None);
            assert_eq!(d.process_frame(false, 100), None);
        }
        assert_eq!(d.phase(), TurnPhase::Idle);
    }

    #[test]
    fn soft_commit_at_pause_tolerance_with_enough_speech() {
        let mut d = detector();
        feed(&mut d, true, 40, 50); // 2000 ms speech >= min_speech_ms
        // Exactly pause_tolerance_ms of silence: 50 frames of 50 ms.
        let events = feed(&mut d, false, 50, 50);
        assert_eq!(events, vec![TurnEvent::Commit { speech_ms: 2000 }]);
        assert_eq!(d.phase(), TurnPhase::Idle);
    }

    #[test]
    fn short_speech_only_hard_ends() {
        let mut d = detector();
        feed(&mut d, true, 10, 50); // 500 ms speech < min_speech_ms
        assert_eq!(d.phase(), TurnPhase::Speaking);
        // Silence up to just under hard_end_ms: no commit.
        let events = feed(&mut d, false, 99, 50); // 4950 ms
        assert!(events.is_empty());
        assert_eq!(d.phase(), TurnPhase::InPause);
        // One more frame reaches 5000 ms: hard end fires.
        assert_eq!(
            d.process_frame(false, 50),
            Some(TurnEvent::Commit { speech_ms: 500 })
        );
    }

    #[test]
    fn pause_then_resume_accumulates_speech() {
        let mut d = detector();
        feed(&mut d, true, 20, 50); // 1000 ms
        feed(&mut d, false, 10, 50); // 500 ms pause, below tolerance
        assert_eq!(d.phase(), TurnPhase::InPause);
        feed(&mut d, true, 20, 50); // resume, +1000 ms
        assert_eq!(d.phase(), TurnPhase::Speaking);
        let events = feed(&mut d, false, 50, 50);
        assert_eq!(events, vec![TurnEvent::Commit { speech_ms: 2000 }]);
    }

    #[test]
    fn commit_never_fires_early_for_any_input() {
        // Property sweep: random-ish interleavings never soft-commit below
        // min_speech_ms before hard_end_ms of silence.
        let mut d = detector();
        feed(&mut d, true, 5, 50); // 250 ms speech
        let mut silence = 0u64;
        while silence < 5000 {
            let ev = d.process_frame(false, 50);
            silence += 50;
            if silence < 5000 {
                assert_eq!(ev, None, "commit fired at {silence} ms of silence");
            } else {
                assert_eq!(ev, Some(TurnEvent::Commit { speech_ms: 250 }));
            }
        }
    }

    #[test]
    fn force_commit_closes_open_turn() {
        let mut d = detector();
        feed(&mut d, true, 40, 50);
        assert_eq!(
            d.force_commit(),
            Some(TurnEvent::Commit { speech_ms: 2000 })
        );
        assert_eq!(d.phase(), TurnPhase::Idle);
        // Nothing open: no-op.
        assert_eq!(d.force_commit(), None);
    }

    #[test]
    fn reset_discards_open_turn() {
        let mut d = detector();
        feed(&mut d, true, 40, 50);
        d.reset();
        assert_eq!(d.phase(), TurnPhase::Idle);
        assert_eq!(d.accumulated_speech_ms(), 0);
        assert_eq!(d.force_commit(), None);
    }
}
