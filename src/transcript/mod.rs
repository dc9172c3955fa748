//! Transcript accumulation and cleaning.
//!
//! Maintains two live (uncommitted) text buffers — candidate and AI — fed by
//! streaming partial recognitions, freezes them into immutable history
//! entries at turn boundaries, and keeps the interview context (turn count,
//! rolling summary, last question) needed to resume a dropped session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Candidate,
    Ai,
}

/// A committed, immutable turn record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Always true once appended; partials never enter history.
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// Interview-level context threaded through commits and summary refreshes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewContext {
    #[serde(default)]
    pub resume_summary: String,
    #[serde(default)]
    pub target_role: String,
    #[serde(default)]
    pub experience_years: u32,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub rolling_summary: String,
    #[serde(default)]
    pub last_question_asked: String,
}

/// History entries retained in memory. The rolling summary carries older
/// context, so the window only needs to cover recent prompt material.
const MAX_HISTORY_ENTRIES: usize = 50;

/// Hesitation sounds and discourse fillers stripped from candidate speech.
/// Matched case-insensitively as whole words.
const FILLER_WORDS: &[&str] = &[
    "um", "uh", "umm", "uhh", "erm", "hmm", "hm", "mhm", "ah", "eh", "y'know",
];

/// Live-buffer accumulator plus committed history.
pub struct TranscriptAccumulator {
    context: InterviewContext,
    history: Vec<TranscriptEntry>,
    /// Exclusively-owned live buffers, replaced wholesale on each partial.
    candidate_buffer: String,
    ai_buffer: String,
}

impl TranscriptAccumulator {
    pub fn new(context: InterviewContext) -> Self {
        Self {
            context,
            history: Vec::new(),
            candidate_buffer: String::new(),
            ai_buffer: String::new(),
        }
    }

    /// Replace the candidate's live buffer with the latest full partial.
    pub fn append_candidate_text(&mut self, partial: &str) {
        self.candidate_buffer.clear();
        self.candidate_buffer.push_str(partial);
    }

    /// Replace the AI's live buffer with the latest full partial.
    pub fn append_ai_text(&mut self, partial: &str) {
        self.ai_buffer.clear();
        self.ai_buffer.push_str(partial);
    }

    /// Current (uncommitted) candidate text.
    pub fn candidate_buffer(&self) -> &str {
        &self.candidate_buffer
    }

    /// Committed history, oldest first.
    pub fn history(&self) -> &[TranscriptEntry] {
        &self.history
    }

    pub fn context(&self) -> &InterviewContext {
        &self.context
    }

    /// Freeze the candidate buffer into history.
    ///
    /// Cleans the live text, appends an entry if anything survives cleaning,
    /// bumps the turn counter, clears the buffer, and returns the cleaned
    /// text. Returns `None` when cleaning leaves nothing.
    pub fn commit_candidate_turn(&mut self) -> Option<String> {
        let cleaned = clean_speech_text(&self.candidate_buffer);
        self.candidate_buffer.clear();
        if cleaned.is_empty() {
            return None;
        }
        self.push_entry(TranscriptEntry {
            speaker: Speaker::Candidate,
            text: cleaned.clone(),
            timestamp: Utc::now(),
            is_final: true,
        });
        self.context.turn_count += 1;
        Some(cleaned)
    }

    /// Freeze the AI buffer into history and record it as the last question.
    pub fn commit_ai_turn(&mut self) {
        let text = self.ai_buffer.trim().to_string();
        self.ai_buffer.clear();
        if text.is_empty() {
            return;
        }
        self.context.last_question_asked = text.clone();
        self.push_entry(TranscriptEntry {
            speaker: Speaker::Ai,
            text,
            timestamp: Utc::now(),
            is_final: true,
        });
    }

    /// Append to history, dropping the oldest entry past the window.
    fn push_entry(&mut self, entry: TranscriptEntry) {
        self.history.push(entry);
        if self.history.len() > MAX_HISTORY_ENTRIES {
            self.history.remove(0);
        }
    }

    /// Whether a rolling-summary refresh is due (every 5 committed turns).
    pub fn should_generate_summary(&self) -> bool {
        self.context.turn_count > 0 && self.context.turn_count % 5 == 0
    }

    /// Store a summary generated externally by the remote AI.
    pub fn update_rolling_summary(&mut self, summary: &str) {
        self.context.rolling_summary = summary.trim().to_string();
    }

    /// Deterministic summary-request prompt over the last 10 history entries.
    pub fn summary_request_prompt(&self) -> String {
        let recent: Vec<String> = self
            .history
            .iter()
            .rev()
            .take(10)
            .rev()
            .map(|e| {
                let who = match e.speaker {
                    Speaker::Candidate => "Candidate",
                    Speaker::Ai => "Interviewer",
                };
                format!("{}: {}", who, e.text)
            })
            .collect();
        format!(
            "Summarize the interview so far in 2-3 sentences, focusing on the \
             candidate's answers and any open threads.\n\n{}",
            recent.join("\n")
        )
    }

    /// Deterministic resumption prompt from the full context, for reconnect.
    pub fn resumption_prompt(&self) -> String {
        let ctx = &self.context;
        format!(
            "You are resuming a mock interview for the role of {} (candidate \
             has {} years of experience). Resume summary: {}. Conversation so \
             far: {}. The last question you asked was: \"{}\". {} answers have \
             been given. Continue the interview naturally without repeating \
             yourself.",
            ctx.target_role,
            ctx.experience_years,
            ctx.resume_summary,
            ctx.rolling_summary,
            ctx.last_question_asked,
            ctx.turn_count,
        )
    }
}

/// Clean a raw speech-to-text string: collapse whitespace, strip filler
/// tokens, and collapse immediately-repeated words. Idempotent.
pub fn clean_speech_text(raw: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for word in raw.split_whitespace() {
        let bare = word.trim_matches(|c: char| c.is_ascii_punctuation());
        if !bare.is_empty()
            && FILLER_WORDS
                .iter()
                .any(|f| f.eq_ignore_ascii_case(bare))
        {
            continue;
        }
        // Collapse immediate repeats ("I I think" -> "I think").
        if let Some(&prev) = out.last() {
            if prev.eq_ignore_ascii_case(word) {
                continue;
            }
        }
        out.push(word);
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_strips_fillers_without_corrupting_words() {
        assert_eq!(
            clean_speech_text("um I I think uh it works"),
            "I think it works"
        );
        // "umbrella" contains "um" but is not a filler.
        assert_eq!(clean_speech_text("the umbrella is red"), "the umbrella is red");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = [
            "um I I think uh it works",
            "  lots   of    whitespace ",
            "Hmm, well, the the answer is is forty-two.",
            "",
            "uh uh um",
        ];
        for raw in inputs {
            let once = clean_speech_text(raw);
            assert_eq!(clean_speech_text(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn cleaning_collapses_whitespace_and_repeats() {
        assert_eq!(clean_speech_text("so   so  I\twent"), "so I went");
        assert_eq!(clean_speech_text("yes yes"), "yes");
    }

    #[test]
    fn commit_candidate_turn_appends_and_counts() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        acc.append_candidate_text("um I used a hash map");
        let cleaned = acc.commit_candidate_turn();
        assert_eq!(cleaned.as_deref(), Some("I used a hash map"));
        assert_eq!(acc.context().turn_count, 1);
        assert_eq!(acc.history().len(), 1);
        assert_eq!(acc.history()[0].speaker, Speaker::Candidate);
        assert!(acc.history()[0].is_final);
        assert!(acc.candidate_buffer().is_empty());
    }

    #[test]
    fn empty_commit_neither_appends_nor_counts() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        acc.append_candidate_text("um uh  ");
        assert_eq!(acc.commit_candidate_turn(), None);
        assert_eq!(acc.context().turn_count, 0);
        assert!(acc.history().is_empty());
    }

    #[test]
    fn partials_replace_not_append() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        acc.append_candidate_text("I used");
        acc.append_candidate_text("I used a hash map");
        assert_eq!(acc.candidate_buffer(), "I used a hash map");
    }

    #[test]
    fn ai_commit_records_last_question() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        acc.append_ai_text("  Tell me about a hard bug you fixed.  ");
        acc.commit_ai_turn();
        assert_eq!(
            acc.context().last_question_asked,
            "Tell me about a hard bug you fixed."
        );
        assert_eq!(acc.history().len(), 1);
        // AI turns do not advance the candidate turn counter.
        assert_eq!(acc.context().turn_count, 0);
    }

    #[test]
    fn summary_cadence_every_five_turns() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        assert!(!acc.should_generate_summary());
        for i in 1..=10 {
            acc.append_candidate_text("a real answer");
            acc.commit_candidate_turn();
            assert_eq!(acc.should_generate_summary(), i % 5 == 0, "turn {i}");
        }
    }

    #[test]
    fn prompts_are_pure_functions_of_state() {
        let mut acc = TranscriptAccumulator::new(InterviewContext {
            target_role: "Backend Engineer".into(),
            experience_years: 4,
            ..Default::default()
        });
        acc.append_ai_text("What is a hash map?");
        acc.commit_ai_turn();
        let p1 = acc.summary_request_prompt();
        let p2 = acc.summary_request_prompt();
        assert_eq!(p1, p2);
        assert!(p1.contains("Interviewer: What is a hash map?"));
        let r = acc.resumption_prompt();
        assert!(r.contains("Backend Engineer"));
        assert!(r.contains("What is a hash map?"));
        acc.update_rolling_summary("  Covered hash maps.  ");
        assert!(acc.resumption_prompt().contains("Covered hash maps."));
    }

    #[test]
    fn history_is_bounded() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        for i in 0..60 {
            acc.append_candidate_text(&format!("answer {i}"));
            acc.commit_candidate_turn();
        }
        assert_eq!(acc.history().len(), 50);
        assert_eq!(acc.history()[0].text, "answer 10");
        // The turn counter still reflects every commit.
        assert_eq!(acc.context().turn_count, 60);
    }

    #[test]
    fn summary_prompt_uses_last_ten_entries_only() {
        let mut acc = TranscriptAccumulator::new(InterviewContext::default());
        for i in 0..12 {
            acc.append_candidate_text(&format!("answer number {i}"));
            acc.commit_candidate_turn();
        }
        let p = acc.summary_request_prompt();
        assert!(!p.contains("answer number 1\n"));
        assert!(p.contains("answer number 2"));
        assert!(p.contains("answer number 11"));
    }
}
