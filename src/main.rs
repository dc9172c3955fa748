//! interview-voice-core — turn-coordination engine for spoken mock interviews.
//!
//! Speaks JSON-line IPC with a host application: commands arrive on stdin,
//! notifications and outbound remote-session primitives leave on stdout.
//! The host owns the actual transport to the remote AI voice session and
//! proxies its event stream in as `remote` commands; this process owns the
//! microphone, the speakers, and every turn-taking decision in between.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use interview_voice_core::config::read_core_config;
use interview_voice_core::transcript::clean_speech_text;
use interview_voice_core::{
    CaptureFrame, CapturePipeline, CoreEvent, InterviewContext, PlaybackScheduler, RemoteEvent,
    RemoteSession, SessionController, SessionState, Speaker, TranscriptAccumulator, TurnDetector,
    TurnEvent, TurnTuning,
};

/// Volume (0-100) at or above which a frame counts as speech.
const SPEAKING_VOLUME: u8 = 12;

/// Commands from the host application, one JSON object per stdin line.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum HostCommand {
    /// Begin a session: acquire devices, send the kickoff.
    Start {
        kickoff: String,
        #[serde(default)]
        context: InterviewContext,
    },
    /// Tear the session down and release all devices.
    Stop {},
    /// Reinitialize the session state machine to kickoff.
    Reset {},
    /// Re-enter the conversation after a reconnect, keeping the turn count.
    Resume {},
    /// A proxied event from the remote AI voice session.
    Remote { event: RemoteEvent },
    /// A rolling summary generated by the host in response to a
    /// `summary_request` send.
    Summary { text: String },
    Ping {},
}

/// Outbound remote-session primitives, emitted as JSON lines for the host
/// to relay over its transport.
#[derive(Debug, Serialize)]
#[serde(tag = "send", content = "data", rename_all = "snake_case")]
enum OutboundSend<'a> {
    AudioFrame { frame: &'a str },
    TextTurn { text: &'a str },
    SummaryRequest { prompt: &'a str },
}

/// Lifecycle and error notifications that sit outside [`CoreEvent`].
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum HostEvent {
    Ready {},
    Pong {},
    Stopping {},
    Error { message: String },
}

/// Write any serializable value as one JSON line on stdout and flush.
fn emit<T: Serialize>(value: &T) {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(e) => {
            error!("failed to serialize outbound line: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // Ignore write/flush errors — pipe may be closed.
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

/// [`RemoteSession`] that relays outbound primitives through stdout.
struct StdoutRemote;

impl RemoteSession for StdoutRemote {
    fn send_audio_frame(&mut self, encoded_frame: &str) -> anyhow::Result<()> {
        emit(&OutboundSend::AudioFrame {
            frame: encoded_frame,
        });
        Ok(())
    }

    fn send_committed_text_turn(&mut self, text: &str) -> anyhow::Result<()> {
        emit(&OutboundSend::TextTurn { text });
        Ok(())
    }
}

/// Spawn a blocking stdin reader thread bridged to an async channel.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<HostCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HostCommand>(&line) {
                Ok(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("unparseable command line: {}", e),
            }
        }
        debug!("stdin reader exiting");
    });
    rx
}

/// Everything owned by one active interview session.
struct ActiveSession {
    capture: CapturePipeline,
    playback: PlaybackScheduler,
    detector: TurnDetector,
    accumulator: TranscriptAccumulator,
    controller: SessionController<StdoutRemote>,
}

impl ActiveSession {
    fn start(
        tuning: TurnTuning,
        input_device: Option<&str>,
        kickoff: &str,
        context: InterviewContext,
        event_tx: mpsc::UnboundedSender<CoreEvent>,
        frame_tx: mpsc::UnboundedSender<CaptureFrame>,
    ) -> anyhow::Result<Self> {
        let playback = PlaybackScheduler::new(tuning.playback_rate)?;
        let capture = CapturePipeline::start(input_device, tuning.sample_rate, frame_tx)?;
        let mut controller = SessionController::new(tuning, StdoutRemote, event_tx);
        controller.send_kickoff(kickoff)?;
        Ok(Self {
            capture,
            playback,
            detector: TurnDetector::new(tuning),
            accumulator: TranscriptAccumulator::new(context),
            controller,
        })
    }

    /// Handle one processed microphone frame.
    fn handle_frame(&mut self, frame: &CaptureFrame, event_tx: &mpsc::UnboundedSender<CoreEvent>) {
        let _ = event_tx.send(CoreEvent::Volume {
            level: frame.volume,
        });
        self.controller.forward_mic_frame(&frame.encoded);

        let is_speaking = frame.volume >= SPEAKING_VOLUME;
        if let Some(TurnEvent::Commit { speech_ms }) =
            self.detector.process_frame(is_speaking, frame.duration_ms)
        {
            debug!(speech_ms, "detector commit");
            self.try_commit_answer();
        }
    }

    /// Clean the live candidate buffer and offer it to the controller.
    ///
    /// The accumulator only freezes the turn after the controller accepts
    /// it, so guard rejections (duplicate detector signals, debounce races)
    /// leave the history and turn counter untouched.
    fn try_commit_answer(&mut self) {
        let cleaned = clean_speech_text(self.accumulator.candidate_buffer());
        if !self.controller.commit_user_answer(&cleaned) {
            return;
        }
        self.accumulator.commit_candidate_turn();
        if self.accumulator.should_generate_summary() {
            emit(&OutboundSend::SummaryRequest {
                prompt: &self.accumulator.summary_request_prompt(),
            });
        }
    }

    /// Handle one proxied remote-session event.
    fn handle_remote_event(&mut self, event: RemoteEvent) {
        let was_listening = self.controller.state() == SessionState::Listening;
        self.controller.handle_remote_event(&event);

        match &event {
            RemoteEvent::AudioChunk { pcm } => {
                self.playback.play_chunk(pcm);
                if was_listening && self.controller.state() == SessionState::ModelSpeaking {
                    // The remote reclaimed the floor early; a half-built
                    // candidate turn would commit into a closed window.
                    self.detector.reset();
                }
            }
            RemoteEvent::Interrupted => {
                // Floor change first, then flush stale scheduled audio.
                self.playback.clear();
            }
            RemoteEvent::TurnComplete => {
                self.accumulator.commit_ai_turn();
            }
            RemoteEvent::PartialTranscript { speaker, text } => match speaker {
                Speaker::Candidate => self.accumulator.append_candidate_text(text),
                Speaker::Ai => self.accumulator.append_ai_text(text),
            },
            RemoteEvent::GenerationComplete => {}
        }
    }

    fn stop(&mut self) {
        self.capture.stop();
        self.playback.stop();
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays a clean JSON-line event channel.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = read_core_config();
    info!(?config, "configuration loaded");

    let mut cmd_rx = spawn_stdin_reader();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<CoreEvent>();
    // One persistent frame channel; each capture pipeline gets a sender clone.
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<CaptureFrame>();

    let mut session: Option<ActiveSession> = None;

    emit(&HostEvent::Ready {});
    info!("interview voice core ready");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    info!("stdin closed, shutting down");
                    break;
                };
                match cmd {
                    HostCommand::Start { kickoff, context } => {
                        if let Some(mut old) = session.take() {
                            old.stop();
                        }
                        match ActiveSession::start(
                            config.tuning,
                            config.input_device.as_deref(),
                            &kickoff,
                            context,
                            event_tx.clone(),
                            frame_tx.clone(),
                        ) {
                            Ok(s) => session = Some(s),
                            Err(e) => {
                                error!("session start failed: {e:#}");
                                emit(&HostEvent::Error { message: format!("{e:#}") });
                            }
                        }
                    }
                    HostCommand::Stop {} => {
                        emit(&HostEvent::Stopping {});
                        if let Some(mut s) = session.take() {
                            s.stop();
                        }
                    }
                    HostCommand::Reset {} => {
                        if let Some(s) = session.as_mut() {
                            s.detector.reset();
                            s.controller.reset();
                        }
                    }
                    HostCommand::Resume {} => {
                        if let Some(s) = session.as_mut() {
                            s.controller.resume_session();
                        }
                    }
                    HostCommand::Remote { event } => {
                        if let Some(s) = session.as_mut() {
                            s.handle_remote_event(event);
                        } else {
                            debug!("remote event with no active session");
                        }
                    }
                    HostCommand::Summary { text } => {
                        if let Some(s) = session.as_mut() {
                            s.accumulator.update_rolling_summary(&text);
                        }
                    }
                    HostCommand::Ping {} => emit(&HostEvent::Pong {}),
                }
            }
            Some(frame) = frame_rx.recv() => {
                if let Some(s) = session.as_mut() {
                    s.handle_frame(&frame, &event_tx);
                }
            }
            Some(event) = event_rx.recv() => {
                emit(&event);
            }
        }
    }

    if let Some(mut s) = session.take() {
        s.stop();
    }
    info!("interview voice core shutting down");
}
