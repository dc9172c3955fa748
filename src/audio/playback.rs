//! Playback scheduling for inbound AI speech.
//!
//! Chunks arrive at arbitrary times and sizes; the scheduler turns them into
//! gapless, strictly-ordered playback against a monotonic watermark: each
//! chunk starts either right now (if the watermark fell behind the clock) or
//! exactly where the previous chunk ends. [`clear`](PlaybackScheduler::clear)
//! flushes everything immediately on barge-in and resets the watermark so the
//! next chunk is not queued behind stale audio.
//!
//! The watermark arithmetic lives in [`ChunkScheduler`], pure over an
//! injected clock reading so it can be tested without a device; the rodio
//! layer wraps it.

use std::time::Instant;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{info, warn};

use super::frame::{decode_frame_base64, pcm16_decode};
use crate::error::CoreError;

/// A scheduled playback unit on the output clock, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub start: f64,
    pub end: f64,
}

/// Pure watermark scheduler.
///
/// `now` is the caller's reading of a monotonic output clock in seconds.
pub struct ChunkScheduler {
    sample_rate: u32,
    /// Next available playback time; monotone except when reset by `clear`.
    next_start: f64,
    active: Vec<ScheduledChunk>,
}

impl ChunkScheduler {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            next_start: 0.0,
            active: Vec::new(),
        }
    }

    /// Schedule `n_samples` of mono audio at time `now`.
    ///
    /// If the watermark has fallen behind the clock the chunk starts
    /// immediately; otherwise it is appended right after the previously
    /// scheduled chunk ends. Chunks that finished before `now` are retired
    /// from the active set.
    pub fn schedule(&mut self, n_samples: usize, now: f64) -> ScheduledChunk {
        self.retire_completed(now);
        let start = if self.next_start < now { now } else { self.next_start };
        let end = start + n_samples as f64 / self.sample_rate as f64;
        self.next_start = end;
        let chunk = ScheduledChunk { start, end };
        self.active.push(chunk);
        chunk
    }

    /// Drop every scheduled unit and reset the watermark to `now`.
    pub fn clear(&mut self, now: f64) {
        self.active.clear();
        self.next_start = now;
    }

    /// Currently scheduled or playing units.
    pub fn active(&self) -> &[ScheduledChunk] {
        &self.active
    }

    fn retire_completed(&mut self, now: f64) {
        self.active.retain(|c| c.end > now);
    }
}

/// Device-backed playback scheduler over rodio.
///
/// rodio's sink queue already plays appended buffers back-to-back in order;
/// the [`ChunkScheduler`] tracks the corresponding timeline so callers can
/// observe scheduling and so `clear` can restart from "now".
pub struct PlaybackScheduler {
    _stream: Option<OutputStream>,
    handle: Option<OutputStreamHandle>,
    sink: Option<Sink>,
    scheduler: ChunkScheduler,
    sample_rate: u32,
    clock_epoch: Instant,
}

impl PlaybackScheduler {
    /// Open the default audio output device.
    ///
    /// Fails with [`CoreError::DeviceUnavailable`] when no output exists.
    pub fn new(sample_rate: u32) -> Result<Self, CoreError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| CoreError::DeviceUnavailable(format!("audio output: {e}")))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| CoreError::DeviceUnavailable(format!("audio sink: {e}")))?;
        Ok(Self {
            _stream: Some(stream),
            handle: Some(handle),
            sink: Some(sink),
            scheduler: ChunkScheduler::new(sample_rate),
            sample_rate,
            clock_epoch: Instant::now(),
        })
    }

    /// Seconds since the output clock started.
    fn now(&self) -> f64 {
        self.clock_epoch.elapsed().as_secs_f64()
    }

    /// Decode and schedule one base64 PCM16 chunk.
    ///
    /// A malformed payload is dropped and logged; playback continues with
    /// the next chunk. Returns the scheduled slot for a playable chunk.
    pub fn play_chunk(&mut self, base64_pcm: &str) -> Option<ScheduledChunk> {
        let samples = match decode_chunk(base64_pcm) {
            Ok(s) => s,
            Err(e) => {
                warn!("dropping malformed playback chunk: {e}");
                return None;
            }
        };
        if samples.is_empty() {
            return None;
        }
        let slot = self.scheduler.schedule(samples.len(), self.now());
        if let Some(sink) = &self.sink {
            sink.append(SamplesBuffer::new(1, self.sample_rate, samples));
        }
        Some(slot)
    }

    /// Stop every scheduled and playing unit immediately (barge-in) and
    /// reset the watermark so the next chunk starts now, not after stale
    /// queued audio.
    pub fn clear(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
            sink.play();
        }
        self.scheduler.clear(self.now());
    }

    /// Clear and release the output device entirely. Idempotent.
    pub fn stop(&mut self) {
        self.clear();
        self.sink.take();
        self.handle.take();
        if self._stream.take().is_some() {
            info!("audio playback stopped");
        }
    }

    /// Currently scheduled or playing units.
    pub fn active(&self) -> &[ScheduledChunk] {
        self.scheduler.active()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// base64 -> PCM16 -> normalized f32 samples.
fn decode_chunk(base64_pcm: &str) -> Result<Vec<f32>, CoreError> {
    let pcm = decode_frame_base64(base64_pcm)?;
    pcm16_decode(&pcm)
}
