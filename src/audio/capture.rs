//! Microphone capture pipeline via cpal.
//!
//! Opens the default (or named) input device at its native rate, down-mixes
//! to mono, and hands samples to a frame-processing thread through a
//! lock-free ring buffer. That thread cuts fixed 2048-sample frames and, per
//! frame: computes the 0-100 volume signal, block-average downsamples to the
//! 16 kHz target, converts to PCM16, base64-encodes, and emits the result.
//!
//! Frames are emitted unconditionally — deciding whether a frame may be
//! forwarded to the network belongs to the session controller, not here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use super::frame::{downsample_block_avg, encode_frame_base64, pcm16_encode, rms_volume};
use super::ring_buffer::{audio_ring_buffer, AudioConsumer};
use crate::error::CoreError;

/// Samples per capture frame, at the device's native rate.
const FRAME_SAMPLES: usize = 2048;

/// One processed capture frame, ready for the detector and the network.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Base64-encoded PCM16 at the target rate.
    pub encoded: String,
    /// Instantaneous loudness, 0-100.
    pub volume: u8,
    /// Frame duration at the native rate, in milliseconds.
    pub duration_ms: u64,
}

/// List available input device names.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.input_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// List available output device names.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    if let Ok(devices) = host.output_devices() {
        for dev in devices {
            if let Ok(name) = dev.name() {
                names.push(name);
            }
        }
    }
    names
}

/// Resolved info about the audio input we will use.
struct CaptureConfig {
    device: cpal::Device,
    stream_config: StreamConfig,
    native_rate: u32,
}

/// Find and configure the input device.
///
/// Echo cancellation, noise suppression, and auto gain are requested at the
/// OS level where the backend exposes them; cpal itself has no knobs for
/// them, so the device's processed (default) profile is used as-is.
fn resolve_device(device_name: Option<&str>) -> Result<CaptureConfig, CoreError> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| CoreError::DeviceUnavailable(format!("enumeration failed: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CoreError::DeviceUnavailable(format!("input device not found: {name}")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| CoreError::DeviceUnavailable("no default input device".into()))?
    };

    let dev_name = device.name().unwrap_or_else(|_| "unknown".into());

    let default_config = device
        .default_input_config()
        .map_err(|e| CoreError::DeviceUnavailable(format!("no input config: {e}")))?;

    let native_rate = default_config.sample_rate().0;
    let channels = default_config.channels();

    info!(device = %dev_name, native_rate, channels, "selected input device");

    Ok(CaptureConfig {
        device,
        stream_config: StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(native_rate),
            buffer_size: cpal::BufferSize::Default,
        },
        native_rate,
    })
}

/// Down-mix multi-channel audio to mono by averaging channels.
fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// A running capture pipeline. Dropping it (or calling [`stop`](Self::stop))
/// releases the processing thread, the stream, and the device, in that order.
pub struct CapturePipeline {
    stream: Option<Stream>,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    /// Acquire the microphone and start emitting [`CaptureFrame`]s.
    ///
    /// Fails with [`CoreError::DeviceUnavailable`] when acquisition is denied
    /// or no device exists. `target_rate` is the outbound sample rate
    /// (16 kHz by default).
    pub fn start(
        device_name: Option<&str>,
        target_rate: u32,
        frame_tx: UnboundedSender<CaptureFrame>,
    ) -> Result<Self, CoreError> {
        let cfg = resolve_device(device_name)?;
        let native_rate = cfg.native_rate;
        let channels = cfg.stream_config.channels;

        let (mut producer, consumer) = audio_ring_buffer(None);

        let stream = cfg
            .device
            .build_input_stream(
                &cfg.stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = to_mono(data, channels);
                    let written = producer.push_slice(&mono);
                    if written < mono.len() {
                        // Ring buffer full; oldest audio is lost and the
                        // consumer catches up.
                    }
                },
                move |err| {
                    error!("audio input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| CoreError::DeviceUnavailable(format!("input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| CoreError::DeviceUnavailable(format!("stream start: {e}")))?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker = spawn_frame_worker(consumer, native_rate, target_rate, frame_tx, stop_flag.clone());

        info!(native_rate, target_rate, "audio capture started");

        Ok(Self {
            stream: Some(stream),
            stop_flag,
            worker: Some(worker),
        })
    }

    /// Stop capture and release every resource. Idempotent.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("capture worker panicked during shutdown");
            }
        }
        if self.stream.take().is_some() {
            info!("audio capture stopped");
        }
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the frame-processing thread: drain the ring buffer in fixed-size
/// frames, process each, and emit downstream.
fn spawn_frame_worker(
    mut consumer: AudioConsumer,
    native_rate: u32,
    target_rate: u32,
    frame_tx: UnboundedSender<CaptureFrame>,
    stop_flag: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let frame_ms = (FRAME_SAMPLES as u64 * 1000) / native_rate as u64;
        let mut buf = vec![0.0f32; FRAME_SAMPLES];
        while !stop_flag.load(Ordering::SeqCst) {
            if consumer.available() < FRAME_SAMPLES {
                std::thread::sleep(Duration::from_millis(5));
                continue;
            }
            let read = consumer.pop_slice(&mut buf);
            let frame = process_frame(&buf[..read], native_rate, target_rate, frame_ms);
            if frame_tx.send(frame).is_err() {
                // Receiver gone; session torn down.
                break;
            }
        }
    })
}

/// Process one native-rate frame into its transport form.
fn process_frame(samples: &[f32], native_rate: u32, target_rate: u32, frame_ms: u64) -> CaptureFrame {
    let volume = rms_volume(samples);
    let resampled = downsample_block_avg(samples, native_rate, target_rate);
    let pcm = pcm16_encode(&resampled);
    CaptureFrame {
        encoded: encode_frame_base64(&pcm),
        volume,
        duration_ms: frame_ms,
    }
}
