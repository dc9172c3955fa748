//! Per-frame audio processing: loudness, resampling, PCM16 transport coding.
//!
//! Pure functions shared by the capture pipeline (outbound) and the playback
//! scheduler (inbound). All audio is mono f32 in [-1.0, 1.0] internally and
//! signed 16-bit little-endian PCM, base64-encoded, on the wire.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::CoreError;

/// Compute RMS loudness and map it to a bounded 0-100 UI meter value.
pub fn rms_volume(samples: &[f32]) -> u8 {
    if samples.is_empty() {
        return 0;
    }
    let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = mean_sq.sqrt();
    // Typical speech sits around 0.05-0.25 RMS; 400x lands that in 20-100.
    (rms * 400.0).min(100.0) as u8
}

/// Downsample mono samples from `from_rate` to `to_rate` by block averaging.
///
/// Each output slot averages the input samples that map onto it, handling
/// non-integer ratios by letting slot boundaries fall mid-sample. Output
/// length is `round(n * to_rate / from_rate)`.
pub fn downsample_block_avg(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).round() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let start = ((i as f64) * ratio) as usize;
        let end = (((i + 1) as f64) * ratio).ceil() as usize;
        let start = start.min(input.len() - 1);
        let end = end.clamp(start + 1, input.len());
        let block = &input[start..end];
        output.push(block.iter().sum::<f32>() / block.len() as f32);
    }
    output
}

/// Convert f32 samples to signed 16-bit little-endian PCM bytes.
pub fn pcm16_encode(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let pcm = (clamped * 32767.0) as i16;
        bytes.extend_from_slice(&pcm.to_le_bytes());
    }
    bytes
}

/// Convert signed 16-bit little-endian PCM bytes back to normalized f32.
///
/// Fails with [`CoreError::MalformedChunk`] on an odd-length buffer.
pub fn pcm16_decode(bytes: &[u8]) -> Result<Vec<f32>, CoreError> {
    if bytes.len() % 2 != 0 {
        return Err(CoreError::MalformedChunk(format!(
            "odd PCM16 byte length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}

/// Base64-encode a PCM16 byte buffer for transport.
pub fn encode_frame_base64(pcm: &[u8]) -> String {
    BASE64.encode(pcm)
}

/// Decode a base64 transport payload into PCM16 bytes.
pub fn decode_frame_base64(payload: &str) -> Result<Vec<u8>, CoreError> {
    BASE64
        .decode(payload)
        .map_err(|e| CoreError::MalformedChunk(format!("base64: {e}")))
}
