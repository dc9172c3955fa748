//! Configuration reading and turn-coordination tunables.

pub mod paths;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

/// Named tunables for the turn-coordination engine.
///
/// Defaults tolerate thinking pauses without forcing a premature turn-end,
/// while bounding worst-case end-of-turn latency at `hard_end_ms`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTuning {
    /// Continuous speech required before a turn opens (debounces noise).
    pub speech_start_ms: u64,
    /// Silence tolerated mid-turn before a soft commit fires.
    pub pause_tolerance_ms: u64,
    /// Silence after which a commit fires unconditionally.
    pub hard_end_ms: u64,
    /// Minimum accumulated speech for a soft commit.
    pub min_speech_ms: u64,
    /// Minimum interval between accepted answer commits.
    pub debounce_ms: u64,
    /// Capture pipeline output rate (Hz).
    pub sample_rate: u32,
    /// Playback rate for inbound AI audio (Hz).
    pub playback_rate: u32,
}

impl Default for TurnTuning {
    fn default() -> Self {
        Self {
            speech_start_ms: 200,
            pause_tolerance_ms: 2500,
            hard_end_ms: 5000,
            min_speech_ms: 1500,
            debounce_ms: 2000,
            sample_rate: 16_000,
            playback_rate: 24_000,
        }
    }
}

/// Top-level interview_voice.json shape (written by the host application).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    #[serde(default)]
    pub input_device: Option<String>,
    #[serde(default)]
    pub tuning: TurnTuning,
}

/// Read interview_voice.json from the data directory.
pub fn read_core_config() -> CoreConfig {
    let path = get_config_path();
    read_json_file(&path).unwrap_or_default()
}

/// Path to interview_voice.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("interview_voice.json")
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_defaults() {
        let t = TurnTuning::default();
        assert_eq!(t.speech_start_ms, 200);
        assert_eq!(t.pause_tolerance_ms, 2500);
        assert_eq!(t.hard_end_ms, 5000);
        assert_eq!(t.min_speech_ms, 1500);
        assert_eq!(t.debounce_ms, 2000);
        assert_eq!(t.sample_rate, 16_000);
        assert_eq!(t.playback_rate, 24_000);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: CoreConfig =
            serde_json::from_str(r#"{"tuning": {"pause_tolerance_ms": 1800}}"#).unwrap();
        assert_eq!(cfg.tuning.pause_tolerance_ms, 1800);
        assert_eq!(cfg.tuning.hard_end_ms, 5000);
        assert!(cfg.input_device.is_none());
    }
}
