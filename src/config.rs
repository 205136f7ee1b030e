use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete configuration for rendering and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    pub figures: FigureConfig,
    pub animation: AnimationConfig,
    pub timer: TimerDefaults,
}

/// Pixel sizes of the static figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FigureConfig {
    /// Four-panel training summary (default: 1400x1000).
    pub summary_size: (u32, u32),
    /// Six-panel step detail view (default: 1600x1000).
    pub detail_size: (u32, u32),
    /// Number of histogram bins in the detail view (default: 20).
    pub detail_bins: usize,
}

/// Training comparison animation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Frames per second (default: 8).
    pub fps: u32,
    /// Frame size in pixels (default: 1600x1000).
    pub frame_size: (u32, u32),
    /// Number of histogram bins (default: 20).
    pub bins: usize,
    /// Fixed advantage range of the histogram panel (default: [-3, 3]).
    pub advantage_range: (f64, f64),
    /// Rollouts drawn per method for the text panel (default: 3).
    pub sample_size: usize,
    /// Sampled rollouts actually listed per method (default: 2).
    pub samples_shown: usize,
    /// Prompt characters shown per sampled rollout (default: 30).
    pub prompt_chars: usize,
    /// Seed mixed with the frame index for rollout sampling.
    pub seed: u64,
    /// Video bitrate handed to ffmpeg, in kbit/s (default: 1800).
    pub bitrate_kbps: u32,
    /// Executable used for non-GIF video export (default: "ffmpeg").
    pub ffmpeg: String,
}

/// Default countdown timer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerDefaults {
    /// Duration in minutes (default: 15).
    pub minutes: f64,
    /// Spoken warning this many minutes before the end (default: 5).
    pub warn_minutes: f64,
    /// Label shown before the remaining time.
    pub title: String,
    /// Spoken when the countdown reaches zero.
    pub end_message: String,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            figures: FigureConfig::default(),
            animation: AnimationConfig::default(),
            timer: TimerDefaults::default(),
        }
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            summary_size: (1400, 1000),
            detail_size: (1600, 1000),
            detail_bins: 20,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 8,
            frame_size: (1600, 1000),
            bins: 20,
            advantage_range: (-3.0, 3.0),
            sample_size: 3,
            samples_shown: 2,
            prompt_chars: 30,
            seed: 0x5EED,
            bitrate_kbps: 1800,
            ffmpeg: "ffmpeg".into(),
        }
    }
}

impl Default for TimerDefaults {
    fn default() -> Self {
        Self {
            minutes: 15.0,
            warn_minutes: 5.0,
            title: "⏱️ Timer".into(),
            end_message: "Exercise time finished".into(),
        }
    }
}

impl VizConfig {
    /// Load a configuration file; missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: VizConfig =
            serde_json::from_str(r#"{"animation": {"fps": 12}, "timer": {"minutes": 3}}"#).unwrap();
        assert_eq!(config.animation.fps, 12);
        assert_eq!(config.animation.bins, 20);
        assert_eq!(config.animation.advantage_range, (-3.0, 3.0));
        assert_eq!(config.timer.minutes, 3.0);
        assert_eq!(config.timer.warn_minutes, 5.0);
        assert_eq!(config.figures.summary_size, (1400, 1000));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viz.json");
        std::fs::write(&path, r#"{"figures": {"detail_bins": 10}}"#).unwrap();
        let config = VizConfig::load_from_file(&path).unwrap();
        assert_eq!(config.figures.detail_bins, 10);
        assert_eq!(config.animation.ffmpeg, "ffmpeg");

        assert!(VizConfig::load_from_file(&dir.path().join("missing.json")).is_err());
    }
}
