//! Frame-by-frame comparison of the two methods over training.
//!
//! Every frame is derived from the histories on demand ([`ComparisonAnimation::frame`]),
//! so frames can be rendered individually, written as PNGs, encoded into a GIF
//! directly, or handed to `ffmpeg` for other video formats.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, ensure, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    bar_panel, histogram_panel, line_panel, step_range, text_panel, Axes, BarFill, Bars,
    DrawResult, Guide, Line, ABSOLUTE_COLOR, BASELINE_COLOR, GAIN_COLOR, LOSS_COLOR,
    RELATIVE_COLOR,
};
use crate::analysis::{Histogram, MethodStep};
use crate::config::AnimationConfig;
use crate::history::{Method, MethodHistory, Rollout};
use crate::toolkit::{GroupAdvantage, Toolkit};

pub const VIDEO_ARTIST: &str = "RL Comparison";
pub const FFMPEG_MISSING_NOTICE: &str =
    "FFmpeg not available. Install ffmpeg to save videos, or use a .gif output path.";

/// Everything drawn in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub frame: usize,
    pub absolute_policy: Vec<f64>,
    pub relative_policy: Vec<f64>,
    /// Relative minus absolute probability per action.
    pub policy_diff: Vec<f64>,
    /// Step numbers up to and including this frame.
    pub steps: Vec<f64>,
    pub absolute_rewards: Vec<f64>,
    pub absolute_baselines: Vec<f64>,
    pub relative_rewards: Vec<f64>,
    /// Advantage histograms (absolute, relative); `None` when the step has no
    /// rollouts.
    pub histograms: Option<(Histogram, Histogram)>,
    /// Sampled rollout listing; `None` when the step has no rollouts.
    pub samples: Option<String>,
}

/// Outcome of [`ComparisonAnimation::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// The external encoder could not be launched; nothing was written.
    EncoderUnavailable,
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved(path) => write!(f, "Video saved to {}", path.display()),
            Self::EncoderUnavailable => f.write_str(FFMPEG_MISSING_NOTICE),
        }
    }
}

/// Renders one frame per recorded policy step.
pub struct ComparisonAnimation<'a> {
    absolute: &'a MethodHistory,
    relative: &'a MethodHistory,
    actions: Vec<String>,
    normalizer: &'a dyn GroupAdvantage,
    config: AnimationConfig,
    diff_limit: f64,
}

impl fmt::Debug for ComparisonAnimation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonAnimation")
            .field("frames", &self.num_frames())
            .field("actions", &self.actions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

impl<'a> ComparisonAnimation<'a> {
    /// Actions and the group normalizer are resolved before anything else.
    pub fn new(
        absolute: &'a MethodHistory,
        relative: &'a MethodHistory,
        toolkit: &'a Toolkit,
        config: AnimationConfig,
    ) -> Result<Self> {
        let actions = toolkit.require_actions()?.to_vec();
        let normalizer = toolkit.require_group_advantage()?;
        ensure!(config.fps > 0, "animation fps must be positive");

        let diff_limit = absolute
            .policies
            .iter()
            .zip(&relative.policies)
            .flat_map(|(a, r)| {
                actions
                    .iter()
                    .map(move |act| (r.prob(act) - a.prob(act)).abs())
            })
            .fold(0.5_f64, f64::max);

        Ok(Self {
            absolute,
            relative,
            actions,
            normalizer,
            config,
            diff_limit: diff_limit * 1.1,
        })
    }

    pub fn num_frames(&self) -> usize {
        self.absolute.policies.len().min(self.relative.policies.len())
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    /// Per-frame delay in milliseconds.
    pub fn frame_delay_ms(&self) -> u32 {
        1000 / self.config.fps.max(1)
    }

    /// Derive the contents of frame `i`.
    pub fn frame(&self, i: usize) -> Result<FrameState> {
        ensure!(
            i < self.num_frames(),
            "frame {i} out of range ({} frames)",
            self.num_frames()
        );
        let absolute_policy = self.absolute.policies[i].ordered(&self.actions);
        let relative_policy = self.relative.policies[i].ordered(&self.actions);
        let policy_diff = relative_policy
            .iter()
            .zip(&absolute_policy)
            .map(|(r, a)| r - a)
            .collect();

        let abs_stats = &self.absolute.stats[..(i + 1).min(self.absolute.stats.len())];
        let rel_stats = &self.relative.stats[..(i + 1).min(self.relative.stats.len())];
        let steps = abs_stats.iter().map(|s| s.step as f64).collect();
        let absolute_rewards = abs_stats.iter().map(|s| s.avg_reward).collect();
        let absolute_baselines = abs_stats.iter().map(|s| s.baseline_or_zero()).collect();
        let relative_rewards = rel_stats.iter().map(|s| s.avg_reward).collect();

        let (histograms, samples) = self.rollout_panels(i)?.unzip();

        Ok(FrameState {
            frame: i,
            absolute_policy,
            relative_policy,
            policy_diff,
            steps,
            absolute_rewards,
            absolute_baselines,
            relative_rewards,
            histograms,
            samples,
        })
    }

    fn rollout_panels(&self, i: usize) -> Result<Option<((Histogram, Histogram), String)>> {
        let abs = MethodStep::compute(Method::Absolute, self.absolute, i, self.normalizer)?;
        let rel = MethodStep::compute(Method::Relative, self.relative, i, self.normalizer)?;
        let (Some(abs), Some(rel)) = (abs, rel) else {
            return Ok(None);
        };
        if abs.rollouts.is_empty() {
            return Ok(None);
        }

        let (lo, hi) = self.config.advantage_range;
        let bins = self.config.bins;
        let histograms = (
            Histogram::from_samples(&abs.advantages, bins, lo, hi),
            Histogram::from_samples(&rel.advantages, bins, lo, hi),
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed ^ i as u64);
        let mut text = format!("Step {} - Sample Rollouts:\n\n", i + 1);
        text.push_str("ABSOLUTE BASELINE:\n");
        for line in self.sample_lines(abs.rollouts, &mut rng) {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str("\nGROUP RELATIVE:\n");
        for line in self.sample_lines(rel.rollouts, &mut rng) {
            text.push_str(&line);
            text.push('\n');
        }
        Ok(Some((histograms, text)))
    }

    fn sample_lines(&self, rollouts: &[Rollout], rng: &mut StdRng) -> Vec<String> {
        rollouts
            .choose_multiple(rng, self.config.sample_size)
            .take(self.config.samples_shown)
            .enumerate()
            .map(|(n, r)| {
                format!(
                    "  {}. Action: {:<15} | Reward: {:6.3} | Prompt: {}...",
                    n + 1,
                    r.action,
                    r.reward,
                    truncate_chars(&r.prompt, self.config.prompt_chars)
                )
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    /// Draw `state` onto `root` as a 3x3 grid.
    pub fn draw_frame<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
        state: &FrameState,
    ) -> DrawResult<(), DB> {
        root.fill(&WHITE)?;
        let rows = root.split_evenly((3, 1));
        let top = rows[0].split_evenly((1, 3));
        let middle = rows[1].split_evenly((1, 3));
        let step = state.frame + 1;

        let abs_title = format!("{} Policy (Step {step})", Method::Absolute.label());
        let rel_title = format!("{} Policy (Step {step})", Method::Relative.label());
        for (area, title, values, color) in [
            (&top[0], &abs_title, &state.absolute_policy, ABSOLUTE_COLOR),
            (&top[1], &rel_title, &state.relative_policy, RELATIVE_COLOR),
        ] {
            bar_panel(
                area,
                Axes {
                    title,
                    x_desc: "Action",
                    y_desc: "Probability",
                },
                &self.actions,
                0.0..1.0,
                &[Bars {
                    label: "Policy",
                    values: values.clone(),
                    fill: BarFill::Solid(color),
                }],
                &[],
            )?;
        }
        bar_panel(
            &top[2],
            Axes {
                title: "Policy Difference (Relative - Absolute)",
                x_desc: "Action",
                y_desc: "Probability Difference",
            },
            &self.actions,
            -self.diff_limit..self.diff_limit,
            &[Bars {
                label: "Difference",
                values: state.policy_diff.clone(),
                fill: BarFill::Signed(GAIN_COLOR, LOSS_COLOR),
            }],
            &[Guide::zero_h()],
        )?;

        let x = step_range(&self.absolute.step_numbers());
        let along = |values: &[f64]| -> Vec<(f64, f64)> {
            state.steps.iter().copied().zip(values.iter().copied()).collect()
        };
        line_panel(
            &middle[0],
            Axes {
                title: "Absolute Baseline: Reward & Baseline",
                x_desc: "Training Step",
                y_desc: "Value",
            },
            x.clone(),
            -1.1..1.1,
            &[
                Line::new("Avg Reward", along(&state.absolute_rewards), ABSOLUTE_COLOR),
                Line::new("Baseline", along(&state.absolute_baselines), BASELINE_COLOR).thin(),
            ],
            &[],
        )?;
        line_panel(
            &middle[1],
            Axes {
                title: "Group Relative: Reward",
                x_desc: "Training Step",
                y_desc: "Avg Reward",
            },
            x,
            -1.1..1.1,
            &[Line::new(
                "Avg Reward",
                along(&state.relative_rewards),
                RELATIVE_COLOR,
            )],
            &[],
        )?;

        let (lo, hi) = self.config.advantage_range;
        let empty = Histogram::from_samples(&[], self.config.bins, lo, hi);
        let (abs_hist, rel_hist) = match &state.histograms {
            Some((a, r)) => (a, r),
            None => (&empty, &empty),
        };
        histogram_panel(
            &middle[2],
            Axes {
                title: "Advantage Distributions",
                x_desc: "Advantage",
                y_desc: "Count",
            },
            &[
                (Method::Absolute.short_label(), abs_hist, ABSOLUTE_COLOR),
                (Method::Relative.short_label(), rel_hist, RELATIVE_COLOR),
            ],
            &[Guide::zero_v()],
        )?;

        text_panel(&rows[2], state.samples.as_deref().unwrap_or(""))
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Render frame `i` to a PNG at `path`.
    pub fn render_frame(&self, i: usize, path: &Path) -> Result<()> {
        let state = self.frame(i)?;
        let root = BitMapBackend::new(path, self.config.frame_size).into_drawing_area();
        self.draw_frame(&root, &state)
            .map_err(|e| anyhow!("Failed to draw frame {i}: {e}"))?;
        root.present()
            .map_err(|e| anyhow!("Failed to write frame {i} to {}: {e}", path.display()))?;
        Ok(())
    }

    /// Render every frame into `dir` as `frame_00000.png`, `frame_00001.png`, ...
    pub fn save_frames(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let mut paths = Vec::with_capacity(self.num_frames());
        for i in 0..self.num_frames() {
            let path = dir.join(format!("frame_{i:05}.png"));
            self.render_frame(i, &path)?;
            paths.push(path);
        }
        debug!(dir = %dir.display(), frames = paths.len(), "Rendered frames");
        Ok(paths)
    }

    /// Write the animation to `path`. `.gif` is encoded in-process; any other
    /// extension goes through `ffmpeg`, and is skipped with a notice when
    /// `ffmpeg` cannot be launched.
    pub fn save(&self, path: &Path) -> Result<SaveOutcome> {
        ensure!(self.num_frames() > 0, "no policy steps to animate");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"));
        if is_gif {
            self.save_gif(path)?;
        } else {
            if !self.ffmpeg_available() {
                warn!(encoder = %self.config.ffmpeg, "Skipping video export");
                let outcome = SaveOutcome::EncoderUnavailable;
                println!("{outcome}");
                return Ok(outcome);
            }
            self.save_video(path)?;
        }
        let outcome = SaveOutcome::Saved(path.to_path_buf());
        println!("{outcome}");
        Ok(outcome)
    }

    fn save_gif(&self, path: &Path) -> Result<()> {
        let root = BitMapBackend::gif(path, self.config.frame_size, self.frame_delay_ms())
            .with_context(|| format!("Failed to open {}", path.display()))?
            .into_drawing_area();
        for i in 0..self.num_frames() {
            let state = self.frame(i)?;
            self.draw_frame(&root, &state)
                .map_err(|e| anyhow!("Failed to draw frame {i}: {e}"))?;
            root.present()
                .map_err(|e| anyhow!("Failed to encode frame {i}: {e}"))?;
        }
        info!(path = %path.display(), frames = self.num_frames(), "Encoded GIF");
        Ok(())
    }

    fn ffmpeg_available(&self) -> bool {
        Command::new(&self.config.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn ffmpeg_args(&self, frames_dir: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-framerate".into(),
            self.config.fps.to_string(),
            "-i".into(),
            frames_dir.join("frame_%05d.png").display().to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-b:v".into(),
            format!("{}k", self.config.bitrate_kbps),
            "-metadata".into(),
            format!("artist={VIDEO_ARTIST}"),
            output.display().to_string(),
        ]
    }

    fn save_video(&self, path: &Path) -> Result<()> {
        let frames_dir =
            std::env::temp_dir().join(format!("advscope-frames-{}", Uuid::new_v4().simple()));
        let result = self.save_frames(&frames_dir).and_then(|_| {
            Command::new(&self.config.ffmpeg)
                .args(self.ffmpeg_args(&frames_dir, path))
                .status()
                .with_context(|| format!("Failed to run {}", self.config.ffmpeg))
        });
        if let Err(e) = fs::remove_dir_all(&frames_dir) {
            warn!(dir = %frames_dir.display(), error = %e, "Failed to remove frame directory");
        }
        let status = result?;
        if !status.success() {
            bail!("{} exited with {status} while encoding {}", self.config.ffmpeg, path.display());
        }
        info!(path = %path.display(), frames = self.num_frames(), "Encoded video");
        Ok(())
    }
}

/// Build the comparison animation and, when `output` is given, save it.
pub fn animate_training_comparison<'a>(
    absolute: &'a MethodHistory,
    relative: &'a MethodHistory,
    toolkit: &'a Toolkit,
    config: AnimationConfig,
    output: Option<&Path>,
) -> Result<ComparisonAnimation<'a>> {
    let animation = ComparisonAnimation::new(absolute, relative, toolkit, config)?;
    info!(
        frames = animation.num_frames(),
        fps = animation.config().fps,
        "Created comparison animation"
    );
    if let Some(path) = output {
        animation.save(path)?;
    }
    Ok(animation)
}
