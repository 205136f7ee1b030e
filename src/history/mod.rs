//! Training histories for the two compared methods.
//!
//! This module provides:
//! - [`types::Rollout`], [`types::StepStats`], [`types::PolicyDistribution`] --
//!   the per-step records written by the external training loop.
//! - [`types::MethodHistory`] -- one method's records aligned by step.
//! - [`ComparisonRun`] -- the run file holding both tracks plus the optional
//!   action list, drift step and reward-noise map.

pub mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use types::{Method, MethodHistory, PolicyDistribution, Rollout, StepStats};

/// Allowed deviation of a policy's probability mass from 1.
const POLICY_SUM_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Reward noise correction
// ---------------------------------------------------------------------------

/// Affine noise the reward model applied to one prompt:
/// `observed = raw * scale + bias`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct NoiseCorrection {
    pub scale: f64,
    pub bias: f64,
}

impl NoiseCorrection {
    pub fn new(scale: f64, bias: f64) -> Self {
        Self { scale, bias }
    }

    /// Reconstruct the unobserved raw reward from an observed one.
    ///
    /// A non-positive scale cannot be inverted, so the observed reward is
    /// returned unchanged.
    pub fn raw_reward(&self, observed: f64) -> f64 {
        if self.scale > 0.0 {
            (observed - self.bias) / self.scale
        } else {
            observed
        }
    }
}

impl From<(f64, f64)> for NoiseCorrection {
    fn from((scale, bias): (f64, f64)) -> Self {
        Self { scale, bias }
    }
}

impl From<NoiseCorrection> for (f64, f64) {
    fn from(n: NoiseCorrection) -> Self {
        (n.scale, n.bias)
    }
}

/// Per-prompt noise corrections keyed by prompt id.
pub type NoiseMap = HashMap<u64, NoiseCorrection>;

// ---------------------------------------------------------------------------
// Comparison run
// ---------------------------------------------------------------------------

/// Everything the training notebook exports for one comparison run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonRun {
    /// Ordered action names, when the exporter recorded them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    /// Step at which the reward model's distribution shifted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_step: Option<usize>,
    /// Per-prompt reward noise applied by the reward model.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub reward_noise: NoiseMap,
    /// Absolute-baseline track.
    pub absolute: MethodHistory,
    /// Group-relative track.
    pub relative: MethodHistory,
}

impl ComparisonRun {
    /// Load and validate a run file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run file {}", path.display()))?;
        let run: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse run file {}", path.display()))?;
        run.validate()
            .with_context(|| format!("Invalid run file {}", path.display()))?;
        debug!(
            path = %path.display(),
            steps = run.num_steps(),
            absolute_rollouts = run.absolute.total_rollouts(),
            relative_rollouts = run.relative.total_rollouts(),
            "Loaded comparison run"
        );
        Ok(run)
    }

    /// Persist the run as pretty-printed JSON.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run file {}", path.display()))?;
        Ok(())
    }

    /// Number of aligned steps.
    pub fn num_steps(&self) -> usize {
        self.absolute.num_steps()
    }

    /// The history of `method`.
    pub fn track(&self, method: Method) -> &MethodHistory {
        match method {
            Method::Absolute => &self.absolute,
            Method::Relative => &self.relative,
        }
    }

    /// Check the structural invariants every consumer relies on.
    ///
    /// Hard errors: misaligned stats/policy histories, or an absolute step
    /// without a baseline. Soft issues (policy mass off by more than the
    /// tolerance, rollout histories shorter than the stats) are logged.
    pub fn validate(&self) -> Result<()> {
        for (method, track) in [
            (Method::Absolute, &self.absolute),
            (Method::Relative, &self.relative),
        ] {
            if track.policies.len() != track.stats.len() {
                bail!(
                    "{method}: {} policy entries but {} statistics entries",
                    track.policies.len(),
                    track.stats.len()
                );
            }
            if track.rollouts.len() < track.stats.len() {
                warn!(
                    method = method.short_label(),
                    rollout_steps = track.rollouts.len(),
                    stat_steps = track.stats.len(),
                    "Rollout history is shorter than statistics history"
                );
            }
            for (i, policy) in track.policies.iter().enumerate() {
                let total = policy.total();
                if (total - 1.0).abs() > POLICY_SUM_TOLERANCE {
                    warn!(
                        method = method.short_label(),
                        step = i,
                        total,
                        "Policy probabilities do not sum to 1"
                    );
                }
            }
        }

        if self.absolute.num_steps() != self.relative.num_steps() {
            bail!(
                "absolute track has {} steps but relative track has {}",
                self.absolute.num_steps(),
                self.relative.num_steps()
            );
        }

        if let Some(i) = self.absolute.stats.iter().position(|s| s.baseline.is_none()) {
            bail!("absolute step index {i} has no baseline");
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-built histories shared by tests across the crate.

    use super::*;

    pub fn actions() -> Vec<String> {
        ["direct", "chain_of_thought", "guess"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn rollout(prompt_id: u64, action: &str, reward: f64) -> Rollout {
        Rollout {
            prompt_id,
            prompt: format!("What is {prompt_id} + {prompt_id}? Answer with a number only."),
            action: action.to_string(),
            transcript: format!("The answer is {}", prompt_id * 2),
            correct_answer: (prompt_id * 2).to_string(),
            reward,
        }
    }

    pub fn stats(step: usize, avg_reward: f64, baseline: Option<f64>) -> StepStats {
        StepStats {
            step,
            avg_reward,
            baseline,
            correctness_rate: 0.5,
            mean_adv: 0.0,
            std_adv: 1.0,
        }
    }

    /// Two-step run with two prompts per step.
    pub fn run() -> ComparisonRun {
        let step_rollouts = |shift: f64| {
            vec![
                rollout(1, "direct", 0.2 + shift),
                rollout(2, "chain_of_thought", 0.9 + shift),
                rollout(1, "guess", -0.4 + shift),
                rollout(2, "direct", 0.5 + shift),
                rollout(1, "chain_of_thought", 0.8 + shift),
            ]
        };
        let policy = |d: f64, c: f64| {
            PolicyDistribution::from_pairs([
                ("direct", d),
                ("chain_of_thought", c),
                ("guess", 1.0 - d - c),
            ])
        };
        ComparisonRun {
            actions: Some(actions()),
            drift_step: Some(2),
            reward_noise: NoiseMap::new(),
            absolute: MethodHistory {
                policies: vec![policy(0.4, 0.3), policy(0.35, 0.45)],
                stats: vec![stats(1, 0.1, Some(0.0)), stats(2, 0.3, Some(0.05))],
                rollouts: vec![step_rollouts(0.0), step_rollouts(0.1)],
            },
            relative: MethodHistory {
                policies: vec![policy(0.4, 0.3), policy(0.3, 0.6)],
                stats: vec![stats(1, 0.15, None), stats(2, 0.45, None)],
                rollouts: vec![step_rollouts(0.0), step_rollouts(0.2)],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_raw_reward() {
        let noise = NoiseCorrection::new(2.0, 0.5);
        assert!((noise.raw_reward(1.5) - 0.5).abs() < 1e-12);

        let degenerate = NoiseCorrection::new(0.0, 0.5);
        assert_eq!(degenerate.raw_reward(1.5), 1.5);
        let negative = NoiseCorrection::new(-1.0, 0.5);
        assert_eq!(negative.raw_reward(-0.25), -0.25);
    }

    #[test]
    fn test_noise_map_from_json_pairs() {
        let map: NoiseMap = serde_json::from_str(r#"{"3": [1.5, -0.2], "7": [0.0, 0.1]}"#).unwrap();
        assert_eq!(map[&3], NoiseCorrection::new(1.5, -0.2));
        assert_eq!(map[&7].scale, 0.0);
    }

    #[test]
    fn test_fixture_validates() {
        fixtures::run().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_missing_baseline() {
        let mut run = fixtures::run();
        run.absolute.stats[1].baseline = None;
        let err = run.validate().unwrap_err();
        assert!(err.to_string().contains("no baseline"));
    }

    #[test]
    fn test_validate_rejects_misaligned_tracks() {
        let mut run = fixtures::run();
        run.relative.stats.pop();
        assert!(run.validate().is_err());
        run.relative.policies.pop();
        let err = run.validate().unwrap_err();
        assert!(err.to_string().contains("relative track"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("run.json");
        let mut run = fixtures::run();
        run.reward_noise.insert(1, NoiseCorrection::new(1.2, 0.1));
        run.save_to_file(&path).unwrap();

        let loaded = ComparisonRun::load_from_file(&path).unwrap();
        assert_eq!(loaded.num_steps(), 2);
        assert_eq!(loaded.actions, run.actions);
        assert_eq!(loaded.reward_noise[&1], NoiseCorrection::new(1.2, 0.1));
        assert_eq!(loaded.relative.rollouts[1][3], run.relative.rollouts[1][3]);
    }
}
