//! Core history data types produced by the external training loop.
//!
//! These types are read-only inputs to every figure, table and animation in
//! the crate. Field names match the JSON emitted by the training notebook so a
//! run file can be deserialized without any renaming.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// The two advantage-estimation strategies being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Advantage = reward - global running baseline.
    Absolute,
    /// Advantage = z-score of the reward within its prompt group.
    Relative,
}

impl Method {
    /// Human-readable label used in figure titles and console output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Absolute => "Absolute Baseline",
            Self::Relative => "Group Relative",
        }
    }

    /// Short label used in legends.
    pub fn short_label(&self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::Relative => "Relative",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Rollout
// ---------------------------------------------------------------------------

/// One sampled trajectory for a prompt, together with its scalar reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    /// Identifier of the prompt this rollout answered.
    pub prompt_id: u64,
    /// The prompt text.
    pub prompt: String,
    /// The action (strategy) the policy chose.
    pub action: String,
    /// The produced transcript.
    pub transcript: String,
    /// Ground-truth answer the transcript is judged against.
    pub correct_answer: String,
    /// Observed reward from the reward model.
    pub reward: f64,
}

// ---------------------------------------------------------------------------
// Per-step statistics
// ---------------------------------------------------------------------------

/// Aggregate statistics recorded once per training step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// One-based training step number.
    pub step: usize,
    /// Mean observed reward across the step's rollouts.
    pub avg_reward: f64,
    /// Running baseline. Only the absolute method records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    /// Fraction of rollouts judged correct.
    pub correctness_rate: f64,
    /// Mean advantage used for the update.
    pub mean_adv: f64,
    /// Standard deviation of the advantages used for the update.
    pub std_adv: f64,
}

impl StepStats {
    /// The recorded baseline, treating a missing one as zero.
    ///
    /// [`super::ComparisonRun::validate`] guarantees the absolute track always
    /// carries a baseline, so the fallback only affects the relative track.
    pub fn baseline_or_zero(&self) -> f64 {
        self.baseline.unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Policy distribution
// ---------------------------------------------------------------------------

/// Probability of each action at one training step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyDistribution(HashMap<String, f64>);

impl PolicyDistribution {
    /// Build a distribution from `(action, probability)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(|(a, p)| (a.into(), p)).collect())
    }

    /// Probability of `action`, or 0.0 when the action is absent.
    pub fn prob(&self, action: &str) -> f64 {
        self.0.get(action).copied().unwrap_or(0.0)
    }

    /// Probabilities in the order given by `actions`.
    pub fn ordered(&self, actions: &[String]) -> Vec<f64> {
        actions.iter().map(|a| self.prob(a)).collect()
    }

    /// Sum of all recorded probabilities.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Number of actions with a recorded probability.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no probability is recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Method history
// ---------------------------------------------------------------------------

/// The full recorded history of one method, aligned by training step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodHistory {
    /// Policy distribution after each step.
    pub policies: Vec<PolicyDistribution>,
    /// Statistics of each step.
    pub stats: Vec<StepStats>,
    /// Rollouts sampled at each step.
    #[serde(default)]
    pub rollouts: Vec<Vec<Rollout>>,
}

impl MethodHistory {
    /// Number of recorded steps (length of the statistics history).
    pub fn num_steps(&self) -> usize {
        self.stats.len()
    }

    /// Rollouts of step `index`, if recorded.
    pub fn step_rollouts(&self, index: usize) -> Option<&[Rollout]> {
        self.rollouts.get(index).map(Vec::as_slice)
    }

    /// Statistics of step `index`, if recorded.
    pub fn step_stats(&self, index: usize) -> Option<&StepStats> {
        self.stats.get(index)
    }

    /// Step numbers as recorded in the statistics.
    pub fn step_numbers(&self) -> Vec<usize> {
        self.stats.iter().map(|s| s.step).collect()
    }

    /// Average reward of the first and last steps, if any step was recorded.
    pub fn reward_endpoints(&self) -> Option<(f64, f64)> {
        let first = self.stats.first()?;
        let last = self.stats.last()?;
        Some((first.avg_reward, last.avg_reward))
    }

    /// Total number of rollouts across all steps.
    pub fn total_rollouts(&self) -> usize {
        self.rollouts.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_labels() {
        assert_eq!(Method::Absolute.label(), "Absolute Baseline");
        assert_eq!(Method::Relative.to_string(), "Group Relative");
        assert_eq!(Method::Relative.short_label(), "Relative");
    }

    #[test]
    fn test_policy_missing_action_is_zero() {
        let policy = PolicyDistribution::from_pairs([("guess", 0.25), ("reason", 0.75)]);
        assert_eq!(policy.prob("guess"), 0.25);
        assert_eq!(policy.prob("unknown"), 0.0);
        let ordered = policy.ordered(&["reason".to_string(), "skip".to_string()]);
        assert_eq!(ordered, vec![0.75, 0.0]);
        assert!((policy.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_stats_json_keys() {
        let json = r#"{"step":1,"avg_reward":0.5,"correctness_rate":0.25,"mean_adv":0.0,"std_adv":1.0}"#;
        let stats: StepStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.baseline, None);
        assert_eq!(stats.baseline_or_zero(), 0.0);

        let with_baseline = r#"{"step":2,"avg_reward":0.5,"baseline":0.3,"correctness_rate":0.25,"mean_adv":0.2,"std_adv":0.1}"#;
        let stats: StepStats = serde_json::from_str(with_baseline).unwrap();
        assert_eq!(stats.baseline, Some(0.3));
    }

    #[test]
    fn test_reward_endpoints() {
        let mut history = MethodHistory::default();
        assert!(history.reward_endpoints().is_none());
        for (i, r) in [0.1, 0.4, 0.7].iter().enumerate() {
            history.stats.push(StepStats {
                step: i + 1,
                avg_reward: *r,
                baseline: Some(0.0),
                correctness_rate: 0.5,
                mean_adv: 0.0,
                std_adv: 1.0,
            });
        }
        assert_eq!(history.reward_endpoints(), Some((0.1, 0.7)));
        assert_eq!(history.step_numbers(), vec![1, 2, 3]);
    }
}
