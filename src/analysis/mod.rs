//! Numeric derivations shared by the figures and text reports.
//!
//! Nothing here mutates a history: every value is recomputed from the
//! recorded rollouts and discarded after rendering.

pub mod advantage;
pub mod stats;

use std::collections::HashMap;

use anyhow::Result;

use crate::history::{Method, MethodHistory, Rollout};
use crate::toolkit::GroupAdvantage;

pub use advantage::{
    absolute_advantages, compute_group_advantages, group_by_prompt, relative_advantages,
    step_advantages,
};
pub use stats::{describe, mean, std_dev, Histogram, Summary};

/// Rewards and recomputed advantages of one method at one step.
#[derive(Debug, Clone)]
pub struct MethodStep<'a> {
    pub method: Method,
    pub rollouts: &'a [Rollout],
    pub rewards: Vec<f64>,
    pub advantages: Vec<f64>,
    /// Global baseline (absolute method only).
    pub baseline: Option<f64>,
}

impl<'a> MethodStep<'a> {
    /// Recompute step `index` of `history`. Returns `Ok(None)` when the step
    /// has no recorded rollouts or statistics.
    pub fn compute(
        method: Method,
        history: &'a MethodHistory,
        index: usize,
        normalizer: &dyn GroupAdvantage,
    ) -> Result<Option<Self>> {
        let (Some(rollouts), Some(stats)) = (history.step_rollouts(index), history.step_stats(index))
        else {
            return Ok(None);
        };
        let advantages = step_advantages(method, rollouts, stats, normalizer)?;
        let baseline = match method {
            Method::Absolute => Some(stats.baseline_or_zero()),
            Method::Relative => None,
        };
        Ok(Some(Self {
            method,
            rollouts,
            rewards: rollouts.iter().map(|r| r.reward).collect(),
            advantages,
            baseline,
        }))
    }

    /// Mean advantage per action in `actions` order; an action with no
    /// rollouts this step counts as 0.
    pub fn mean_advantage_by_action(&self, actions: &[String]) -> Vec<f64> {
        let mut by_action: HashMap<&str, Vec<f64>> = HashMap::new();
        for (ro, adv) in self.rollouts.iter().zip(&self.advantages) {
            by_action.entry(ro.action.as_str()).or_default().push(*adv);
        }
        actions
            .iter()
            .map(|a| by_action.get(a.as_str()).map(|v| mean(v)).unwrap_or(0.0))
            .collect()
    }

    /// Rewards sorted ascending.
    pub fn sorted_rewards(&self) -> Vec<f64> {
        let mut sorted = self.rewards.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }
}
