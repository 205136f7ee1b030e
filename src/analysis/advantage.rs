//! Advantage recomputation for the two compared methods.
//!
//! - Absolute baseline:  A_i = R_i - b, where b is the step's global baseline.
//! - Group relative:     A_i = (R_i - mean(R_g)) / std(R_g) within the prompt
//!   group g the rollout belongs to.
//!
//! The relative rule delegates the per-group normalization to the caller's
//! [`GroupAdvantage`] so figures reflect whatever the training loop used.

use std::collections::HashMap;

use anyhow::{bail, Result};

use super::stats::{mean, std_dev};
use crate::history::{Method, Rollout, StepStats};
use crate::toolkit::GroupAdvantage;

/// Compute group-relative advantages for a group of G rewards.
///
/// Each advantage is the z-score of the reward within the group:
///
///   A_i = (R_i - mean(R)) / std(R)
///
/// # Edge cases
///
/// - If `rewards` is empty, returns an empty vector.
/// - If all rewards are identical (std = 0), all advantages are set to 0.0.
pub fn compute_group_advantages(rewards: &[f64]) -> Vec<f64> {
    let centre = mean(rewards);
    let spread = std_dev(rewards);
    if spread < 1e-8 {
        return vec![0.0; rewards.len()];
    }
    rewards.iter().map(|r| (r - centre) / spread).collect()
}

/// Baseline-subtracted advantages, one per rollout.
pub fn absolute_advantages(rollouts: &[Rollout], baseline: f64) -> Vec<f64> {
    rollouts.iter().map(|r| r.reward - baseline).collect()
}

/// Indices of `rollouts` grouped by prompt id, groups in order of first
/// appearance and indices ascending within each group.
pub fn group_by_prompt(rollouts: &[Rollout]) -> Vec<(u64, Vec<usize>)> {
    let mut slot: HashMap<u64, usize> = HashMap::new();
    let mut groups: Vec<(u64, Vec<usize>)> = Vec::new();
    for (idx, ro) in rollouts.iter().enumerate() {
        let g = *slot.entry(ro.prompt_id).or_insert_with(|| {
            groups.push((ro.prompt_id, Vec::new()));
            groups.len() - 1
        });
        groups[g].1.push(idx);
    }
    groups
}

/// Group-normalized advantages scattered back to the original rollout order.
///
/// The normalizer is called once per prompt group. An output whose length
/// differs from its group is rejected, since it could not be mapped back to
/// rollouts without mixing groups.
pub fn relative_advantages(
    rollouts: &[Rollout],
    normalizer: &dyn GroupAdvantage,
) -> Result<Vec<f64>> {
    let mut advantages = vec![0.0; rollouts.len()];
    for (prompt_id, idxs) in group_by_prompt(rollouts) {
        let group_rewards: Vec<f64> = idxs.iter().map(|&i| rollouts[i].reward).collect();
        let group_adv = normalizer.advantages(&group_rewards);
        if group_adv.len() != idxs.len() {
            bail!(
                "group advantage function returned {} values for {} rewards (prompt_id {prompt_id})",
                group_adv.len(),
                idxs.len()
            );
        }
        for (i, a) in idxs.into_iter().zip(group_adv) {
            advantages[i] = a;
        }
    }
    Ok(advantages)
}

/// Per-rollout advantages of one step under one method.
pub fn step_advantages(
    method: Method,
    rollouts: &[Rollout],
    stats: &StepStats,
    normalizer: &dyn GroupAdvantage,
) -> Result<Vec<f64>> {
    match method {
        Method::Absolute => Ok(absolute_advantages(rollouts, stats.baseline_or_zero())),
        Method::Relative => relative_advantages(rollouts, normalizer),
    }
}
