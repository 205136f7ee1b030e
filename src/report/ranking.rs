//! Per-prompt ranking table.
//!
//! Lists the rollouts of one prompt group at one step, ranked by observed
//! reward, together with the advantage each rollout received and whether its
//! transcript was correct. When the reward model applied known noise to the
//! prompt, the reconstructed raw reward is shown next to the observed one.

use std::fmt;

use anyhow::Result;
use tracing::debug;

use crate::analysis::{mean, std_dev};
use crate::history::{Method, MethodHistory, NoiseCorrection, NoiseMap};
use crate::toolkit::Toolkit;

const RULE_WIDTH: usize = 110;

/// One ranked rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    /// One-based rank.
    pub rank: usize,
    /// Index of the rollout within the prompt group.
    pub index: usize,
    pub action: String,
    pub raw_reward: f64,
    pub observed_reward: f64,
    pub advantage: f64,
    pub correct: bool,
}

/// A fully computed ranking for one prompt group.
#[derive(Debug, Clone)]
pub struct RankingTable {
    pub method: Method,
    pub step_index: usize,
    pub prompt_id: u64,
    pub prompt: String,
    pub noise: Option<NoiseCorrection>,
    pub baseline: Option<f64>,
    pub rows: Vec<RankingRow>,
    pub group_mean_reward: f64,
    pub group_mean_advantage: f64,
    pub group_std_advantage: f64,
}

/// Result of asking for a ranking: either a table or the reason there is none.
#[derive(Debug, Clone)]
pub enum RankingOutcome {
    Table(RankingTable),
    StepUnavailable { step_index: usize },
    NoRollouts { prompt_id: u64, step_index: usize },
}

/// Stable ranking of `rewards`, highest first. Equal rewards keep their
/// original relative order.
pub fn rank_descending(rewards: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rewards.len()).collect();
    order.sort_by(|&a, &b| rewards[b].total_cmp(&rewards[a]));
    order
}

/// Build the ranking of prompt `prompt_id` at step `step_index`.
///
/// The group normalizer and correctness predicate are resolved first, so a
/// toolkit missing either fails before anything is computed.
pub fn build_ranking_table(
    step_index: usize,
    prompt_id: u64,
    history: &MethodHistory,
    method: Method,
    reward_noise: Option<&NoiseMap>,
    toolkit: &Toolkit,
) -> Result<RankingOutcome> {
    let normalizer = toolkit.require_group_advantage()?;
    let judge = toolkit.require_correctness()?;

    let (Some(step_rollouts), Some(step_stats)) =
        (history.step_rollouts(step_index), history.step_stats(step_index))
    else {
        return Ok(RankingOutcome::StepUnavailable { step_index });
    };

    let group: Vec<_> = step_rollouts
        .iter()
        .filter(|r| r.prompt_id == prompt_id)
        .collect();
    if group.is_empty() {
        return Ok(RankingOutcome::NoRollouts {
            prompt_id,
            step_index,
        });
    }

    let observed: Vec<f64> = group.iter().map(|r| r.reward).collect();
    let noise = reward_noise.and_then(|m| m.get(&prompt_id)).copied();
    let raw: Vec<f64> = match noise {
        Some(n) => observed.iter().map(|&r| n.raw_reward(r)).collect(),
        None => observed.clone(),
    };

    let (advantages, baseline): (Vec<f64>, Option<f64>) = match method {
        Method::Absolute => {
            let baseline = step_stats.baseline_or_zero();
            (observed.iter().map(|r| r - baseline).collect(), Some(baseline))
        }
        Method::Relative => (normalizer.advantages(&observed), None),
    };
    anyhow::ensure!(
        advantages.len() == observed.len(),
        "group advantage function returned {} values for {} rewards (prompt_id {prompt_id})",
        advantages.len(),
        observed.len()
    );

    let rows = rank_descending(&observed)
        .into_iter()
        .enumerate()
        .map(|(pos, i)| RankingRow {
            rank: pos + 1,
            index: i,
            action: group[i].action.clone(),
            raw_reward: raw[i],
            observed_reward: observed[i],
            advantage: advantages[i],
            correct: judge.is_correct(&group[i].transcript, &group[i].correct_answer),
        })
        .collect();

    debug!(
        method = method.short_label(),
        step_index,
        prompt_id,
        group_size = group.len(),
        "Built ranking table"
    );

    Ok(RankingOutcome::Table(RankingTable {
        method,
        step_index,
        prompt_id,
        prompt: group[0].prompt.clone(),
        noise,
        baseline,
        rows,
        group_mean_reward: mean(&observed),
        group_mean_advantage: mean(&advantages),
        group_std_advantage: std_dev(&advantages),
    }))
}

/// Print the ranking of one prompt group to stdout.
///
/// An unavailable step or an empty group prints a diagnostic instead of
/// failing; only a missing capability is an error.
pub fn show_ranking_table(
    step_index: usize,
    prompt_id: u64,
    history: &MethodHistory,
    method: Method,
    reward_noise: Option<&NoiseMap>,
    toolkit: &Toolkit,
) -> Result<()> {
    let outcome =
        build_ranking_table(step_index, prompt_id, history, method, reward_noise, toolkit)?;
    println!("{outcome}");
    Ok(())
}

fn check_mark(correct: bool) -> &'static str {
    if correct {
        "✓"
    } else {
        "✗"
    }
}

impl fmt::Display for RankingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{heavy}")?;
        writeln!(
            f,
            "{} - Step {}, Prompt ID {}: {}",
            self.method.label(),
            self.step_index + 1,
            self.prompt_id,
            self.prompt
        )?;
        if let Some(n) = self.noise {
            writeln!(
                f,
                "Reward noise: scale={:.2}, bias={:.2} (showing raw → observed)",
                n.scale, n.bias
            )?;
        }
        writeln!(f, "{heavy}")?;

        // Header follows the layout, not the method.
        let adv_header = if self.noise.is_some() {
            "Advantage"
        } else {
            "Relative Adv"
        };

        if self.noise.is_some() {
            writeln!(
                f,
                "{:<6} {:<6} {:<18} {:<12} {:<12} {:<12} {:<8}",
                "Rank", "Idx", "Action", "Raw Reward", "Observed", adv_header, "Correct"
            )?;
            writeln!(f, "{light}")?;
            for row in &self.rows {
                writeln!(
                    f,
                    "{:<6} {:<6} {:<18} {:>10.3} {:>10.3} {:>10.3} {:<8}",
                    row.rank,
                    row.index,
                    row.action,
                    row.raw_reward,
                    row.observed_reward,
                    row.advantage,
                    check_mark(row.correct)
                )?;
            }
        } else {
            writeln!(
                f,
                "{:<6} {:<6} {:<18} {:<18} {:<15} {:<8}",
                "Rank", "Idx", "Action", "Observed Reward", adv_header, "Correct"
            )?;
            writeln!(f, "{light}")?;
            for row in &self.rows {
                writeln!(
                    f,
                    "{:<6} {:<6} {:<18} {:>15.3} {:>15.3} {:<8}",
                    row.rank,
                    row.index,
                    row.action,
                    row.observed_reward,
                    row.advantage,
                    check_mark(row.correct)
                )?;
            }
        }

        writeln!(f, "{light}")?;
        writeln!(f, "Group mean reward: {:.3}", self.group_mean_reward)?;
        if let Some(b) = self.baseline {
            writeln!(f, "Global baseline: {b:.3}")?;
        }
        writeln!(f, "Group mean advantage: {:.3}", self.group_mean_advantage)?;
        writeln!(f, "Group std advantage: {:.3}", self.group_std_advantage)
    }
}

impl fmt::Display for RankingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(table) => table.fmt(f),
            Self::StepUnavailable { step_index } => write!(f, "Step {step_index} not available"),
            Self::NoRollouts {
                prompt_id,
                step_index,
            } => write!(
                f,
                "No rollouts found for prompt_id {prompt_id} at step {step_index}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::fixtures::{self, rollout};
    use crate::toolkit::VizError;

    fn table(outcome: RankingOutcome) -> RankingTable {
        match outcome {
            RankingOutcome::Table(t) => t,
            other => panic!("expected a table, got {other}"),
        }
    }

    #[test]
    fn test_rank_descending_is_stable() {
        let order = rank_descending(&[0.5, 0.9, 0.5, -1.0, 0.9]);
        assert_eq!(order, vec![1, 4, 0, 2, 3]);
    }

    #[test]
    fn test_absolute_ranking() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let t = table(
            build_ranking_table(1, 1, &run.absolute, Method::Absolute, None, &toolkit).unwrap(),
        );

        // Prompt 1 at step 1: rewards 0.3, -0.3, 0.9 (shift 0.1), baseline 0.05.
        let observed: Vec<f64> = t.rows.iter().map(|r| r.observed_reward).collect();
        assert!(observed.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(t.rows.iter().map(|r| r.index).collect::<Vec<_>>(), vec![2, 0, 1]);
        assert_eq!(t.rows[0].rank, 1);
        assert_eq!(t.baseline, Some(0.05));
        for row in &t.rows {
            assert_eq!(row.advantage, row.observed_reward - 0.05);
            assert_eq!(row.raw_reward, row.observed_reward);
            assert!(row.correct);
        }
    }

    #[test]
    fn test_relative_ranking_uses_group_normalizer() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let t = table(
            build_ranking_table(0, 2, &run.relative, Method::Relative, None, &toolkit).unwrap(),
        );
        // Two rollouts: 0.9 and 0.5 -> z-scores +1 and -1.
        assert_eq!(t.rows.len(), 2);
        assert!((t.rows[0].advantage - 1.0).abs() < 1e-9);
        assert!((t.rows[1].advantage + 1.0).abs() < 1e-9);
        assert!(t.baseline.is_none());
        assert!(t.group_mean_advantage.abs() < 1e-9);
        assert!((t.group_std_advantage - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_noise_reconstruction() {
        let mut history = MethodHistory::default();
        history.stats.push(fixtures::stats(1, 0.0, Some(0.0)));
        history.policies.push(Default::default());
        history.rollouts.push(vec![rollout(4, "a", 1.1), rollout(4, "b", 0.5)]);

        let mut noise = NoiseMap::new();
        noise.insert(4, NoiseCorrection::new(2.0, 0.1));
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let t = table(
            build_ranking_table(0, 4, &history, Method::Relative, Some(&noise), &toolkit).unwrap(),
        );
        assert!((t.rows[0].raw_reward - 0.5).abs() < 1e-12);
        assert!((t.rows[1].raw_reward - 0.2).abs() < 1e-12);

        let text = t.to_string();
        assert!(text.contains("Reward noise: scale=2.00, bias=0.10"));
        assert!(text.contains("Raw Reward"));
        assert!(text.contains("Advantage"));
        assert!(!text.contains("Relative Adv"));

        noise.insert(4, NoiseCorrection::new(0.0, 0.1));
        let t = table(
            build_ranking_table(0, 4, &history, Method::Relative, Some(&noise), &toolkit).unwrap(),
        );
        assert_eq!(t.rows[0].raw_reward, 1.1);
    }

    #[test]
    fn test_unavailable_step_and_missing_prompt() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let outcome =
            build_ranking_table(9, 1, &run.absolute, Method::Absolute, None, &toolkit).unwrap();
        assert_eq!(outcome.to_string(), "Step 9 not available");

        let outcome =
            build_ranking_table(0, 42, &run.absolute, Method::Absolute, None, &toolkit).unwrap();
        assert_eq!(
            outcome.to_string(),
            "No rollouts found for prompt_id 42 at step 0"
        );
    }

    #[test]
    fn test_missing_capability_fails_first() {
        let run = fixtures::run();
        // Even an out-of-range step must not be reached without a predicate.
        let toolkit = Toolkit::new().with_group_advantage(crate::toolkit::ZScore);
        let err =
            build_ranking_table(99, 1, &run.absolute, Method::Absolute, None, &toolkit).unwrap_err();
        let viz = err.downcast_ref::<VizError>().unwrap();
        assert!(matches!(
            viz,
            VizError::MissingSymbol {
                symbol: "is_correct_answer",
                ..
            }
        ));
    }

    #[test]
    fn test_display_layout() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions())
            .with_correctness(|_: &str, _: &str| false);
        let text = table(
            build_ranking_table(0, 1, &run.absolute, Method::Absolute, None, &toolkit).unwrap(),
        )
        .to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=".repeat(110));
        assert!(lines[1].starts_with("Absolute Baseline - Step 1, Prompt ID 1: What is 1 + 1?"));
        let header = format!("{:<6} {:<6} {:<18} {:<18}", "Rank", "Idx", "Action", "Observed Reward");
        assert!(lines[3].starts_with(&header));
        assert!(lines[5].starts_with("1      2      chain_of_thought   "));
        assert!(lines[5].trim_end().ends_with('✗'));
        // Without noise columns the header reads "Relative Adv" for either method.
        assert!(lines[3].contains("Relative Adv"));
        assert!(text.contains("Global baseline: 0.000"));
    }
}
