//! Per-step breakdown of rewards and recomputed advantages for both methods.

use std::fmt;

use anyhow::Result;
use tracing::warn;

use crate::analysis::{describe, MethodStep, Summary};
use crate::history::{Method, MethodHistory};
use crate::toolkit::Toolkit;

/// Tolerance above which recomputed advantage statistics are reported as
/// diverging from the values the training loop stored.
const DIVERGENCE_TOLERANCE: f64 = 1e-6;

/// Both methods' view of one step.
#[derive(Debug, Clone)]
pub struct StepDetail<'a> {
    pub step_index: usize,
    pub actions: Vec<String>,
    pub absolute: MethodStep<'a>,
    pub relative: MethodStep<'a>,
}

/// Either the computed detail or the reason it is unavailable.
#[derive(Debug, Clone)]
pub enum StepDetailOutcome<'a> {
    Detail(StepDetail<'a>),
    StepUnavailable { step_index: usize, available: usize },
}

impl<'a> StepDetail<'a> {
    /// Recompute step `step_index` of both tracks.
    ///
    /// Actions and the group normalizer are resolved before any work.
    pub fn compute(
        step_index: usize,
        absolute: &'a MethodHistory,
        relative: &'a MethodHistory,
        toolkit: &Toolkit,
    ) -> Result<StepDetailOutcome<'a>> {
        let actions = toolkit.require_actions()?.to_vec();
        let normalizer = toolkit.require_group_advantage()?;

        let unavailable = StepDetailOutcome::StepUnavailable {
            step_index,
            available: absolute.rollouts.len().min(relative.rollouts.len()),
        };
        let Some(abs) = MethodStep::compute(Method::Absolute, absolute, step_index, normalizer)?
        else {
            return Ok(unavailable);
        };
        let Some(rel) = MethodStep::compute(Method::Relative, relative, step_index, normalizer)?
        else {
            return Ok(unavailable);
        };

        if let Some(stored) = relative.step_stats(step_index) {
            warn_on_divergence(
                Method::Relative,
                step_index,
                &rel.advantages,
                stored.mean_adv,
                stored.std_adv,
            );
        }
        if let Some(stored) = absolute.step_stats(step_index) {
            warn_on_divergence(
                Method::Absolute,
                step_index,
                &abs.advantages,
                stored.mean_adv,
                stored.std_adv,
            );
        }

        Ok(StepDetailOutcome::Detail(Self {
            step_index,
            actions,
            absolute: abs,
            relative: rel,
        }))
    }

    pub fn method(&self, method: Method) -> &MethodStep<'a> {
        match method {
            Method::Absolute => &self.absolute,
            Method::Relative => &self.relative,
        }
    }
}

fn warn_on_divergence(method: Method, step_index: usize, advantages: &[f64], mean: f64, std: f64) {
    let Some(s) = describe(advantages) else {
        return;
    };
    if (s.mean - mean).abs() > DIVERGENCE_TOLERANCE || (s.std - std).abs() > DIVERGENCE_TOLERANCE {
        warn!(
            method = method.short_label(),
            step_index,
            recomputed_mean = s.mean,
            stored_mean = mean,
            recomputed_std = s.std,
            stored_std = std,
            "Recomputed advantages diverge from the stored step statistics"
        );
    }
}

fn write_method(f: &mut fmt::Formatter<'_>, step: &MethodStep<'_>) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{} Method:", step.method.label())?;
    writeln!(f, "  Number of rollouts: {}", step.rollouts.len())?;
    let rewards = describe(&step.rewards);
    let advantages = describe(&step.advantages);
    match (rewards, advantages) {
        (Some(r), Some(a)) => {
            writeln!(f, "  Reward range: [{:.3}, {:.3}]", r.min, r.max)?;
            writeln!(f, "  Average reward: {:.3}", r.mean)?;
            if let Some(b) = step.baseline {
                writeln!(f, "  Baseline: {b:.3}")?;
            }
            write_advantages(f, &a)
        }
        _ => writeln!(f, "  (no rollouts recorded)"),
    }
}

fn write_advantages(f: &mut fmt::Formatter<'_>, a: &Summary) -> fmt::Result {
    writeln!(f, "  Advantage range: [{:.3}, {:.3}]", a.min, a.max)?;
    writeln!(f, "  Mean advantage: {:.3}", a.mean)?;
    writeln!(f, "  Std advantage: {:.3}", a.std)
}

impl fmt::Display for StepDetail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(70);
        writeln!(f, "{rule}")?;
        writeln!(f, "DETAILED ANALYSIS: Step {}", self.step_index + 1)?;
        writeln!(f, "{rule}")?;

        write_method(f, &self.absolute)?;
        write_method(f, &self.relative)?;

        writeln!(f)?;
        writeln!(f, "Key Insight:")?;
        writeln!(f, "  Absolute: Advantages are reward - baseline")?;
        writeln!(f, "  Relative: Advantages are z scores within prompt groups")?;
        write!(f, "  Relative method normalizes across prompt difficulty automatically!")
    }
}

impl fmt::Display for StepDetailOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detail(detail) => detail.fmt(f),
            Self::StepUnavailable {
                step_index,
                available,
            } => write!(
                f,
                "Step {step_index} not available (max: {})",
                *available as i64 - 1
            ),
        }
    }
}
