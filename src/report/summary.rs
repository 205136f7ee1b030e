//! End-of-training text summary comparing the two methods.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::history::{Method, StepStats};

/// Start-versus-end figures for one method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodSummary {
    pub method: Method,
    pub initial_reward: f64,
    pub final_reward: f64,
    /// `final_reward - initial_reward`.
    pub improvement: f64,
    pub final_correctness: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_baseline: Option<f64>,
}

impl MethodSummary {
    pub fn from_stats(method: Method, stats: &[StepStats]) -> Result<Self> {
        let (Some(first), Some(last)) = (stats.first(), stats.last()) else {
            bail!("{method}: no statistics recorded");
        };
        Ok(Self {
            method,
            initial_reward: first.avg_reward,
            final_reward: last.avg_reward,
            improvement: last.avg_reward - first.avg_reward,
            final_correctness: last.correctness_rate,
            final_baseline: match method {
                Method::Absolute => last.baseline,
                Method::Relative => None,
            },
        })
    }
}

/// The full comparison printed after the summary figure.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub generated_at: DateTime<Utc>,
    pub steps: usize,
    pub absolute: MethodSummary,
    pub relative: MethodSummary,
    /// Relative improvement minus absolute improvement.
    pub improvement_gap: f64,
}

impl TrainingSummary {
    pub fn compute(abs_stats: &[StepStats], rel_stats: &[StepStats]) -> Result<Self> {
        let absolute = MethodSummary::from_stats(Method::Absolute, abs_stats)?;
        let relative = MethodSummary::from_stats(Method::Relative, rel_stats)?;
        Ok(Self {
            generated_at: Utc::now(),
            steps: abs_stats.len(),
            improvement_gap: relative.improvement - absolute.improvement,
            absolute,
            relative,
        })
    }

    /// Write the summary as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))
    }
}

fn write_method(f: &mut fmt::Formatter<'_>, m: &MethodSummary) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{} Method:", m.method.label())?;
    writeln!(f, "  Initial avg reward: {:.3}", m.initial_reward)?;
    writeln!(f, "  Final avg reward: {:.3}", m.final_reward)?;
    writeln!(f, "  Improvement: {:+.3}", m.improvement)?;
    writeln!(f, "  Final correctness rate: {:.1}%", m.final_correctness * 100.0)?;
    if let Some(b) = m.final_baseline {
        writeln!(f, "  Final baseline: {b:.3}")?;
    }
    Ok(())
}

impl fmt::Display for TrainingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(70);
        writeln!(f, "{rule}")?;
        writeln!(f, "TRAINING SUMMARY")?;
        writeln!(f, "{rule}")?;

        write_method(f, &self.absolute)?;
        write_method(f, &self.relative)?;

        writeln!(f)?;
        writeln!(f, "Comparison:")?;
        writeln!(f, "  Absolute improvement: {:+.3}", self.absolute.improvement)?;
        writeln!(f, "  Relative improvement: {:+.3}", self.relative.improvement)?;
        write!(f, "  Difference: {:+.3}", self.improvement_gap)
    }
}
