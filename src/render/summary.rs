//! Four-panel training summary figure.

use std::path::Path;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::debug;

use super::{
    bar_panel, line_panel, padded_range, save_figure, step_range, Axes, BarFill, Bars, DrawResult,
    Figure, Guide, Line, ABSOLUTE_COLOR, BASELINE_COLOR, MARKER_COLOR, RELATIVE_COLOR,
};
use crate::history::{MethodHistory, StepStats};
use crate::report::TrainingSummary;
use crate::toolkit::Toolkit;

pub const DRIFT_LABEL: &str = "Reward Model Drift";

/// Reward, correctness, advantage statistics and final policies side by side.
#[derive(Debug, Clone)]
pub struct SummaryFigure<'a> {
    pub absolute: &'a MethodHistory,
    pub relative: &'a MethodHistory,
    pub actions: Vec<String>,
    pub drift_step: Option<usize>,
    pub size: (u32, u32),
}

fn series(stats: &[StepStats], value: impl Fn(&StepStats) -> f64) -> Vec<(f64, f64)> {
    stats.iter().map(|s| (s.step as f64, value(s))).collect()
}

impl<'a> SummaryFigure<'a> {
    /// Actions are resolved first; the drift marker comes from the toolkit.
    pub fn new(
        absolute: &'a MethodHistory,
        relative: &'a MethodHistory,
        toolkit: &Toolkit,
        size: (u32, u32),
    ) -> Result<Self> {
        let actions = toolkit.require_actions()?.to_vec();
        Ok(Self {
            absolute,
            relative,
            actions,
            drift_step: toolkit.drift_step(),
            size,
        })
    }

    /// Final policy probabilities for each method, in action order.
    pub fn final_policies(&self) -> (Vec<f64>, Vec<f64>) {
        let last = |h: &MethodHistory| {
            h.policies
                .last()
                .map(|p| p.ordered(&self.actions))
                .unwrap_or_else(|| vec![0.0; self.actions.len()])
        };
        (last(self.absolute), last(self.relative))
    }

    fn draw_rewards<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> DrawResult<(), DB> {
        let abs = &self.absolute.stats;
        let rel = &self.relative.stats;
        let lines = [
            Line::new("Absolute", series(abs, |s| s.avg_reward), ABSOLUTE_COLOR),
            Line::new("Relative", series(rel, |s| s.avg_reward), RELATIVE_COLOR),
            Line::new("Abs Baseline", series(abs, StepStats::baseline_or_zero), BASELINE_COLOR)
                .thin(),
        ];
        let guides: Vec<Guide> = self
            .drift_step
            .map(|step| Guide::Vertical {
                at: step as f64,
                label: Some(DRIFT_LABEL.to_string()),
                color: MARKER_COLOR,
                width: 2,
            })
            .into_iter()
            .collect();
        line_panel(
            area,
            Axes {
                title: "Average Reward",
                x_desc: "Training Step",
                y_desc: "Reward",
            },
            step_range(&self.absolute.step_numbers()),
            -1.1..1.1,
            &lines,
            &guides,
        )
    }

    fn draw_correctness<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
    ) -> DrawResult<(), DB> {
        let lines = [
            Line::new(
                "Absolute",
                series(&self.absolute.stats, |s| s.correctness_rate),
                ABSOLUTE_COLOR,
            ),
            Line::new(
                "Relative",
                series(&self.relative.stats, |s| s.correctness_rate),
                RELATIVE_COLOR,
            ),
        ];
        line_panel(
            area,
            Axes {
                title: "Correctness Rate",
                x_desc: "Training Step",
                y_desc: "Correctness",
            },
            step_range(&self.absolute.step_numbers()),
            0.0..1.0,
            &lines,
            &[],
        )
    }

    fn draw_advantages<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
    ) -> DrawResult<(), DB> {
        let abs = &self.absolute.stats;
        let rel = &self.relative.stats;
        let lines = [
            Line::new("Abs Mean", series(abs, |s| s.mean_adv), ABSOLUTE_COLOR),
            Line::new("Abs Std", series(abs, |s| s.std_adv), ABSOLUTE_COLOR).thin(),
            Line::new("Rel Mean", series(rel, |s| s.mean_adv), RELATIVE_COLOR),
            Line::new("Rel Std", series(rel, |s| s.std_adv), RELATIVE_COLOR).thin(),
        ];
        let y = padded_range(lines.iter().flat_map(|l| l.points.iter().map(|(_, v)| v)), 0.1);
        line_panel(
            area,
            Axes {
                title: "Advantage Statistics",
                x_desc: "Training Step",
                y_desc: "Value",
            },
            step_range(&self.absolute.step_numbers()),
            y,
            &lines,
            &[Guide::zero_h()],
        )
    }

    fn draw_final_policies<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
    ) -> DrawResult<(), DB> {
        let (abs, rel) = self.final_policies();
        bar_panel(
            area,
            Axes {
                title: "Final Policy Distribution",
                x_desc: "Action",
                y_desc: "Probability",
            },
            &self.actions,
            0.0..1.0,
            &[
                Bars {
                    label: "Absolute",
                    values: abs,
                    fill: BarFill::Solid(ABSOLUTE_COLOR),
                },
                Bars {
                    label: "Relative",
                    values: rel,
                    fill: BarFill::Solid(RELATIVE_COLOR),
                },
            ],
            &[],
        )
    }
}

impl Figure for SummaryFigure<'_> {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<(), DB> {
        root.fill(&WHITE)?;
        let panels = root.split_evenly((2, 2));
        self.draw_rewards(&panels[0])?;
        self.draw_correctness(&panels[1])?;
        self.draw_advantages(&panels[2])?;
        self.draw_final_policies(&panels[3])
    }
}

/// Save the summary figure to `path`, then print and return the text summary.
pub fn plot_training_summary(
    absolute: &MethodHistory,
    relative: &MethodHistory,
    toolkit: &Toolkit,
    path: &Path,
    size: (u32, u32),
) -> Result<TrainingSummary> {
    let figure = SummaryFigure::new(absolute, relative, toolkit, size)?;
    let summary = TrainingSummary::compute(&absolute.stats, &relative.stats)?;
    debug!(steps = summary.steps, drift_step = ?figure.drift_step, "Rendering summary");
    save_figure(&figure, path)?;
    println!("{summary}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::fixtures;
    use crate::toolkit::{VizError, ZScore};

    #[test]
    fn test_requires_actions() {
        let run = fixtures::run();
        let toolkit = Toolkit::new().with_group_advantage(ZScore);
        let err = SummaryFigure::new(&run.absolute, &run.relative, &toolkit, (800, 600))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VizError>(),
            Some(VizError::MissingSymbol { symbol: "ACTIONS", .. })
        ));
    }

    #[test]
    fn test_missing_actions_fails_before_writing() {
        let run = fixtures::run();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.png");
        let toolkit = Toolkit::new();
        assert!(plot_training_summary(&run.absolute, &run.relative, &toolkit, &path, (800, 600))
            .is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_renders_png_and_svg() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions()).with_drift_step(run.drift_step);
        let dir = tempfile::tempdir().unwrap();
        for name in ["summary.png", "figures/summary.svg"] {
            let path = dir.path().join(name);
            let summary =
                plot_training_summary(&run.absolute, &run.relative, &toolkit, &path, (900, 700))
                    .unwrap();
            assert_eq!(summary.steps, 2);
            assert!(std::fs::metadata(&path).unwrap().len() > 0, "{name} is empty");
        }
        let svg = std::fs::read_to_string(dir.path().join("figures/summary.svg")).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Average Reward"));
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.jpg");
        let figure =
            SummaryFigure::new(&run.absolute, &run.relative, &toolkit, (800, 600)).unwrap();
        assert!(save_figure(&figure, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_final_policies_follow_action_order() {
        let run = fixtures::run();
        let toolkit = Toolkit::with_defaults(fixtures::actions()).with_drift_step(run.drift_step);
        let figure =
            SummaryFigure::new(&run.absolute, &run.relative, &toolkit, (800, 600)).unwrap();
        assert_eq!(figure.drift_step, Some(2));
        let (abs, rel) = figure.final_policies();
        assert_eq!(abs, run.absolute.policies[1].ordered(&fixtures::actions()));
        assert_eq!(rel, run.relative.policies[1].ordered(&fixtures::actions()));
    }

    #[test]
    fn test_series_uses_step_numbers() {
        let run = fixtures::run();
        let points = series(&run.absolute.stats, |s| s.avg_reward);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, run.absolute.stats[0].step as f64);
    }
}
