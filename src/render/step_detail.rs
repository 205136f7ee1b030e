//! Six-panel figure for a single training step.

use std::path::Path;

use anyhow::Result;
use ordered_float::OrderedFloat;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{
    hbar_panel, histogram_panel, padded_range, save_figure, scatter_panel, Axes, BarFill, Bars,
    DrawResult, Figure, Guide, Points, ABSOLUTE_COLOR, BASELINE_COLOR, RELATIVE_COLOR,
};
use crate::analysis::{describe, Histogram, MethodStep};
use crate::config::FigureConfig;
use crate::history::MethodHistory;
use crate::report::{StepDetail, StepDetailOutcome};
use crate::toolkit::Toolkit;

/// Figure over a computed [`StepDetail`].
#[derive(Debug, Clone)]
pub struct StepDetailFigure<'d, 'a> {
    pub detail: &'d StepDetail<'a>,
    pub bins: usize,
    pub size: (u32, u32),
}

/// Action order for the by-action panel: ascending absolute mean advantage,
/// ties keeping their listed order.
pub fn actions_by_absolute_mean(detail: &StepDetail<'_>) -> Vec<(String, f64, f64)> {
    let abs = detail.absolute.mean_advantage_by_action(&detail.actions);
    let rel = detail.relative.mean_advantage_by_action(&detail.actions);
    let mut order: Vec<usize> = (0..detail.actions.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(abs[i]));
    order
        .into_iter()
        .map(|i| (detail.actions[i].clone(), abs[i], rel[i]))
        .collect()
}

fn indexed(values: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect()
}

fn histogram_title(step: &MethodStep<'_>) -> String {
    let s = describe(&step.advantages);
    let (mean, std) = s.map(|s| (s.mean, s.std)).unwrap_or((0.0, 0.0));
    format!(
        "{} Advantages (Mean: {mean:.3}, Std: {std:.3})",
        step.method.short_label()
    )
}

impl StepDetailFigure<'_, '_> {
    fn draw_sorted_rewards<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        step: &MethodStep<'_>,
        color: RGBColor,
    ) -> DrawResult<(), DB> {
        let sorted = step.sorted_rewards();
        let (at, label) = match step.baseline {
            Some(b) => (b, format!("Baseline: {b:.3}")),
            None => {
                let m = crate::analysis::mean(&step.rewards);
                (m, format!("Mean: {m:.3}"))
            }
        };
        let title = format!(
            "{}: Rewards (Step {})",
            step.method.short_label(),
            self.detail.step_index + 1
        );
        let y = padded_range(sorted.iter().chain(std::iter::once(&at)), 0.1);
        scatter_panel(
            area,
            Axes {
                title: &title,
                x_desc: "Rollout (sorted)",
                y_desc: "Reward",
            },
            -0.5..(sorted.len().max(1) as f64 - 0.5),
            y,
            &[Points {
                label: "Rollouts",
                points: indexed(&sorted),
                color,
            }],
            &[Guide::Horizontal {
                at,
                label: Some(label),
                color: BASELINE_COLOR,
                width: 2,
            }],
        )
    }

    fn draw_reward_vs_advantage<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
    ) -> DrawResult<(), DB> {
        let pairs = |s: &MethodStep<'_>| -> Vec<(f64, f64)> {
            s.rewards.iter().copied().zip(s.advantages.iter().copied()).collect()
        };
        let abs = pairs(&self.detail.absolute);
        let rel = pairs(&self.detail.relative);
        let x = padded_range(abs.iter().chain(&rel).map(|(r, _)| r), 0.1);
        let y = padded_range(abs.iter().chain(&rel).map(|(_, a)| a), 0.1);
        scatter_panel(
            area,
            Axes {
                title: "Reward vs Advantage",
                x_desc: "Reward",
                y_desc: "Advantage",
            },
            x,
            y,
            &[
                Points {
                    label: "Absolute",
                    points: abs,
                    color: ABSOLUTE_COLOR,
                },
                Points {
                    label: "Relative",
                    points: rel,
                    color: RELATIVE_COLOR,
                },
            ],
            &[Guide::zero_h(), Guide::zero_v()],
        )
    }

    fn draw_histogram<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
        step: &MethodStep<'_>,
        color: RGBColor,
    ) -> DrawResult<(), DB> {
        let hist = Histogram::auto_range(&step.advantages, self.bins);
        let title = histogram_title(step);
        histogram_panel(
            area,
            Axes {
                title: &title,
                x_desc: "Advantage",
                y_desc: "Count",
            },
            &[(step.method.short_label(), &hist, color)],
            &[Guide::Vertical {
                at: 0.0,
                label: None,
                color: BASELINE_COLOR,
                width: 2,
            }],
        )
    }

    fn draw_by_action<DB: DrawingBackend>(
        &self,
        area: &DrawingArea<DB, Shift>,
    ) -> DrawResult<(), DB> {
        let rows = actions_by_absolute_mean(self.detail);
        let labels: Vec<String> = rows.iter().map(|(a, _, _)| a.clone()).collect();
        let abs: Vec<f64> = rows.iter().map(|(_, a, _)| *a).collect();
        let rel: Vec<f64> = rows.iter().map(|(_, _, r)| *r).collect();
        let x = padded_range(abs.iter().chain(&rel).chain(std::iter::once(&0.0)), 0.1);
        hbar_panel(
            area,
            Axes {
                title: "Mean Advantage by Action",
                x_desc: "Mean Advantage",
                y_desc: "",
            },
            &labels,
            x,
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
        )
    }
}

impl Figure for StepDetailFigure<'_, '_> {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<(), DB> {
        root.fill(&WHITE)?;
        let panels = root.split_evenly((2, 3));
        self.draw_sorted_rewards(&panels[0], &self.detail.absolute, ABSOLUTE_COLOR)?;
        self.draw_sorted_rewards(&panels[1], &self.detail.relative, RELATIVE_COLOR)?;
        self.draw_reward_vs_advantage(&panels[2])?;
        self.draw_histogram(&panels[3], &self.detail.absolute, ABSOLUTE_COLOR)?;
        self.draw_histogram(&panels[4], &self.detail.relative, RELATIVE_COLOR)?;
        self.draw_by_action(&panels[5])
    }
}

/// Render the detail figure for `step_index` to `path` and print the text
/// breakdown. An unavailable step only prints a notice.
pub fn visualize_step_details(
    step_index: usize,
    absolute: &MethodHistory,
    relative: &MethodHistory,
    toolkit: &Toolkit,
    path: &Path,
    config: &FigureConfig,
) -> Result<bool> {
    let detail = match StepDetail::compute(step_index, absolute, relative, toolkit)? {
        StepDetailOutcome::Detail(detail) => detail,
        unavailable => {
            println!("{unavailable}");
            return Ok(false);
        }
    };
    let figure = StepDetailFigure {
        detail: &detail,
        bins: config.detail_bins,
        size: config.detail_size,
    };
    save_figure(&figure, path)?;
    println!("{detail}");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::fixtures;

    fn detail(run: &crate::history::ComparisonRun, step: usize) -> StepDetail<'_> {
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        match StepDetail::compute(step, &run.absolute, &run.relative, &toolkit).unwrap() {
            StepDetailOutcome::Detail(d) => d,
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_actions_sorted_by_absolute_mean() {
        let run = fixtures::run();
        let d = detail(&run, 0);
        let rows = actions_by_absolute_mean(&d);
        let names: Vec<&str> = rows.iter().map(|(a, _, _)| a.as_str()).collect();
        // Step 0, baseline 0: guess -0.4, direct 0.35, chain_of_thought 0.85.
        assert_eq!(names, vec!["guess", "direct", "chain_of_thought"]);
        assert!((rows[0].1 + 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_absent_action_counts_as_zero() {
        let run = fixtures::run();
        let mut d = detail(&run, 0);
        d.actions.push("unused".into());
        let rows = actions_by_absolute_mean(&d);
        let names: Vec<&str> = rows.iter().map(|(a, _, _)| a.as_str()).collect();
        assert_eq!(names, vec!["guess", "unused", "direct", "chain_of_thought"]);
        assert_eq!(rows[1].1, 0.0);
        assert_eq!(rows[1].2, 0.0);
    }

    #[test]
    fn test_histogram_title() {
        let run = fixtures::run();
        let d = detail(&run, 0);
        let title = histogram_title(&d.relative);
        assert!(title.starts_with("Relative Advantages (Mean: "));
        assert!(title.contains("Std: "));
    }

    #[test]
    fn test_renders_png() {
        let run = fixtures::run();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detail.png");
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let config = FigureConfig {
            detail_size: (1000, 600),
            ..FigureConfig::default()
        };
        let drawn =
            visualize_step_details(1, &run.absolute, &run.relative, &toolkit, &path, &config)
                .unwrap();
        assert!(drawn);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_unavailable_step_writes_nothing() {
        let run = fixtures::run();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detail.png");
        let toolkit = Toolkit::with_defaults(fixtures::actions());
        let drawn = visualize_step_details(
            9,
            &run.absolute,
            &run.relative,
            &toolkit,
            &path,
            &FigureConfig::default(),
        )
        .unwrap();
        assert!(!drawn);
        assert!(!path.exists());
    }
}
