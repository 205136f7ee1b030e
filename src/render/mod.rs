//! Figures rendered with `plotters`.
//!
//! - [`summary`] -- four-panel training summary.
//! - [`step_detail`] -- six-panel breakdown of one step.
//! - [`animation`] -- frame-by-frame comparison of both methods.
//!
//! Figures draw onto any plotters backend; [`save_figure`] picks PNG or SVG
//! from the output extension. The panel helpers below are shared by all three.

pub mod animation;
pub mod step_detail;
pub mod summary;

use std::ops::Range;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

pub use animation::{animate_training_comparison, ComparisonAnimation, FrameState, SaveOutcome};
pub use step_detail::{visualize_step_details, StepDetailFigure};
pub use summary::{plot_training_summary, SummaryFigure};

/// Result of a drawing operation on backend `DB`.
pub type DrawResult<T, DB> = Result<T, DrawingAreaErrorKind<<DB as DrawingBackend>::ErrorType>>;

type Chart2d<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

// ---------------------------------------------------------------------------
// Palette
// ---------------------------------------------------------------------------

pub const ABSOLUTE_COLOR: RGBColor = RGBColor(31, 119, 180);
pub const RELATIVE_COLOR: RGBColor = RGBColor(255, 127, 14);
pub const BASELINE_COLOR: RGBColor = RGBColor(214, 39, 40);
pub const GAIN_COLOR: RGBColor = RGBColor(44, 160, 44);
pub const LOSS_COLOR: RGBColor = RGBColor(214, 39, 40);
pub const MARKER_COLOR: RGBColor = RGBColor(128, 128, 128);
pub const PANEL_TEXT_BG: RGBColor = RGBColor(245, 222, 179);

const TITLE_FONT: (&str, u32) = ("sans-serif", 17);
const LABEL_FONT: (&str, u32) = ("sans-serif", 13);

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Image format chosen from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureFormat {
    Png,
    Svg,
}

impl FigureFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("png") => Ok(Self::Png),
            Some("svg") => Ok(Self::Svg),
            other => bail!(
                "unsupported figure format {:?} for {} (expected .png or .svg)",
                other.unwrap_or(""),
                path.display()
            ),
        }
    }
}

/// Something that can be drawn onto a plotters drawing area.
pub trait Figure {
    /// Pixel size of the figure.
    fn size(&self) -> (u32, u32);

    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> DrawResult<(), DB>;
}

/// Render `figure` to `path` as PNG or SVG.
pub fn save_figure<F: Figure>(figure: &F, path: &Path) -> Result<()> {
    let format = FigureFormat::from_path(path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let describe = |e: &dyn std::fmt::Display| anyhow!("Failed to render {}: {e}", path.display());
    match format {
        FigureFormat::Png => {
            let root = BitMapBackend::new(path, figure.size()).into_drawing_area();
            figure.draw(&root).map_err(|e| describe(&e))?;
            root.present().map_err(|e| describe(&e))?;
        }
        FigureFormat::Svg => {
            let root = SVGBackend::new(path, figure.size()).into_drawing_area();
            figure.draw(&root).map_err(|e| describe(&e))?;
            root.present().map_err(|e| describe(&e))?;
        }
    }
    info!(path = %path.display(), ?format, "Saved figure");
    Ok(())
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

/// Range spanning `values` plus `pad` of its width on each side. An empty or
/// degenerate sample gets a unit-width range around its value.
pub fn padded_range<'a>(values: impl IntoIterator<Item = &'a f64>, pad: f64) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return -1.0..1.0;
    }
    if hi - lo < 1e-9 {
        return (lo - 0.5)..(hi + 0.5);
    }
    let margin = (hi - lo) * pad;
    (lo - margin)..(hi + margin)
}

/// Range for an axis of training steps.
pub fn step_range(steps: &[usize]) -> Range<f64> {
    let first = steps.first().copied().unwrap_or(1) as f64;
    let last = steps.last().copied().unwrap_or(1) as f64;
    if last > first {
        first..last
    } else {
        (first - 0.5)..(first + 0.5)
    }
}

/// Label of category `index` on a category axis centred on integers.
fn category_label(labels: &[String], value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

fn category_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

// ---------------------------------------------------------------------------
// Panel building blocks
// ---------------------------------------------------------------------------

/// A labelled polyline.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub label: &'a str,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub width: u32,
    /// Opacity in `[0, 1]`.
    pub alpha: f64,
}

impl<'a> Line<'a> {
    pub fn new(label: &'a str, points: Vec<(f64, f64)>, color: RGBColor) -> Self {
        Self {
            label,
            points,
            color,
            width: 2,
            alpha: 1.0,
        }
    }

    pub fn thin(mut self) -> Self {
        self.width = 1;
        self.alpha = 0.7;
        self
    }
}

/// A labelled point cloud.
#[derive(Debug, Clone)]
pub struct Points<'a> {
    pub label: &'a str,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
}

/// A straight reference line across the whole plot.
#[derive(Debug, Clone)]
pub enum Guide {
    Horizontal {
        at: f64,
        label: Option<String>,
        color: RGBColor,
        width: u32,
    },
    Vertical {
        at: f64,
        label: Option<String>,
        color: RGBColor,
        width: u32,
    },
}

impl Guide {
    /// Thin unlabelled black axis line at `y = 0`.
    pub fn zero_h() -> Self {
        Self::Horizontal {
            at: 0.0,
            label: None,
            color: BLACK,
            width: 1,
        }
    }

    /// Thin unlabelled black axis line at `x = 0`.
    pub fn zero_v() -> Self {
        Self::Vertical {
            at: 0.0,
            label: None,
            color: BLACK,
            width: 1,
        }
    }
}

/// Bars of one series on a category axis.
#[derive(Debug, Clone)]
pub struct Bars<'a> {
    pub label: &'a str,
    pub values: Vec<f64>,
    pub fill: BarFill,
}

/// How bars are colored.
#[derive(Debug, Clone, Copy)]
pub enum BarFill {
    Solid(RGBColor),
    /// Positive values in the first color, the rest in the second.
    Signed(RGBColor, RGBColor),
}

impl BarFill {
    fn color_for(&self, value: f64) -> RGBColor {
        match *self {
            Self::Solid(c) => c,
            Self::Signed(pos, neg) => {
                if value > 0.0 {
                    pos
                } else {
                    neg
                }
            }
        }
    }

    fn legend_color(&self) -> RGBColor {
        match *self {
            Self::Solid(c) | Self::Signed(c, _) => c,
        }
    }
}

/// Axis captions and title of a panel.
#[derive(Debug, Clone, Copy)]
pub struct Axes<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
}

fn base_chart<'a, DB: DrawingBackend>(
    area: &'a DrawingArea<DB, Shift>,
    title: &str,
    x: Range<f64>,
    y: Range<f64>,
    y_label_area: u32,
) -> DrawResult<Chart2d<'a, DB>, DB> {
    ChartBuilder::on(area)
        .caption(title, TITLE_FONT)
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(y_label_area)
        .build_cartesian_2d(x, y)
}

fn draw_guides<DB: DrawingBackend>(
    chart: &mut Chart2d<'_, DB>,
    guides: &[Guide],
    x: &Range<f64>,
    y: &Range<f64>,
) -> DrawResult<(), DB> {
    for guide in guides {
        let (points, label, color, width) = match guide {
            Guide::Horizontal {
                at,
                label,
                color,
                width,
            } => (vec![(x.start, *at), (x.end, *at)], label, *color, *width),
            Guide::Vertical {
                at,
                label,
                color,
                width,
            } => (vec![(*at, y.start), (*at, y.end)], label, *color, *width),
        };
        let anno = chart.draw_series(std::iter::once(PathElement::new(
            points,
            color.stroke_width(width),
        )))?;
        if let Some(label) = label {
            anno.label(label.as_str()).legend(move |(lx, ly)| {
                PathElement::new(vec![(lx, ly), (lx + 20, ly)], color.stroke_width(width))
            });
        }
    }
    Ok(())
}

fn draw_legend<'a, DB: DrawingBackend + 'a>(chart: &mut Chart2d<'a, DB>) -> DrawResult<(), DB> {
    chart
        .configure_series_labels()
        .label_font(LABEL_FONT)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
}

/// Line chart with optional reference lines.
pub fn line_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: Axes<'_>,
    x: Range<f64>,
    y: Range<f64>,
    lines: &[Line<'_>],
    guides: &[Guide],
) -> DrawResult<(), DB> {
    let mut chart = base_chart(area, axes.title, x.clone(), y.clone(), 50)?;
    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .label_style(LABEL_FONT)
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for line in lines {
        let (color, width) = (line.color.mix(line.alpha), line.width);
        chart
            .draw_series(LineSeries::new(
                line.points.iter().copied(),
                color.stroke_width(width),
            ))?
            .label(line.label)
            .legend(move |(lx, ly)| {
                PathElement::new(vec![(lx, ly), (lx + 20, ly)], color.stroke_width(width))
            });
    }
    draw_guides(&mut chart, guides, &x, &y)?;
    draw_legend(&mut chart)
}

/// Scatter chart with optional reference lines.
pub fn scatter_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: Axes<'_>,
    x: Range<f64>,
    y: Range<f64>,
    clouds: &[Points<'_>],
    guides: &[Guide],
) -> DrawResult<(), DB> {
    let mut chart = base_chart(area, axes.title, x.clone(), y.clone(), 50)?;
    chart
        .configure_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .label_style(LABEL_FONT)
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for cloud in clouds {
        let color = cloud.color;
        chart
            .draw_series(
                cloud
                    .points
                    .iter()
                    .map(|&p| Circle::new(p, 4, color.mix(0.6).filled())),
            )?
            .label(cloud.label)
            .legend(move |(lx, ly)| Circle::new((lx + 10, ly), 4, color.mix(0.6).filled()));
    }
    draw_guides(&mut chart, guides, &x, &y)?;
    draw_legend(&mut chart)
}

/// Vertical bars, one group per category; several series sit side by side.
pub fn bar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: Axes<'_>,
    categories: &[String],
    y: Range<f64>,
    series: &[Bars<'_>],
    guides: &[Guide],
) -> DrawResult<(), DB> {
    let x = category_range(categories.len());
    let mut chart = base_chart(area, axes.title, x.clone(), y.clone(), 50)?;
    let formatter = |v: &f64| category_label(categories, *v);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(categories.len().max(1))
        .x_label_formatter(&formatter)
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .label_style(LABEL_FONT)
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    let group_width = 0.8;
    let bar_width = group_width / series.len().max(1) as f64;
    for (s, bars) in series.iter().enumerate() {
        let offset = -group_width / 2.0 + s as f64 * bar_width;
        let fill = bars.fill;
        let anno = chart.draw_series(bars.values.iter().enumerate().map(|(i, &v)| {
            let x0 = i as f64 + offset;
            Rectangle::new(
                [(x0, 0.0), (x0 + bar_width, v)],
                fill.color_for(v).mix(0.8).filled(),
            )
        }))?;
        if series.len() > 1 {
            let color = fill.legend_color();
            anno.label(bars.label).legend(move |(lx, ly)| {
                Rectangle::new([(lx, ly - 5), (lx + 14, ly + 5)], color.mix(0.8).filled())
            });
        }
    }
    draw_guides(&mut chart, guides, &x, &y)?;
    if series.len() > 1 {
        draw_legend(&mut chart)?;
    }
    Ok(())
}

/// Horizontal bars, one row per category; several series sit side by side.
pub fn hbar_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: Axes<'_>,
    categories: &[String],
    x: Range<f64>,
    series: &[Bars<'_>],
) -> DrawResult<(), DB> {
    let y = category_range(categories.len());
    let mut chart = base_chart(area, axes.title, x.clone(), y.clone(), 120)?;
    let formatter = |v: &f64| category_label(categories, *v);
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(categories.len().max(1))
        .y_label_formatter(&formatter)
        .x_desc(axes.x_desc)
        .label_style(LABEL_FONT)
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    let group_height = 0.7;
    let bar_height = group_height / series.len().max(1) as f64;
    for (s, bars) in series.iter().enumerate() {
        let offset = -group_height / 2.0 + s as f64 * bar_height;
        let color = bars.fill.legend_color();
        chart
            .draw_series(bars.values.iter().enumerate().map(|(i, &v)| {
                let y0 = i as f64 + offset;
                Rectangle::new([(0.0, y0), (v, y0 + bar_height)], color.mix(0.8).filled())
            }))?
            .label(bars.label)
            .legend(move |(lx, ly)| {
                Rectangle::new([(lx, ly - 5), (lx + 14, ly + 5)], color.mix(0.8).filled())
            });
    }
    draw_guides(&mut chart, &[Guide::zero_v()], &x, &y)?;
    draw_legend(&mut chart)
}

/// Overlaid histograms sharing one x range.
pub fn histogram_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axes: Axes<'_>,
    histograms: &[(&str, &crate::analysis::Histogram, RGBColor)],
    guides: &[Guide],
) -> DrawResult<(), DB> {
    let (lo, hi) = histograms
        .first()
        .map(|(_, h, _)| (h.lo, h.hi))
        .unwrap_or((-1.0, 1.0));
    let top = histograms
        .iter()
        .map(|(_, h, _)| h.max_count())
        .max()
        .unwrap_or(0)
        .max(1) as f64
        * 1.1;
    let x = lo..hi;
    let y = 0.0..top;
    let mut chart = base_chart(area, axes.title, x.clone(), y.clone(), 50)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(axes.x_desc)
        .y_desc(axes.y_desc)
        .label_style(LABEL_FONT)
        .light_line_style(BLACK.mix(0.05))
        .draw()?;

    for &(label, hist, color) in histograms {
        chart
            .draw_series(hist.bins().filter(|(_, _, c)| *c > 0).map(|(l, r, c)| {
                Rectangle::new([(l, 0.0), (r, c as f64)], color.mix(0.6).filled())
            }))?
            .label(label)
            .legend(move |(lx, ly)| {
                Rectangle::new([(lx, ly - 5), (lx + 14, ly + 5)], color.mix(0.6).filled())
            });
    }
    draw_guides(&mut chart, guides, &x, &y)?;
    if histograms.len() > 1 {
        draw_legend(&mut chart)?;
    }
    Ok(())
}

/// Monospace text block on a tinted background.
pub fn text_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    text: &str,
) -> DrawResult<(), DB> {
    area.fill(&PANEL_TEXT_BG.mix(0.8))?;
    let font = ("monospace", 15).into_font();
    for (i, line) in text.lines().enumerate() {
        area.draw(&Text::new(
            line.to_string(),
            (20, 15 + i as i32 * 19),
            font.clone(),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_figure_format_from_path() {
        assert_eq!(FigureFormat::from_path(Path::new("a/b.png")).unwrap(), FigureFormat::Png);
        assert_eq!(FigureFormat::from_path(Path::new("b.SVG")).unwrap(), FigureFormat::Svg);
        assert!(FigureFormat::from_path(Path::new("b.jpg")).is_err());
        assert!(FigureFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_padded_range() {
        let r = padded_range(&[0.0, 1.0], 0.1);
        assert!((r.start + 0.1).abs() < 1e-12 && (r.end - 1.1).abs() < 1e-12);
        assert_eq!(padded_range(&[2.0, 2.0], 0.1), 1.5..2.5);
        assert_eq!(padded_range(&[], 0.1), -1.0..1.0);
        assert_eq!(padded_range(&[f64::NAN, 3.0], 0.0), 2.5..3.5);
    }

    #[test]
    fn test_step_range() {
        assert_eq!(step_range(&[1, 2, 3]), 1.0..3.0);
        assert_eq!(step_range(&[4]), 3.5..4.5);
        assert_eq!(step_range(&[]), 0.5..1.5);
    }

    #[test]
    fn test_category_labels() {
        let labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&labels, 0.0), "a");
        assert_eq!(category_label(&labels, 1.0000001), "b");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, 2.0), "");
        assert_eq!(category_label(&labels, -1.0), "");
        assert_eq!(category_range(2), -0.5..1.5);
    }

    #[test]
    fn test_signed_fill() {
        let fill = BarFill::Signed(GAIN_COLOR, LOSS_COLOR);
        assert_eq!(fill.color_for(0.2), GAIN_COLOR);
        assert_eq!(fill.color_for(0.0), LOSS_COLOR);
        assert_eq!(fill.color_for(-0.2), LOSS_COLOR);
    }
}
