//! advscope: compare absolute-baseline and group-relative advantages
//!
//! Provides subcommands over an exported comparison run:
//!
//! - `summary`  -- Four-panel training summary plus text report
//! - `detail`   -- Six-panel breakdown of a single step
//! - `rank`     -- Ranking table for one prompt group at one step
//! - `animate`  -- Frame-by-frame comparison (GIF, or video through ffmpeg)
//! - `timer`    -- Browser countdown for exercise sessions
//! - `inspect`  -- Print the shape of a run file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use advscope::config::VizConfig;
use advscope::history::{ComparisonRun, Method};
use advscope::render::{animate_training_comparison, plot_training_summary, visualize_step_details};
use advscope::report::show_ranking_table;
use advscope::timer::{start_timer, TimerEnabled, TimerRequest};
use advscope::toolkit::{AnswerMatch, Toolkit, ZScore};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// advscope: compare absolute-baseline and group-relative advantages
#[derive(Parser)]
#[command(name = "advscope", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the exported comparison run.
    #[arg(long, global = true, default_value = "data/run.json")]
    run: PathBuf,

    /// Comma-separated action names (overrides the run file).
    #[arg(long, global = true, value_delimiter = ',')]
    actions: Option<Vec<String>>,

    /// Step at which the reward model drifted (overrides the run file).
    #[arg(long, global = true)]
    drift_step: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum MethodChoice {
    Absolute,
    Relative,
}

impl From<MethodChoice> for Method {
    fn from(choice: MethodChoice) -> Self {
        match choice {
            MethodChoice::Absolute => Method::Absolute,
            MethodChoice::Relative => Method::Relative,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Plot the training summary and print the comparison.
    Summary {
        /// Figure output path (.png or .svg).
        #[arg(long, default_value = "figures/summary.png")]
        output: PathBuf,

        /// Also write the text summary as JSON here.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Plot and print a detailed breakdown of one step.
    Detail {
        /// Zero-based step index.
        #[arg(long)]
        step: usize,

        /// Figure output path (.png or .svg).
        #[arg(long, default_value = "figures/step_detail.png")]
        output: PathBuf,
    },

    /// Print the ranking table of one prompt group.
    Rank {
        /// Zero-based step index.
        #[arg(long)]
        step: usize,

        /// Prompt id of the group to rank.
        #[arg(long)]
        prompt_id: u64,

        /// Which track to rank.
        #[arg(long, default_value = "relative")]
        method: MethodChoice,
    },

    /// Render the training comparison animation.
    Animate {
        /// Output path; `.gif` is encoded directly, other formats need ffmpeg.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Frames per second (overrides the config).
        #[arg(long)]
        fps: Option<u32>,

        /// Also write every frame as PNG into this directory.
        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },

    /// Emit a browser countdown timer.
    Timer {
        /// `true`, `false`, or a number of minutes.
        #[arg(long, default_value = "true")]
        enabled: TimerEnabled,

        /// Duration in minutes (overrides the config).
        #[arg(long)]
        minutes: Option<f64>,

        /// Spoken warning this many minutes before the end.
        #[arg(long)]
        warn_minutes: Option<f64>,

        /// Label shown before the remaining time.
        #[arg(long)]
        title: Option<String>,

        /// Spoken when the countdown finishes.
        #[arg(long)]
        end_message: Option<String>,

        /// Write a standalone HTML page here instead of printing a fragment.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the shape of a run file.
    Inspect,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => VizConfig::load_from_file(path)?,
        None => VizConfig::default(),
    };

    match &cli.command {
        Commands::Summary { output, json } => cmd_summary(&cli, &config, output, json.as_deref()),
        Commands::Detail { step, output } => cmd_detail(&cli, &config, *step, output),
        Commands::Rank {
            step,
            prompt_id,
            method,
        } => cmd_rank(&cli, *step, *prompt_id, (*method).into()),
        Commands::Animate {
            output,
            fps,
            frames_dir,
        } => cmd_animate(&cli, &config, output.as_deref(), *fps, frames_dir.as_deref()),
        Commands::Timer {
            enabled,
            minutes,
            warn_minutes,
            title,
            end_message,
            output,
        } => {
            let defaults = TimerRequest::from_defaults(&config.timer);
            let request = TimerRequest {
                enabled: *enabled,
                minutes: minutes.unwrap_or(defaults.minutes),
                warn_minutes: warn_minutes.unwrap_or(defaults.warn_minutes),
                title: title.clone().unwrap_or(defaults.title),
                end_message: end_message.clone().unwrap_or(defaults.end_message),
            };
            start_timer(&request, output.as_deref()).map(|_| ())
        }
        Commands::Inspect => cmd_inspect(&cli.run),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn load_run(cli: &Cli) -> Result<(ComparisonRun, Toolkit)> {
    let run = ComparisonRun::load_from_file(&cli.run)?;
    let mut toolkit = Toolkit::new()
        .with_group_advantage(ZScore)
        .with_correctness(AnswerMatch)
        .with_drift_step(cli.drift_step.or(run.drift_step));
    // Unset when neither source names the actions.
    if let Some(actions) = cli.actions.clone().or_else(|| run.actions.clone()) {
        toolkit = toolkit.with_actions(actions);
    }
    tracing::info!(
        path = %cli.run.display(),
        steps = run.num_steps(),
        actions = ?toolkit.require_actions().ok(),
        "Loaded run"
    );
    Ok((run, toolkit))
}

fn cmd_summary(cli: &Cli, config: &VizConfig, output: &Path, json: Option<&Path>) -> Result<()> {
    let (run, toolkit) = load_run(cli)?;
    let summary = plot_training_summary(
        &run.absolute,
        &run.relative,
        &toolkit,
        output,
        config.figures.summary_size,
    )?;
    if let Some(path) = json {
        summary.save_json(path)?;
        tracing::info!(path = %path.display(), "Saved summary JSON");
    }
    Ok(())
}

fn cmd_detail(cli: &Cli, config: &VizConfig, step: usize, output: &Path) -> Result<()> {
    let (run, toolkit) = load_run(cli)?;
    visualize_step_details(
        step,
        &run.absolute,
        &run.relative,
        &toolkit,
        output,
        &config.figures,
    )?;
    Ok(())
}

fn cmd_rank(cli: &Cli, step: usize, prompt_id: u64, method: Method) -> Result<()> {
    let (run, toolkit) = load_run(cli)?;
    let noise = (!run.reward_noise.is_empty()).then_some(&run.reward_noise);
    show_ranking_table(step, prompt_id, run.track(method), method, noise, &toolkit)
}

fn cmd_animate(
    cli: &Cli,
    config: &VizConfig,
    output: Option<&Path>,
    fps: Option<u32>,
    frames_dir: Option<&Path>,
) -> Result<()> {
    let (run, toolkit) = load_run(cli)?;
    let mut animation_config = config.animation.clone();
    if let Some(fps) = fps {
        animation_config.fps = fps;
    }
    let animation =
        animate_training_comparison(&run.absolute, &run.relative, &toolkit, animation_config, output)?;
    if let Some(dir) = frames_dir {
        let frames = animation
            .save_frames(dir)
            .with_context(|| format!("Failed to write frames to {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), frames = frames.len(), "Saved frames");
    }
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let run = ComparisonRun::load_from_file(path)?;

    println!("Comparison run: {}", path.display());
    println!("  Steps: {}", run.num_steps());
    match &run.actions {
        Some(actions) => println!("  Actions: {}", actions.join(", ")),
        None => println!("  Actions: (not recorded)"),
    }
    match run.drift_step {
        Some(step) => println!("  Reward model drift at step: {step}"),
        None => println!("  Reward model drift: none"),
    }
    println!("  Noisy prompts: {}", run.reward_noise.len());
    println!();

    for method in [Method::Absolute, Method::Relative] {
        let track = run.track(method);
        println!("{} track:", method.label());
        println!("  Policy snapshots: {}", track.policies.len());
        println!("  Rollout steps: {}", track.rollouts.len());
        println!("  Total rollouts: {}", track.total_rollouts());
        if let Some((first, last)) = track.reward_endpoints() {
            println!("  Avg reward: {first:.3} -> {last:.3}");
        }
        if let Some(last) = track.stats.last() {
            println!("  Final correctness: {:.1}%", last.correctness_rate * 100.0);
        }
        println!();
    }

    Ok(())
}
