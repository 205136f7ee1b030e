//! Browser countdown timer.
//!
//! - [`spec::TimerSpec`] -- declarative description (duration, warning,
//!   labels, colors) resolved from a [`spec::TimerRequest`].
//! - [`spec::Countdown`] -- the tick-by-tick behaviour the browser follows.
//! - [`template`] -- renders a spec into an HTML fragment or page.
//!
//! Rendering is fire-and-forget: once the page is shown, nothing reports back.

pub mod spec;
pub mod template;

use std::path::Path;

use anyhow::Result;
use tracing::info;

pub use spec::{format_clock, Countdown, Tick, TimerEnabled, TimerRequest, TimerSpec};
pub use template::{render_fragment, render_page, write_page};

/// Emit a countdown for `request`.
///
/// With an output path a standalone page is written there; otherwise the
/// embeddable fragment is printed to stdout. Returns the resolved spec, or
/// `None` when the request disables the timer.
pub fn start_timer(request: &TimerRequest, output: Option<&Path>) -> Result<Option<TimerSpec>> {
    let Some(spec) = TimerSpec::resolve(request) else {
        info!(enabled = ?request.enabled, minutes = request.minutes, "Timer disabled");
        return Ok(None);
    };
    match output {
        Some(path) => write_page(&spec, path)?,
        None => println!("{}", render_fragment(&spec)?),
    }
    Ok(Some(spec))
}
