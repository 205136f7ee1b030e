//! Declarative countdown description and a reference model of its behaviour.
//!
//! [`TimerSpec`] is the only thing that varies between timers; the browser
//! script in [`super::template`] interprets it, and [`Countdown`] replays the
//! same rules in Rust so they can be checked without a browser.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::config::TimerDefaults;

/// Seconds at or below which the display switches to the alert color.
pub const ALERT_BELOW_SECONDS: i64 = 60;
/// Interval between ticks.
pub const TICK_MILLIS: u64 = 1000;
pub const BASE_COLOR: &str = "#222";
pub const ALERT_COLOR: &str = "#d32f2f";
pub const FINISHED_TEXT: &str = "✅ Time’s up";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Whether to show a timer, optionally overriding its duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerEnabled {
    Off,
    On,
    /// Enabled, with this many minutes instead of the requested duration.
    Minutes(f64),
}

impl FromStr for TimerEnabled {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "false" | "off" | "no" => Ok(Self::Off),
            "true" | "on" | "yes" => Ok(Self::On),
            other => other
                .parse::<f64>()
                .map(Self::Minutes)
                .map_err(|_| anyhow!("expected true, false or a number of minutes, got {s:?}")),
        }
    }
}

/// The parameters a caller asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRequest {
    pub enabled: TimerEnabled,
    pub minutes: f64,
    pub warn_minutes: f64,
    pub title: String,
    pub end_message: String,
}

impl TimerRequest {
    pub fn from_defaults(defaults: &TimerDefaults) -> Self {
        Self {
            enabled: TimerEnabled::On,
            minutes: defaults.minutes,
            warn_minutes: defaults.warn_minutes,
            title: defaults.title.clone(),
            end_message: defaults.end_message.clone(),
        }
    }
}

impl Default for TimerRequest {
    fn default() -> Self {
        Self::from_defaults(&TimerDefaults::default())
    }
}

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

/// Everything the browser needs to run one countdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSpec {
    pub total_seconds: i64,
    pub warn_seconds: i64,
    pub tick_millis: u64,
    pub alert_below_seconds: i64,
    pub base_color: String,
    pub alert_color: String,
    pub title: String,
    pub warning_speech: String,
    pub finished_text: String,
    pub end_message: String,
}

impl TimerSpec {
    /// Resolve a request into a spec. `None` means nothing should be shown:
    /// the timer is off or the effective duration is not positive.
    pub fn resolve(request: &TimerRequest) -> Option<Self> {
        let minutes = match request.enabled {
            TimerEnabled::Off => return None,
            TimerEnabled::On => request.minutes,
            TimerEnabled::Minutes(m) => m,
        };
        if !(minutes > 0.0) {
            return None;
        }
        Some(Self {
            total_seconds: (minutes * 60.0).round_ties_even() as i64,
            warn_seconds: (request.warn_minutes * 60.0).round_ties_even() as i64,
            tick_millis: TICK_MILLIS,
            alert_below_seconds: ALERT_BELOW_SECONDS,
            base_color: BASE_COLOR.into(),
            alert_color: ALERT_COLOR.into(),
            title: request.title.clone(),
            warning_speech: format!("{} minutes remaining.", request.warn_minutes),
            finished_text: FINISHED_TEXT.into(),
            end_message: request.end_message.clone(),
        })
    }

    /// Iterate over every tick the browser will perform.
    pub fn countdown(&self) -> Countdown<'_> {
        Countdown {
            spec: self,
            remaining: self.total_seconds,
            warned: false,
            alerted: false,
            done: false,
        }
    }
}

/// `MM:SS` with both fields zero-padded; minutes may exceed two digits.
pub fn format_clock(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

// ---------------------------------------------------------------------------
// Countdown model
// ---------------------------------------------------------------------------

/// What the display shows after one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Display {
        /// Seconds shown by this tick.
        remaining: i64,
        text: String,
        color: String,
        /// Spoken warning emitted on this tick, if any.
        speech: Option<String>,
    },
    Finished {
        text: String,
        speech: String,
    },
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display { text, .. } => f.write_str(text),
            Self::Finished { text, .. } => f.write_str(text),
        }
    }
}

/// Replays the browser countdown one tick at a time.
#[derive(Debug, Clone)]
pub struct Countdown<'a> {
    spec: &'a TimerSpec,
    remaining: i64,
    warned: bool,
    alerted: bool,
    done: bool,
}

impl Iterator for Countdown<'_> {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        if self.done {
            return None;
        }
        if self.remaining < 0 {
            self.done = true;
            return Some(Tick::Finished {
                text: self.spec.finished_text.clone(),
                speech: self.spec.end_message.clone(),
            });
        }

        let mut speech = None;
        if !self.warned && self.spec.warn_seconds > 0 && self.remaining == self.spec.warn_seconds {
            self.warned = true;
            speech = Some(self.spec.warning_speech.clone());
        }
        // The browser never resets the color, so the alert sticks.
        if self.remaining <= self.spec.alert_below_seconds {
            self.alerted = true;
        }
        let color = if self.alerted {
            self.spec.alert_color.clone()
        } else {
            self.spec.base_color.clone()
        };

        let tick = Tick::Display {
            remaining: self.remaining,
            text: format!("{} {}", self.spec.title, format_clock(self.remaining)),
            color,
            speech,
        };
        self.remaining -= 1;
        Some(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(enabled: TimerEnabled, minutes: f64, warn: f64) -> TimerRequest {
        TimerRequest {
            enabled,
            minutes,
            warn_minutes: warn,
            ..TimerRequest::default()
        }
    }

    #[test]
    fn test_enabled_parsing() {
        assert_eq!("false".parse::<TimerEnabled>().unwrap(), TimerEnabled::Off);
        assert_eq!("True".parse::<TimerEnabled>().unwrap(), TimerEnabled::On);
        assert_eq!("2.5".parse::<TimerEnabled>().unwrap(), TimerEnabled::Minutes(2.5));
        assert!("soon".parse::<TimerEnabled>().is_err());
    }

    #[test]
    fn test_resolve() {
        assert!(TimerSpec::resolve(&request(TimerEnabled::Off, 15.0, 5.0)).is_none());
        assert!(TimerSpec::resolve(&request(TimerEnabled::On, 0.0, 5.0)).is_none());
        assert!(TimerSpec::resolve(&request(TimerEnabled::Minutes(-1.0), 15.0, 5.0)).is_none());

        let spec = TimerSpec::resolve(&request(TimerEnabled::On, 15.0, 5.0)).unwrap();
        assert_eq!(spec.total_seconds, 900);
        assert_eq!(spec.warn_seconds, 300);
        assert_eq!(spec.warning_speech, "5 minutes remaining.");
        assert_eq!(spec.title, "⏱️ Timer");

        // A numeric flag overrides the requested duration.
        let spec = TimerSpec::resolve(&request(TimerEnabled::Minutes(0.75), 15.0, 0.5)).unwrap();
        assert_eq!(spec.total_seconds, 45);
        assert_eq!(spec.warn_seconds, 30);
        assert_eq!(spec.warning_speech, "0.5 minutes remaining.");
    }

    #[test]
    fn test_half_seconds_round_to_even() {
        // 0.375 min = 22.5 s, 0.425 min = 25.5 s.
        let spec = TimerSpec::resolve(&request(TimerEnabled::On, 0.375, 0.425)).unwrap();
        assert_eq!(spec.total_seconds, 22);
        assert_eq!(spec.warn_seconds, 26);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(900), "15:00");
        assert_eq!(format_clock(6000), "100:00");
    }

    #[test]
    fn test_countdown_sequence() {
        let spec = TimerSpec::resolve(&request(TimerEnabled::Minutes(1.5), 0.0, 1.0)).unwrap();
        let ticks: Vec<Tick> = spec.countdown().collect();
        // 90..=0 displayed, then one finishing tick.
        assert_eq!(ticks.len(), 92);

        match &ticks[0] {
            Tick::Display { remaining, text, color, speech } => {
                assert_eq!(*remaining, 90);
                assert_eq!(text, "⏱️ Timer 01:30");
                assert_eq!(color, BASE_COLOR);
                assert!(speech.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let warnings: Vec<i64> = ticks
            .iter()
            .filter_map(|t| match t {
                Tick::Display { remaining, speech: Some(_), .. } => Some(*remaining),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec![60]);

        for t in &ticks {
            if let Tick::Display { remaining, color, .. } = t {
                let expected = if *remaining <= 60 { ALERT_COLOR } else { BASE_COLOR };
                assert_eq!(color, expected, "at {remaining}s");
            }
        }

        assert_eq!(
            ticks.last().unwrap(),
            &Tick::Finished {
                text: FINISHED_TEXT.into(),
                speech: "Exercise time finished".into(),
            }
        );
    }

    #[test]
    fn test_zero_warning_never_speaks() {
        let spec = TimerSpec::resolve(&request(TimerEnabled::On, 0.05, 0.0)).unwrap();
        assert_eq!(spec.total_seconds, 3);
        assert!(spec
            .countdown()
            .all(|t| !matches!(t, Tick::Display { speech: Some(_), .. })));
    }
}
