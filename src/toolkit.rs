//! Caller-supplied capabilities.
//!
//! Every figure and table depends on a few things the training notebook owns:
//! the ordered action names, the group-advantage normalizer and the
//! correctness predicate. They are passed explicitly through a [`Toolkit`].
//! Entry points resolve what they need with the `require_*` accessors before
//! doing any work, so a missing capability surfaces as
//! [`VizError::MissingSymbol`] and nothing is computed.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::analysis::advantage::compute_group_advantages;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VizError {
    #[error("{symbol} is not defined. {remedy}")]
    MissingSymbol {
        symbol: &'static str,
        remedy: &'static str,
    },
}

impl VizError {
    fn missing(symbol: &'static str, remedy: &'static str) -> Self {
        Self::MissingSymbol { symbol, remedy }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Maps the rewards of one prompt group to per-rollout advantages.
///
/// Implementations must return exactly one advantage per reward, in the same
/// order.
pub trait GroupAdvantage: Send + Sync {
    fn advantages(&self, rewards: &[f64]) -> Vec<f64>;
}

impl<F> GroupAdvantage for F
where
    F: Fn(&[f64]) -> Vec<f64> + Send + Sync,
{
    fn advantages(&self, rewards: &[f64]) -> Vec<f64> {
        self(rewards)
    }
}

/// The default normalizer: z-score within the group.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZScore;

impl GroupAdvantage for ZScore {
    fn advantages(&self, rewards: &[f64]) -> Vec<f64> {
        compute_group_advantages(rewards)
    }
}

/// Judges whether a transcript reaches the expected answer.
pub trait CorrectnessJudge: Send + Sync {
    fn is_correct(&self, transcript: &str, expected: &str) -> bool;
}

impl<F> CorrectnessJudge for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_correct(&self, transcript: &str, expected: &str) -> bool {
        self(transcript, expected)
    }
}

/// Default predicate: the transcript contains the expected answer, ignoring
/// case and runs of whitespace. An empty expected answer never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerMatch;

impl CorrectnessJudge for AnswerMatch {
    fn is_correct(&self, transcript: &str, expected: &str) -> bool {
        let expected = normalize(expected);
        if expected.is_empty() {
            return false;
        }
        normalize(transcript).contains(&expected)
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Toolkit
// ---------------------------------------------------------------------------

/// The set of capabilities handed to each entry point.
#[derive(Clone, Default)]
pub struct Toolkit {
    actions: Option<Vec<String>>,
    group_advantage: Option<Arc<dyn GroupAdvantage>>,
    correctness: Option<Arc<dyn CorrectnessJudge>>,
    drift_step: Option<usize>,
}

impl Toolkit {
    /// An empty toolkit. Every `require_*` call fails until filled in.
    pub fn new() -> Self {
        Self::default()
    }

    /// A toolkit with the default normalizer and predicate for `actions`.
    pub fn with_defaults(actions: Vec<String>) -> Self {
        Self::new()
            .with_actions(actions)
            .with_group_advantage(ZScore)
            .with_correctness(AnswerMatch)
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_group_advantage(mut self, f: impl GroupAdvantage + 'static) -> Self {
        self.group_advantage = Some(Arc::new(f));
        self
    }

    pub fn with_correctness(mut self, f: impl CorrectnessJudge + 'static) -> Self {
        self.correctness = Some(Arc::new(f));
        self
    }

    pub fn with_drift_step(mut self, step: Option<usize>) -> Self {
        self.drift_step = step;
        self
    }

    pub fn require_actions(&self) -> Result<&[String], VizError> {
        self.actions.as_deref().ok_or(VizError::missing(
            "ACTIONS",
            "Provide the ordered action names with Toolkit::with_actions, \
             in the run file's \"actions\" field, or with --actions.",
        ))
    }

    pub fn require_group_advantage(&self) -> Result<&dyn GroupAdvantage, VizError> {
        self.group_advantage.as_deref().ok_or(VizError::missing(
            "compute_group_advantages",
            "Provide a normalizer with Toolkit::with_group_advantage \
             (the built-in ZScore reproduces the training loop's default).",
        ))
    }

    pub fn require_correctness(&self) -> Result<&dyn CorrectnessJudge, VizError> {
        self.correctness.as_deref().ok_or(VizError::missing(
            "is_correct_answer",
            "Provide a predicate with Toolkit::with_correctness \
             (the built-in AnswerMatch checks for the expected answer in the transcript).",
        ))
    }

    /// Optional reward-model drift step used for annotation only.
    pub fn drift_step(&self) -> Option<usize> {
        self.drift_step
    }
}

impl fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolkit")
            .field("actions", &self.actions)
            .field("group_advantage", &self.group_advantage.is_some())
            .field("correctness", &self.correctness.is_some())
            .field("drift_step", &self.drift_step)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toolkit_names_missing_symbols() {
        let toolkit = Toolkit::new();
        let err = toolkit.require_actions().unwrap_err();
        assert!(matches!(err, VizError::MissingSymbol { symbol: "ACTIONS", .. }));
        assert!(err.to_string().starts_with("ACTIONS is not defined."));

        let err = toolkit.require_group_advantage().err().unwrap();
        assert!(err.to_string().contains("compute_group_advantages"));
        let err = toolkit.require_correctness().err().unwrap();
        assert!(err.to_string().contains("is_correct_answer"));
    }

    #[test]
    fn test_closures_are_capabilities() {
        let toolkit = Toolkit::new()
            .with_group_advantage(|r: &[f64]| r.iter().map(|x| x * 2.0).collect::<Vec<_>>())
            .with_correctness(|t: &str, e: &str| t == e);
        let adv = toolkit.require_group_advantage().unwrap().advantages(&[1.0, 2.0]);
        assert_eq!(adv, vec![2.0, 4.0]);
        assert!(toolkit.require_correctness().unwrap().is_correct("4", "4"));
        assert!(toolkit.require_actions().is_err());
    }

    #[test]
    fn test_answer_match() {
        let judge = AnswerMatch;
        assert!(judge.is_correct("The answer is   42.", "42"));
        assert!(judge.is_correct("PARIS is the capital", "paris"));
        assert!(judge.is_correct("new\n  york city", "New York"));
        assert!(!judge.is_correct("The answer is 41", "42"));
        assert!(!judge.is_correct("anything", "   "));
    }

    #[test]
    fn test_defaults_and_drift() {
        let toolkit = Toolkit::with_defaults(vec!["a".into()]).with_drift_step(Some(12));
        assert_eq!(toolkit.require_actions().unwrap(), ["a".to_string()]);
        assert_eq!(toolkit.drift_step(), Some(12));
        let z = toolkit.require_group_advantage().unwrap().advantages(&[0.0, 1.0]);
        assert!((z[0] + 1.0).abs() < 1e-9 && (z[1] - 1.0).abs() < 1e-9);
    }
}
