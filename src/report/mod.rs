//! Console reports.
//!
//! - [`ranking`] -- per-prompt ranking table.
//! - [`summary`] -- start-versus-end comparison of both methods.
//! - [`step_detail`] -- reward and advantage statistics of one step.
//!
//! Each report is a plain value with a `Display` impl; the `show_*` helpers
//! print it. Unavailable steps and empty selections are reported as text, not
//! as errors.

pub mod ranking;
pub mod step_detail;
pub mod summary;

pub use ranking::{
    build_ranking_table, rank_descending, show_ranking_table, RankingOutcome, RankingRow,
    RankingTable,
};
pub use step_detail::{StepDetail, StepDetailOutcome};
pub use summary::{MethodSummary, TrainingSummary};
