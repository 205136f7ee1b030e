//! advscope: visual and tabular comparison of absolute-baseline and
//! group-relative advantage estimation over a policy-gradient training run.
//!
//! A [`history::ComparisonRun`] holds both tracks; everything else reads it
//! without mutation. Capabilities the renderers need (action names, the group
//! normalizer, the correctness predicate) are passed explicitly through a
//! [`toolkit::Toolkit`].

pub mod analysis;
pub mod config;
pub mod history;
pub mod render;
pub mod report;
pub mod timer;
pub mod toolkit;
