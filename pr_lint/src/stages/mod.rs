//! Lint pipeline stages, in the order a run uses them.

pub mod diff_lint;
pub mod extract;
pub mod comment;
pub mod status;
