//! Values passed between lint pipeline stages.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;

/// One file touched by the pull request, with its content on both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    /// `None` when the pull request adds the file.
    pub before: Option<String>,
    pub after: String,
}

impl ChangedFile {
    pub fn new(path: impl Into<String>, before: Option<&str>, after: &str) -> Self {
        Self {
            path: path.into(),
            before: before.map(str::to_string),
            after: after.to_string(),
        }
    }
}

/// A single rule breach reported by the lint tool. Positions stay as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LintViolation {
    pub file: String,
    pub line: String,
    pub column: String,
    pub message: String,
}

/// Violations grouped by file, in the order the lint tool reported them.
pub type ViolationsByFile = IndexMap<String, Vec<LintViolation>>;

/// An issue comment on the pull request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LintComment {
    /// Absent for a comment that has not been posted yet.
    pub id: Option<u64>,
    #[serde(default)]
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LintRunResult {
    pub failed_files: BTreeSet<String>,
    pub violations: ViolationsByFile,
    pub raw_output_log: String,
}
