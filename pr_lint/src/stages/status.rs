//! Commit status for a lint run.

use std::collections::BTreeSet;

use serde::Serialize;

/// GitHub rejects status descriptions longer than this.
const MAX_DESCRIPTION: usize = 140;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Success,
    Failure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitStatus {
    pub state: StatusState,
    pub description: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

pub fn classify(
    failed_files: &BTreeSet<String>,
    label: &str,
    target_url: Option<String>,
) -> CommitStatus {
    let (state, description) = if failed_files.is_empty() {
        (StatusState::Success, format!("{label} Lint passed"))
    } else {
        let files: Vec<&str> = failed_files.iter().map(String::as_str).collect();
        (
            StatusState::Failure,
            format!("{label} Lint failed for: {}", files.join(" ")),
        )
    };

    CommitStatus {
        state,
        description: truncate(description),
        context: format!("{label} lint"),
        target_url,
    }
}

fn truncate(description: String) -> String {
    if description.chars().count() <= MAX_DESCRIPTION {
        return description;
    }
    let mut cut: String = description.chars().take(MAX_DESCRIPTION - 3).collect();
    cut.push_str("...");
    cut
}
