//! Lint pipeline — fetch changed files, diff lint, extract, comment, status.
//!
//! Only fetching and the lint tool itself can fail the run. Once results
//! exist, GitHub write failures are logged and the remaining steps still run,
//! so a broken comment never hides the commit status.

use glob::Pattern;
use thiserror::Error;

use crate::error::LintError;
use crate::github::{GitHubError, PullRequestApi};
use crate::models::{ChangedFile, LintRunResult, ViolationsByFile};
use crate::stages::comment::{self, CommentAction};
use crate::stages::diff_lint::{self, LintInvocation, SuppressionScope};
use crate::stages::extract::{self, LintPattern};
use crate::stages::status;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error(transparent)]
    Lint(#[from] LintError),
}

/// Everything one invocation of the lint pipeline needs.
#[derive(Clone, Debug)]
pub struct LintRun {
    pub pr_num: u64,
    /// Head commit the status is attached to.
    pub sha: String,
    /// Display label, e.g. `JS`.
    pub label: String,
    pub lint: LintInvocation,
    pub globs: Vec<Pattern>,
    pub pattern: LintPattern,
    pub scope: SuppressionScope,
    /// Upload the full lint log and link it from the status.
    pub upload: bool,
}

/// Collect before/after content for the changed files matching `globs`.
/// Removed files are skipped; added files have no "before". "Before" is read at
/// the merge base, so fixes landed on the base branch since do not count.
pub async fn fetch_changed_files(
    api: &dyn PullRequestApi,
    pr_num: u64,
    head_sha: &str,
    globs: &[Pattern],
) -> Result<Vec<ChangedFile>, GitHubError> {
    let base_tip = api.base_sha(pr_num).await?;
    let base_sha = api.merge_base(&base_tip, head_sha).await?;
    let mut files = Vec::new();

    for entry in api.changed_files(pr_num).await? {
        if entry.status == "removed" || !diff_lint::matches_any(&entry.filename, globs) {
            continue;
        }

        let Some(after) = api.file_content(&entry.filename, head_sha).await? else {
            tracing::warn!(file = %entry.filename, "Changed file missing at head, skipping");
            continue;
        };

        let before = if entry.status == "added" {
            None
        } else {
            let old_path = entry.previous_filename.as_deref().unwrap_or(&entry.filename);
            api.file_content(old_path, &base_sha).await?
        };

        files.push(ChangedFile {
            path: entry.filename,
            before,
            after,
        });
    }

    tracing::info!(pr = pr_num, files = files.len(), "Fetched changed files");
    Ok(files)
}

pub async fn run(
    api: &dyn PullRequestApi,
    run: &LintRun,
) -> Result<LintRunResult, PipelineError> {
    let files = fetch_changed_files(api, run.pr_num, &run.sha, &run.globs).await?;
    let diff = diff_lint::run(&files, &run.lint, &run.globs, run.scope).await?;
    let extraction = extract::extract(&diff.new_violation_lines, &run.pattern);

    tracing::info!(
        failed = diff.failed_files.len(),
        violations = extraction.count(),
        "Lint finished"
    );

    let target_url = if run.upload {
        upload_log(api, run, &diff.full_log).await
    } else {
        None
    };

    publish_comment(api, run, &extraction.violations).await;

    let commit_status = status::classify(&diff.failed_files, &run.label, target_url);
    match api.set_status(&run.sha, &commit_status).await {
        Ok(()) => {
            tracing::info!(state = ?commit_status.state, sha = %run.sha, "Commit status set")
        }
        Err(e) => tracing::error!(sha = %run.sha, "Failed to set commit status: {e}"),
    }

    Ok(LintRunResult {
        failed_files: diff.failed_files,
        violations: extraction.violations,
        raw_output_log: diff.full_log,
    })
}

async fn upload_log(api: &dyn PullRequestApi, run: &LintRun, log: &str) -> Option<String> {
    let description = format!(
        "{} lint log for PR #{} at {}",
        run.label, run.pr_num, run.sha
    );
    match api.upload_log(&description, log).await {
        Ok(url) => {
            tracing::info!(url = %url, "Uploaded lint log");
            Some(url)
        }
        Err(e) => {
            tracing::warn!("Failed to upload lint log: {e}");
            None
        }
    }
}

async fn publish_comment(
    api: &dyn PullRequestApi,
    run: &LintRun,
    violations: &ViolationsByFile,
) {
    // Without the current comments we cannot tell create from update.
    let existing = match api.list_comments(run.pr_num).await {
        Ok(existing) => existing,
        Err(e) => {
            tracing::error!(
                pr = run.pr_num,
                "Failed to list comments, not commenting: {e}"
            );
            return;
        }
    };

    let marker = comment::marker(&run.label);
    let body = comment::render_body(&marker, &run.label, violations);

    let result = match comment::upsert(&existing, body, &marker) {
        CommentAction::UpdateExisting { id, body } => {
            tracing::info!(comment_id = id, "Updating lint comment");
            api.update_comment(id, &body).await
        }
        CommentAction::CreateNew { body } => {
            tracing::info!(pr = run.pr_num, "Creating lint comment");
            api.create_comment(run.pr_num, &body).await
        }
    };

    if let Err(e) = result {
        tracing::error!(pr = run.pr_num, "Failed to publish lint comment: {e}");
    }
}
