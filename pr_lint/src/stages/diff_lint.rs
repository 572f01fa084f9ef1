//! Diff lint: lint each file before and after the change, keep only new output.
//!
//! Every run gets its own temporary directory. Pass 1 writes the "before"
//! content of every selected file there and lints it; only once all of pass 1
//! is done does pass 2 overwrite the same paths with the "after" content and
//! lint again. Output lines from pass 2 that already appeared in pass 1 are
//! pre-existing and dropped. Lines are compared as whole strings, so a
//! violation that merely moved to another line number counts as new.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;
use std::path::{Component, Path};
use std::process::Stdio;
use std::time::Duration;

use glob::Pattern;
use tokio::process::Command;

use crate::error::LintError;
use crate::models::ChangedFile;

/// Placeholder in `--lint-command` replaced by the file path.
const FILE_PLACEHOLDER: &str = "{file}";

/// Default per-invocation limit for `--lint-timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Shell exit codes for "not executable" and "command not found".
const SHELL_NOT_EXECUTABLE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

/// Which pass-1 output may suppress a pass-2 line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SuppressionScope {
    /// Only the same file's "before" output.
    #[default]
    PerFile,
    /// The "before" output of every file in the run.
    Global,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pass {
    Before,
    After,
}

impl Pass {
    fn name(self) -> &'static str {
        match self {
            Pass::Before => "before",
            Pass::After => "after",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffLintOutput {
    pub failed_files: BTreeSet<String>,
    /// Pass-2 lines not seen in pass 1, in the order they were produced.
    pub new_violation_lines: Vec<String>,
    pub full_log: String,
}

pub fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, LintError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| LintError::InvalidGlob {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Shell glob match; `*` also crosses `/`, so `*.py` matches `pkg/a.py`.
pub fn matches_any(path: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches(path))
}

/// How to invoke the lint tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LintInvocation {
    /// Shell command; the file path is appended or substituted for `{file}`.
    pub command: String,
    /// Limit for a single invocation. The child is killed when it expires.
    pub timeout: Duration,
}

impl LintInvocation {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Run the two-pass lint over the files matching `patterns`.
pub async fn run(
    files: &[ChangedFile],
    lint: &LintInvocation,
    patterns: &[Pattern],
    scope: SuppressionScope,
) -> Result<DiffLintOutput, LintError> {
    let selected: Vec<&ChangedFile> = files
        .iter()
        .filter(|f| matches_any(&f.path, patterns))
        .collect();
    for file in &selected {
        check_relative(&file.path)?;
    }

    tracing::info!(
        selected = selected.len(),
        total = files.len(),
        "Linting changed files"
    );

    // Removed when dropped, including on early return.
    let workspace = tempfile::Builder::new().prefix("pr-lint-").tempdir()?;
    let root = workspace.path();
    let mut output = DiffLintOutput::default();

    let mut before_by_file: HashMap<&str, HashSet<String>> = HashMap::new();
    for file in &selected {
        let Some(before) = &file.before else {
            continue;
        };
        let lines =
            lint_one(root, &file.path, before, lint, Pass::Before, &mut output.full_log).await?;
        before_by_file.entry(file.path.as_str()).or_default().extend(lines);
    }

    let global: HashSet<String> = match scope {
        SuppressionScope::Global => before_by_file.values().flatten().cloned().collect(),
        SuppressionScope::PerFile => HashSet::new(),
    };
    let empty = HashSet::new();

    for file in &selected {
        let lines =
            lint_one(root, &file.path, &file.after, lint, Pass::After, &mut output.full_log)
                .await?;
        let suppressed = match scope {
            SuppressionScope::Global => &global,
            SuppressionScope::PerFile => before_by_file.get(file.path.as_str()).unwrap_or(&empty),
        };

        let fresh: Vec<String> = lines
            .into_iter()
            .filter(|l| !suppressed.contains(l))
            .collect();
        if !fresh.is_empty() {
            tracing::info!(file = %file.path, new = fresh.len(), "New lint violations");
            output.failed_files.insert(file.path.clone());
            output.new_violation_lines.extend(fresh);
        }
    }

    workspace.close()?;
    Ok(output)
}

/// Write `content` to `root/path`, lint it, and return its output lines.
/// A zero exit yields no lines.
async fn lint_one(
    root: &Path,
    path: &str,
    content: &str,
    lint: &LintInvocation,
    pass: Pass,
    log: &mut String,
) -> Result<Vec<String>, LintError> {
    let lint_command = lint.command.as_str();
    let target = root.join(path);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, content).await?;

    // Dropping the output future on timeout kills the child.
    let child = Command::new("sh")
        .arg("-c")
        .arg(shell_script(lint_command))
        .arg("sh")
        .arg(path)
        .current_dir(root)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let result = match tokio::time::timeout(lint.timeout, child).await {
        Ok(output) => output.map_err(|source| LintError::Invocation {
            command: lint_command.to_string(),
            source,
        })?,
        Err(_) => {
            tracing::error!(file = path, pass = pass.name(), "Lint command timed out");
            return Err(LintError::Timeout {
                command: lint_command.to_string(),
                path: path.to_string(),
                timeout: lint.timeout,
            });
        }
    };

    let code = result.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&result.stdout);
    let stderr = String::from_utf8_lossy(&result.stderr);

    if code == SHELL_NOT_EXECUTABLE || code == SHELL_NOT_FOUND {
        return Err(LintError::NotRunnable {
            command: lint_command.to_string(),
            code,
            detail: stderr.trim().to_string(),
        });
    }

    let _ = writeln!(log, "== {} {} (exit {}) ==", pass.name(), path, code);
    log.push_str(&stdout);
    log.push_str(&stderr);

    if result.status.success() {
        tracing::debug!(file = path, pass = pass.name(), "Lint clean");
        return Ok(Vec::new());
    }

    Ok(stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// The file path is passed as `$1`, never spliced into the script.
fn shell_script(lint_command: &str) -> String {
    if lint_command.contains(FILE_PLACEHOLDER) {
        lint_command.replace(FILE_PLACEHOLDER, "\"$1\"")
    } else {
        format!("{lint_command} \"$1\"")
    }
}

fn check_relative(path: &str) -> Result<(), LintError> {
    let p = Path::new(path);
    let ok = !path.is_empty()
        && p.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(())
    } else {
        Err(LintError::UnsafePath(path.to_string()))
    }
}
