//! Lint run errors. A lint tool exiting non-zero is not one of them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LintError {
    #[error("failed to start lint command `{command}`: {source}")]
    Invocation {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The shell ran but the lint executable was missing or not executable.
    #[error("lint command `{command}` could not run (exit {code}): {detail}")]
    NotRunnable {
        command: String,
        code: i32,
        detail: String,
    },

    #[error("lint command `{command}` timed out after {timeout:?} on {path}")]
    Timeout {
        command: String,
        path: String,
        timeout: std::time::Duration,
    },

    #[error("refusing to lint a path outside the repository: {0}")]
    UnsafePath(String),

    #[error("could not prepare lint workspace: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("invalid lint output pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid file glob `{pattern}`: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("no built-in output pattern for language `{0}`; pass --regex")]
    UnknownLanguage(String),
}
