mod error;
mod github;
mod models;
mod pipeline;
mod profiles;
mod stages;

use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use github::GitHubClient;
use pipeline::LintRun;
use stages::diff_lint::{self, LintInvocation, SuppressionScope};

#[derive(Parser)]
#[command(
    name = "pr-lint",
    about = "Lint the files a pull request changes and report only new violations"
)]
struct Cli {
    /// Pull request number
    #[arg(long)]
    pr_num: u64,

    /// Repository API base, e.g. https://api.github.com/repos/owner/name
    #[arg(long)]
    repo_base: String,

    /// Language label used for the comment marker and status context (js, py, ...)
    #[arg(long)]
    language: String,

    /// Lint command; the file path is appended, or substituted for `{file}`
    #[arg(long)]
    lint_command: String,

    /// Seconds a single lint invocation may run before it is killed
    #[arg(long, default_value_t = diff_lint::DEFAULT_TIMEOUT.as_secs())]
    lint_timeout: u64,

    /// Shell globs selecting the files to lint
    #[arg(long, num_args = 1.., required = true)]
    patterns: Vec<String>,

    /// Token for comments, statuses and gists
    #[arg(long, env = "GH_API_WRITE", hide_env_values = true)]
    gh_api_write: String,

    /// Token for reading the pull request (defaults to the write token)
    #[arg(long, env = "GH_API_READ", hide_env_values = true)]
    gh_api_read: Option<String>,

    /// Head commit to attach the status to
    #[arg(long)]
    sha: String,

    /// Output regex with named groups file, line, errstr and optional col
    #[arg(long)]
    regex: Option<String>,

    /// Upload the full lint log as a gist and link it from the status
    #[arg(long)]
    upload: bool,

    /// Which "before" output suppresses an "after" line
    #[arg(long, value_enum, default_value_t = SuppressionScope::PerFile)]
    suppression: SuppressionScope,

    /// GitHub API root used for gists
    #[arg(long, default_value = "https://api.github.com")]
    api_root: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let lint = LintRun {
        pr_num: cli.pr_num,
        sha: cli.sha,
        label: profiles::label(&cli.language),
        lint: LintInvocation::new(cli.lint_command)
            .with_timeout(Duration::from_secs(cli.lint_timeout)),
        globs: diff_lint::compile_globs(&cli.patterns)?,
        pattern: profiles::resolve_pattern(cli.regex.as_deref(), &cli.language)?,
        scope: cli.suppression,
        upload: cli.upload,
    };

    let read_token = cli.gh_api_read.unwrap_or_else(|| cli.gh_api_write.clone());
    let client = GitHubClient::new(&cli.repo_base, &cli.api_root, read_token, cli.gh_api_write)?;

    tracing::info!(
        pr = lint.pr_num,
        sha = %lint.sha,
        language = %lint.label,
        "Starting lint run"
    );

    let result = pipeline::run(&client, &lint)
        .await
        .wrap_err_with(|| format!("{} lint of PR #{} failed", lint.label, lint.pr_num))?;

    if result.failed_files.is_empty() {
        println!("{} lint passed", lint.label);
    } else {
        let files: Vec<&str> = result.failed_files.iter().map(String::as_str).collect();
        println!("{} lint found new violations in: {}", lint.label, files.join(" "));
        for (file, violations) in &result.violations {
            for v in violations {
                println!("  {file}:{}:{}: {}", v.line, v.column, v.message);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 13] = [
        "pr-lint",
        "--pr-num",
        "7",
        "--repo-base",
        "https://api.github.com/repos/o/r",
        "--language",
        "js",
        "--lint-command",
        "jshint",
        "--gh-api-write",
        "token",
        "--sha",
        "abc",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        let mut args: Vec<&str> = REQUIRED.to_vec();
        args.extend(["--patterns", "*.js"]);
        args.extend(extra);
        Cli::try_parse_from(args)
    }

    #[test]
    fn lint_timeout_defaults_and_overrides() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.lint_timeout, diff_lint::DEFAULT_TIMEOUT.as_secs());

        let cli = parse(&["--lint-timeout", "5"]).unwrap();
        assert_eq!(cli.lint_timeout, 5);
    }

    #[test]
    fn suppression_scope_flag() {
        assert_eq!(parse(&[]).unwrap().suppression, SuppressionScope::PerFile);
        let cli = parse(&["--suppression", "global"]).unwrap();
        assert_eq!(cli.suppression, SuppressionScope::Global);
    }

    #[test]
    fn patterns_are_required() {
        assert!(Cli::try_parse_from(REQUIRED).is_err());
    }
}
