//! Known lint tools, keyed by the `--language` flag.
//!
//! Adding a language is a new table row; nothing else branches on the name.

use crate::error::LintError;
use crate::stages::extract::LintPattern;

/// jshint default reporter: `a.js: line 3, col 7, Missing semicolon.`
pub const JSHINT_PATTERN: &str =
    r"^(?P<file>[^:]+): line (?P<line>\d+), col (?P<col>\d+), (?P<errstr>.+)$";

/// pyflakes: `a.py:3:1: 'os' imported but unused`, older releases omit the column.
pub const PYFLAKES_PATTERN: &str =
    r"^(?P<file>[^:]+):(?P<line>\d+):(?:(?P<col>\d+):?)?\s*(?P<errstr>.+)$";

/// eslint `--format unix`: `src/a.ts:3:7: Missing semicolon. [Error/semi]`
pub const ESLINT_UNIX_PATTERN: &str =
    r"^(?P<file>[^:]+):(?P<line>\d+):(?P<col>\d+): (?P<errstr>.+)$";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LintProfile {
    pub language: &'static str,
    /// Tool the pattern was written against, shown in logs.
    pub tool: &'static str,
    pub pattern: &'static str,
}

pub const PROFILES: &[LintProfile] = &[
    LintProfile {
        language: "js",
        tool: "jshint",
        pattern: JSHINT_PATTERN,
    },
    LintProfile {
        language: "py",
        tool: "pyflakes",
        pattern: PYFLAKES_PATTERN,
    },
    LintProfile {
        language: "ts",
        tool: "eslint",
        pattern: ESLINT_UNIX_PATTERN,
    },
];

pub fn lookup(language: &str) -> Option<&'static LintProfile> {
    PROFILES
        .iter()
        .find(|p| p.language.eq_ignore_ascii_case(language))
}

/// Display label for comments and statuses, e.g. `JS`.
pub fn label(language: &str) -> String {
    language.to_uppercase()
}

/// A caller-supplied regex always wins over the built-in one.
pub fn resolve_pattern(regex: Option<&str>, language: &str) -> Result<LintPattern, LintError> {
    match regex {
        Some(custom) => LintPattern::new(custom),
        None => {
            let profile =
                lookup(language).ok_or_else(|| LintError::UnknownLanguage(language.to_string()))?;
            tracing::debug!(tool = profile.tool, "Using built-in lint output pattern");
            LintPattern::new(profile.pattern)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_pattern_compiles() {
        for profile in PROFILES {
            assert!(LintPattern::new(profile.pattern).is_ok(), "{}", profile.tool);
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("JS").map(|p| p.tool), Some("jshint"));
        assert!(lookup("cobol").is_none());
    }

    #[test]
    fn custom_regex_takes_precedence() {
        let custom = r"^(?P<file>\S+)!(?P<line>\d+)!(?P<errstr>.*)$";
        let pattern = resolve_pattern(Some(custom), "js").unwrap();
        assert_eq!(pattern.as_str(), custom);
    }

    #[test]
    fn unknown_language_needs_regex() {
        assert!(matches!(
            resolve_pattern(None, "cobol"),
            Err(LintError::UnknownLanguage(_))
        ));
        assert!(resolve_pattern(Some(JSHINT_PATTERN), "cobol").is_ok());
    }

    #[test]
    fn label_is_uppercase() {
        assert_eq!(label("js"), "JS");
    }
}
