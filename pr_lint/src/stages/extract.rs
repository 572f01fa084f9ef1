//! Turns free-text lint output into structured violations.

use regex::Regex;

use crate::error::LintError;
use crate::models::{LintViolation, ViolationsByFile};

const REQUIRED_GROUPS: [&str; 3] = ["file", "line", "errstr"];

/// A lint output regex with named groups `file`, `line`, `errstr` and optionally `col`.
#[derive(Clone, Debug)]
pub struct LintPattern {
    regex: Regex,
}

impl LintPattern {
    pub fn new(pattern: &str) -> Result<Self, LintError> {
        let regex = Regex::new(pattern).map_err(|e| LintError::InvalidPattern(e.to_string()))?;

        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if let Some(missing) = REQUIRED_GROUPS.iter().find(|g| !names.contains(g)) {
            return Err(LintError::InvalidPattern(format!(
                "`{pattern}` has no named group `{missing}`"
            )));
        }

        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    fn parse(&self, line: &str) -> Option<LintViolation> {
        let caps = self.regex.captures(line)?;
        let group = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());
        Some(LintViolation {
            file: group("file")?,
            line: group("line")?,
            column: group("col").unwrap_or_else(|| "0".to_string()),
            message: group("errstr")?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extraction {
    pub violations: ViolationsByFile,
    /// Last non-empty line the pattern did not match, usually the tool's summary.
    pub last_unmatched: Option<String>,
}

impl Extraction {
    pub fn count(&self) -> usize {
        self.violations.values().map(Vec::len).sum()
    }
}

pub fn extract(output_lines: &[String], pattern: &LintPattern) -> Extraction {
    let mut extraction = Extraction::default();

    for line in output_lines.iter().map(|l| l.trim_end()) {
        if line.trim().is_empty() {
            continue;
        }
        match pattern.parse(line) {
            Some(violation) => extraction
                .violations
                .entry(violation.file.clone())
                .or_default()
                .push(violation),
            None => extraction.last_unmatched = Some(line.to_string()),
        }
    }

    if let Some(summary) = &extraction.last_unmatched {
        tracing::debug!(summary = %summary, "Lint output had lines outside the pattern");
    }
    extraction
}
