//! Lint result comment: one per pull request and language, updated in place.
//!
//! The first line of the comment is a marker naming the language. On every
//! run the existing comments are scanned for that marker; a match is edited,
//! otherwise a single new comment is posted.

use crate::models::{LintComment, ViolationsByFile};

const ALL_CLEAR: &str = "Lint all good :shipit:";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommentAction {
    CreateNew { body: String },
    UpdateExisting { id: u64, body: String },
}

/// Marker line identifying this tool's comment for one language.
pub fn marker(label: &str) -> String {
    format!("AUTOMATIC {label} LINT RESULTS DO NOT EDIT")
}

pub fn render_body(marker: &str, label: &str, violations: &ViolationsByFile) -> String {
    let mut body = format!("{marker}\n\n");

    if violations.is_empty() {
        body.push_str(ALL_CLEAR);
        return body;
    }

    let sections: Vec<String> = violations
        .iter()
        .map(|(file, found)| {
            let mut section = format!("{label} Lint Errors for {file}");
            for v in found {
                section.push_str(&format!("\n\t{},{}: {}", v.line, v.column, v.message));
            }
            section
        })
        .collect();
    body.push_str(&sections.join("\n\n"));
    body
}

/// Decide how to publish `new_body` given the comments already on the pull request.
pub fn upsert(existing: &[LintComment], new_body: String, marker: &str) -> CommentAction {
    let found = existing
        .iter()
        .filter(|c| c.body.starts_with(marker))
        .find_map(|c| c.id);

    match found {
        Some(id) => CommentAction::UpdateExisting { id, body: new_body },
        None => CommentAction::CreateNew { body: new_body },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LintViolation;
    use indexmap::IndexMap;

    fn comment(id: u64, body: &str) -> LintComment {
        LintComment {
            id: Some(id),
            body: body.to_string(),
        }
    }

    fn violation(file: &str, line: &str, col: &str, message: &str) -> LintViolation {
        LintViolation {
            file: file.into(),
            line: line.into(),
            column: col.into(),
            message: message.into(),
        }
    }

    #[test]
    fn no_comments_creates_new_all_clear() {
        let marker = "AUTOMATIC JS LINT";
        let body = render_body(marker, "JS", &IndexMap::new());
        let action = upsert(&[], body, marker);

        match action {
            CommentAction::CreateNew { body } => {
                assert!(body.starts_with(marker));
                assert!(body.contains("Lint all good"));
            }
            other => panic!("expected CreateNew, got {other:?}"),
        }
    }

    #[test]
    fn single_marker_comment_is_updated() {
        let marker = marker("JS");
        let existing = vec![
            comment(1, "LGTM"),
            comment(2, &format!("{marker}\n\nold results")),
            comment(3, "please fix"),
        ];
        let action = upsert(&existing, "fresh".into(), &marker);
        assert_eq!(
            action,
            CommentAction::UpdateExisting {
                id: 2,
                body: "fresh".into()
            }
        );
    }

    #[test]
    fn marker_must_prefix_the_body() {
        let marker = marker("JS");
        let existing = vec![comment(1, &format!("quoting: {marker}"))];
        assert!(matches!(
            upsert(&existing, "b".into(), &marker),
            CommentAction::CreateNew { .. }
        ));
    }

    #[test]
    fn other_language_marker_is_not_touched() {
        let existing = vec![comment(8, &marker("PY"))];
        assert!(matches!(
            upsert(&existing, "b".into(), &marker("JS")),
            CommentAction::CreateNew { .. }
        ));
    }

    #[test]
    fn first_marker_comment_wins() {
        let marker = marker("JS");
        let existing = vec![comment(4, &marker), comment(5, &marker)];
        assert!(matches!(
            upsert(&existing, "b".into(), &marker),
            CommentAction::UpdateExisting { id: 4, .. }
        ));
    }

    #[test]
    fn comment_without_id_cannot_be_updated() {
        let marker = marker("JS");
        let existing = vec![LintComment {
            id: None,
            body: marker.clone(),
        }];
        assert!(matches!(
            upsert(&existing, "b".into(), &marker),
            CommentAction::CreateNew { .. }
        ));
    }

    #[test]
    fn violations_are_listed_per_file() {
        let mut violations = IndexMap::new();
        violations.insert(
            "b.js".to_string(),
            vec![
                violation("b.js", "3", "7", "Missing semicolon."),
                violation("b.js", "9", "0", "'x' is not defined."),
            ],
        );
        violations.insert("a.js".to_string(), vec![violation("a.js", "1", "1", "Bad line.")]);

        let body = render_body("MARK", "JS", &violations);
        assert_eq!(
            body,
            "MARK\n\n\
             JS Lint Errors for b.js\n\
             \t3,7: Missing semicolon.\n\
             \t9,0: 'x' is not defined.\n\
             \n\
             JS Lint Errors for a.js\n\
             \t1,1: Bad line."
        );
        assert!(!body.contains(ALL_CLEAR));
    }

    proptest::proptest! {
        #[test]
        fn prop_update_iff_marker_comment_with_id(
            entries in proptest::collection::vec(
                (proptest::option::of(0u64..1000), proptest::bool::ANY, "[a-z ]{0,20}"),
                0..8,
            ),
        ) {
            let marker = marker("JS");
            let existing: Vec<LintComment> = entries
                .iter()
                .map(|(id, tagged, text)| LintComment {
                    id: *id,
                    body: if *tagged { format!("{marker}\n\n{text}") } else { text.clone() },
                })
                .collect();
            let expected = existing
                .iter()
                .find(|c| c.id.is_some() && c.body.starts_with(&marker))
                .and_then(|c| c.id);

            match upsert(&existing, "new".into(), &marker) {
                CommentAction::UpdateExisting { id, .. } => {
                    proptest::prop_assert_eq!(Some(id), expected)
                }
                CommentAction::CreateNew { .. } => proptest::prop_assert_eq!(None, expected),
            }
        }
    }
}
