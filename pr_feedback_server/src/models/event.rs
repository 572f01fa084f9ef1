//! Pull-request webhook payload. Every field GitHub may omit is an `Option`.

use serde::Deserialize;

/// Actions that produce new commits worth building.
const BUILD_ACTIONS: &[&str] = &["opened", "synchronize", "reopened"];

/// PR numbers arrive as integers from GitHub and as strings from hand-made deliveries.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PrNumber {
    Int(u64),
    Text(String),
}

impl PrNumber {
    fn value(&self) -> Option<u64> {
        match self {
            PrNumber::Int(n) => Some(*n),
            PrNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Head {
    pub sha: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PullRequest {
    pub number: Option<PrNumber>,
    pub head: Option<Head>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PullRequestEvent {
    pub action: Option<String>,
    pub number: Option<PrNumber>,
    pub pull_request: Option<PullRequest>,
    /// Some senders put `head` at the top level instead of under `pull_request`.
    pub head: Option<Head>,
}

/// The two values handed to the CI server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildRequest {
    pub pull_num: u64,
    pub pull_sha: String,
}

impl PullRequestEvent {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Events without an action (hand-made deliveries) are always built.
    pub fn wants_build(&self) -> bool {
        match self.action.as_deref() {
            Some(action) => BUILD_ACTIONS.contains(&action),
            None => true,
        }
    }

    pub fn pr_number(&self) -> Option<u64> {
        self.number
            .as_ref()
            .and_then(PrNumber::value)
            .or_else(|| {
                self.pull_request
                    .as_ref()?
                    .number
                    .as_ref()
                    .and_then(PrNumber::value)
            })
    }

    pub fn head_sha(&self) -> Option<&str> {
        let nested = self.pull_request.as_ref().and_then(|pr| pr.head.as_ref());
        nested
            .and_then(|h| h.sha.as_deref())
            .or_else(|| self.head.as_ref()?.sha.as_deref())
            .filter(|sha| !sha.is_empty())
    }

    pub fn build_request(&self) -> Option<BuildRequest> {
        Some(BuildRequest {
            pull_num: self.pr_number()?,
            pull_sha: self.head_sha()?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_payload_shape() {
        let event = PullRequestEvent::parse(
            br#"{
                "action": "opened",
                "number": 42,
                "pull_request": {"number": 42, "head": {"sha": "abc123", "ref": "feature"}},
                "repository": {"full_name": "octo/repo"}
            }"#,
        )
        .unwrap();

        assert!(event.wants_build());
        assert_eq!(
            event.build_request(),
            Some(BuildRequest {
                pull_num: 42,
                pull_sha: "abc123".into()
            })
        );
    }

    #[test]
    fn string_number_and_top_level_head() {
        let event =
            PullRequestEvent::parse(br#"{"number": "7", "head": {"sha": "deadbeef"}}"#).unwrap();
        assert_eq!(event.pr_number(), Some(7));
        assert_eq!(event.head_sha(), Some("deadbeef"));
    }

    #[test]
    fn number_falls_back_to_pull_request() {
        let event = PullRequestEvent::parse(
            br#"{"pull_request": {"number": 9, "head": {"sha": "f00"}}}"#,
        )
        .unwrap();
        assert_eq!(event.pr_number(), Some(9));
    }

    #[test]
    fn missing_fields_are_absent_not_errors() {
        let event = PullRequestEvent::parse(b"{}").unwrap();
        assert_eq!(event.pr_number(), None);
        assert_eq!(event.head_sha(), None);
        assert_eq!(event.build_request(), None);
    }

    #[test]
    fn non_numeric_number_is_absent() {
        let event =
            PullRequestEvent::parse(br#"{"number": "seven", "head": {"sha": "x"}}"#).unwrap();
        assert_eq!(event.build_request(), None);
    }

    #[test]
    fn closed_action_is_not_built() {
        let event = PullRequestEvent::parse(br#"{"action": "closed", "number": 1}"#).unwrap();
        assert!(!event.wants_build());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(PullRequestEvent::parse(b"not json").is_err());
    }
}
