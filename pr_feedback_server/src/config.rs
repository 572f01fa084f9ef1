//! Server configuration — loaded once from a JSON file plus environment overrides.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::services::signature::SignatureFormat;

/// Webhook shared secret. Never printed, not even in debug output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// GitHub webhook secret for HMAC validation.
    pub secret: Option<SharedSecret>,
    /// Bamboo plan key to queue, e.g. `PROJ-PLAN`.
    pub plan: Option<String>,
    /// Bamboo host name.
    pub ci_host: Option<String>,
    pub ci_port: u16,
    pub ci_user: Option<String>,
    pub ci_password: Option<String>,
    /// Port the webhook listener binds to.
    pub server_port: u16,
    /// Encoding of the `X-Hub-Signature` header.
    pub signature_format: SignatureFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            secret: None,
            plan: None,
            ci_host: None,
            ci_port: 443,
            ci_user: None,
            ci_password: None,
            server_port: 80,
            signature_format: SignatureFormat::default(),
        }
    }
}

/// Everything needed to queue a Bamboo build. Only exists when the config is complete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CiCredentials {
    pub plan: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ServerConfig {
    /// Load the config file and apply environment overrides.
    ///
    /// A missing or invalid file is not fatal: the server starts with an empty
    /// config and rejects every webhook until it is fixed.
    pub fn load(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).unwrap_or_else(|e| {
                tracing::error!(path = %path.display(), "Config file has invalid JSON: {e}");
                Self::default()
            }),
            Err(e) => {
                tracing::error!(path = %path.display(), "Config file could not be read: {e}");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.warn_missing();
        config
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Environment values win over the file so secrets can stay out of it.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup("PR_FEEDBACK_SECRET").filter(|s| !s.is_empty()) {
            self.secret = Some(SharedSecret::new(secret));
        }
        if let Some(password) = lookup("CI_PASSWORD").filter(|s| !s.is_empty()) {
            self.ci_password = Some(password);
        }
    }

    pub fn shared_secret(&self) -> Option<&SharedSecret> {
        self.secret.as_ref().filter(|s| !s.is_empty())
    }

    pub fn ci_credentials(&self) -> Option<CiCredentials> {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        Some(CiCredentials {
            plan: non_empty(&self.plan)?,
            host: non_empty(&self.ci_host)?,
            port: self.ci_port,
            user: non_empty(&self.ci_user)?,
            password: non_empty(&self.ci_password)?,
        })
    }

    fn warn_missing(&self) {
        if self.shared_secret().is_none() {
            tracing::warn!("No shared secret configured, every webhook will be rejected");
        }
        if self.ci_credentials().is_none() {
            tracing::warn!(
                "Bamboo settings incomplete (plan, ci_host, ci_user, ci_password), \
                 builds cannot be queued"
            );
        }
    }
}
