use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryInfo;
use crate::error::Error;

/// Everything needed to open sessions later without registering again.
///
/// Produced once by [`Registrar::register`](crate::Registrar::register) and
/// persisted by the caller. Every field defaults so a partial file still loads;
/// [`SessionClient`](crate::SessionClient) validates it on construction.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct CredentialBundle {
    pub app_token: String,
    pub app_id: String,
    pub api_domain: String,
    pub https_port: Option<u16>,
    pub api_base_url: String,
    pub api_version: String,
}

impl CredentialBundle {
    /// Bundle for an approved `app_token`.
    #[must_use]
    pub fn new(
        app_token: impl Into<String>,
        app_id: impl Into<String>,
        discovery: &DiscoveryInfo,
    ) -> Self {
        Self {
            app_token: app_token.into(),
            app_id: app_id.into(),
            api_domain: discovery.api_domain.clone(),
            https_port: discovery.https_port,
            api_base_url: discovery.api_base_url.clone(),
            api_version: discovery.api_version.clone(),
        }
    }

    /// Load a bundle from environment variables.
    ///
    /// # Env vars
    /// - `FBX_APP_TOKEN`, `FBX_APP_ID`, `FBX_API_DOMAIN`, `FBX_API_BASE_URL`,
    ///   `FBX_API_VERSION`: missing ones are left empty and reported by
    ///   [`SessionClient`](crate::SessionClient) validation
    /// - `FBX_HTTPS_PORT`: optional
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `FBX_HTTPS_PORT` is set but not a port number.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let var = |key: &str| lookup(key).unwrap_or_default();

        let https_port = match lookup("FBX_HTTPS_PORT").filter(|p| !p.trim().is_empty()) {
            Some(port) => Some(
                port.trim()
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("FBX_HTTPS_PORT: {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            app_token: var("FBX_APP_TOKEN"),
            app_id: var("FBX_APP_ID"),
            api_domain: var("FBX_API_DOMAIN"),
            https_port,
            api_base_url: var("FBX_API_BASE_URL"),
            api_version: var("FBX_API_VERSION"),
        })
    }

    /// Names of the required fields that are empty, in declaration order.
    pub(crate) fn violations(&self) -> Vec<String> {
        [
            ("api_domain", &self.api_domain),
            ("app_token", &self.app_token),
            ("api_base_url", &self.api_base_url),
            ("api_version", &self.api_version),
            ("app_id", &self.app_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("{name} is required and must be a non-empty string"))
        .collect()
    }
}

impl std::fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("app_token", &"***")
            .field("app_id", &self.app_id)
            .field("api_domain", &self.api_domain)
            .field("https_port", &self.https_port)
            .field("api_base_url", &self.api_base_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Cadence and budget of the approval wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub(crate) interval: Duration,
    pub(crate) max_attempts: Option<u32>,
}

impl PollPolicy {
    const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    const DEFAULT_MAX_ATTEMPTS: u32 = 150;

    /// Poll every `interval`, forever.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_attempts: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl Default for PollPolicy {
    /// Every 2 seconds, at most 150 times (5 minutes).
    fn default() -> Self {
        Self::unbounded().with_max_attempts(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// Options of [`Registrar::register`](crate::Registrar::register).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Suppress the operator-facing notices.
    pub silent: bool,
}

impl RegisterOptions {
    #[must_use]
    pub fn silent() -> Self {
        Self { silent: true }
    }
}
