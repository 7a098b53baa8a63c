use std::collections::BTreeMap;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Handle returned by the appliance to follow an authorization request.
///
/// The appliance sends a number, but older firmwares and persisted files may carry
/// a string, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(untagged)]
pub enum TrackId {
    Number(u64),
    Text(String),
}

impl TrackId {
    /// Rejects the values the appliance never issues (`0` and the empty string).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the track id is empty.
    pub fn validate(&self) -> Result<(), Error> {
        let valid = match self {
            Self::Number(n) => *n != 0,
            Self::Text(s) => !s.trim().is_empty(),
        };
        if valid {
            Ok(())
        } else {
            Err(Error::Validation(vec![
                "track_id must be a non-empty string or a non-zero number".into(),
            ]))
        }
    }
}

impl From<u64> for TrackId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Short-lived token sent as `X-Fbx-App-Auth` on authenticated calls.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Permission flags granted to the session, keyed by permission name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct Permissions(pub BTreeMap<String, bool>);

impl Permissions {
    /// Whether `name` is granted. Unknown permissions are denied.
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }
}

/// Status of a pending app authorization, as reported by the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    #[display("pending")]
    Pending,
    #[display("timeout")]
    Timeout,
    #[display("granted")]
    Granted,
    #[display("denied")]
    Denied,
    /// Also covers status strings this client does not know.
    #[display("unknown")]
    #[serde(other)]
    Unknown,
}

impl AuthorizationStatus {
    /// Human-readable meaning of the status.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Pending => "The user has not confirmed the authorization request yet",
            Self::Timeout => "The user did not confirm the authorization within the given time",
            Self::Granted => "The app_token is valid and can be used to open a session",
            Self::Denied => "The user denied the authorization request",
            Self::Unknown => "The app_token is invalid or has been revoked",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Progress of a single registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RegistrationStage {
    NotStarted,
    Discovered,
    AuthorizationRequested,
    Polling,
    Granted,
    Denied,
    TimedOut,
    Unknown,
    /// Aborted by a transport error, an exhausted poll budget or cancellation.
    Failed,
}

impl RegistrationStage {
    pub(crate) fn from_terminal(status: AuthorizationStatus) -> Self {
        match status {
            AuthorizationStatus::Granted => Self::Granted,
            AuthorizationStatus::Denied => Self::Denied,
            AuthorizationStatus::Timeout => Self::TimedOut,
            AuthorizationStatus::Unknown => Self::Unknown,
            AuthorizationStatus::Pending => Self::Polling,
        }
    }
}
