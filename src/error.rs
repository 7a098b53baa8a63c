use crate::types::AuthorizationStatus;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Discovery failed: the caller is most likely not on the appliance's local network.
    #[error("not connected to the Freebox network (check \"{url}\"): {source}")]
    NotConnected {
        url: String,
        #[source]
        source: Box<Error>,
    },

    /// Malformed input, rejected before any network call.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The authorization request reached a terminal state other than `granted`.
    #[error("authorization {status}: {}: {:#}", .status.description(), .response)]
    Authorization {
        status: AuthorizationStatus,
        response: serde_json::Value,
    },

    #[error("authorization still pending after {attempts} status checks")]
    PollingExhausted { attempts: u32 },

    #[error("authorization polling cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The appliance answered with a non-2xx status or a `success: false` envelope.
    #[error("{operation} failed{}: {detail}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Api {
        operation: &'static str,
        status: Option<u16>,
        code: Option<String>,
        detail: String,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the appliance rejected the session token of an authenticated call.
    #[must_use]
    pub fn is_session_invalid(&self) -> bool {
        matches!(
            self,
            Self::Api { code: Some(code), .. } if code == "auth_required" || code == "invalid_token"
        )
    }

    /// Whether this error came out of appliance discovery.
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }
}
