use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::challenge;
use crate::config::CredentialBundle;
use crate::discovery::{self, ApiBase};
use crate::error::Error;
use crate::transport::{ApiEnvelope, ApiRequest, HttpTransport, SESSION_HEADER, Transport};
use crate::types::{Permissions, SessionToken};

/// Answer of the login challenge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct Challenge {
    pub challenge: String,
    #[serde(default)]
    pub logged_in: bool,
}

/// Body of the session-open call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct SessionStart {
    pub app_id: String,
    pub app_version: Option<String>,
    /// `hex(HMAC-SHA1(app_token, challenge))`
    pub password: String,
}

/// Answer of the session-open call.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct OpenedSession {
    pub session_token: SessionToken,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Session held by a [`SessionClient`]. Empty until [`SessionClient::login`].
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session_token: Option<SessionToken>,
    permissions: Option<Permissions>,
}

impl SessionState {
    #[must_use]
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref()
    }

    #[must_use]
    pub fn permissions(&self) -> Option<&Permissions> {
        self.permissions.as_ref()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.session_token.is_some()
    }

    fn clear(&mut self) {
        self.session_token = None;
        self.permissions = None;
    }
}

/// A call below the versioned API root, e.g. `Request::get("connection")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    body: Option<JsonValue>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }
}

/// Authenticated access to the appliance from a persisted [`CredentialBundle`].
///
/// [`login`](Self::login) proves possession of the app token through the
/// challenge-response exchange; the app token itself is never sent. Afterwards
/// every call carries the session token.
///
/// Calls on one client must not overlap: `login` and `logout` replace the
/// session state.
pub struct SessionClient<T = HttpTransport> {
    transport: T,
    api_base: ApiBase,
    app_id: String,
    app_token: String,
    app_version: Option<String>,
    session: SessionState,
}

impl SessionClient<HttpTransport> {
    /// Client talking to the appliance over TLS pinned to its root CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every empty required field of
    /// `bundle`, or [`Error::Http`] if the TLS client cannot be built.
    pub fn new(bundle: &CredentialBundle) -> Result<Self, Error> {
        Self::validate(bundle)?;
        Self::with_transport(bundle, HttpTransport::new()?)
    }
}

impl<T: Transport> SessionClient<T> {
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every empty required field of
    /// `bundle`, or [`Error::Url`] if the fields do not form a URL.
    pub fn with_transport(bundle: &CredentialBundle, transport: T) -> Result<Self, Error> {
        Self::validate(bundle)?;
        let origin = discovery::origin_for(&bundle.api_domain, bundle.https_port);
        let api_base =
            discovery::compute_api_base(&origin, &bundle.api_base_url, &bundle.api_version)?;

        Ok(Self {
            transport,
            api_base,
            app_id: bundle.app_id.clone(),
            app_token: bundle.app_token.clone(),
            app_version: None,
            session: SessionState::default(),
        })
    }

    fn validate(bundle: &CredentialBundle) -> Result<(), Error> {
        let violations = bundle.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(violations))
        }
    }

    /// Version reported when opening sessions. Optional.
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn api_base(&self) -> &ApiBase {
        &self.api_base
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch a fresh login challenge.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged.
    pub async fn get_challenge(&self) -> Result<Challenge, Error> {
        let body = self.send(Method::GET, "login", None, "challenge").await?;
        ApiEnvelope::into_result(body, "challenge")
    }

    /// Exchange a computed password for a session token.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged; a wrong password is an
    /// [`Error::Api`] with code `invalid_token`.
    pub async fn open_session(&self, start: &SessionStart) -> Result<OpenedSession, Error> {
        let body = self
            .send(
                Method::POST,
                "login/session",
                Some(serde_json::to_value(start)?),
                "session open",
            )
            .await?;
        ApiEnvelope::into_result(body, "session open")
    }

    /// Challenge-response login. Later calls carry the returned session token.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the challenge or session-open call. The
    /// previous session state is kept on failure.
    pub async fn login(&mut self) -> Result<(), Error> {
        let challenge = self.get_challenge().await?;
        let start = SessionStart {
            app_id: self.app_id.clone(),
            app_version: self.app_version.clone(),
            password: challenge::compute_password(&self.app_token, &challenge.challenge),
        };
        let opened = self.open_session(&start).await?;

        tracing::info!(
            app_id = %self.app_id,
            was_logged_in = challenge.logged_in,
            "session opened"
        );
        self.session = SessionState {
            session_token: Some(opened.session_token),
            permissions: Some(opened.permissions),
        };
        Ok(())
    }

    /// Raw call below the API root; returns the JSON body as sent by the appliance.
    ///
    /// If the appliance reports the session token invalid, the held session is
    /// dropped before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged.
    pub async fn request(&mut self, request: Request) -> Result<JsonValue, Error> {
        let Request { method, path, body } = request;
        let result = self.send(method, &path, body, "api call").await;
        if let Err(e) = &result {
            if e.is_session_invalid() && self.session.is_logged_in() {
                tracing::warn!(error = %e, "session token rejected, dropping session");
                self.session.clear();
            }
        }
        result
    }

    /// Like [`request`](Self::request), decoding the envelope's `result`.
    ///
    /// # Errors
    ///
    /// Returns the transport error, an [`Error::Api`] for `success: false`, or
    /// [`Error::Decode`] if `result` does not match `R`.
    pub async fn call<R: DeserializeOwned>(&mut self, request: Request) -> Result<R, Error> {
        let body = self.request(request).await?;
        ApiEnvelope::into_result(body, "api call")
    }

    /// Close the session on the appliance and forget it locally.
    ///
    /// # Errors
    ///
    /// Returns the transport error unchanged; the local session is kept in that case.
    pub async fn logout(&mut self) -> Result<(), Error> {
        let body = self.send(Method::POST, "login/logout", None, "logout").await?;
        if !body.is_null() {
            ApiEnvelope::<JsonValue>::parse(body, "logout")?;
        }
        tracing::info!(app_id = %self.app_id, "session closed");
        self.session.clear();
        Ok(())
    }

    /// Builds the request with the current session token, if any, and sends it.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        operation: &'static str,
    ) -> Result<JsonValue, Error> {
        let mut request = ApiRequest::new(method, self.api_base.endpoint(path)?, operation);
        if let Some(body) = body {
            request = request.with_json(body);
        }
        if let Some(token) = &self.session.session_token {
            request = request.with_header(SESSION_HEADER, token.as_str())?;
        }
        self.transport.execute(request).await
    }
}
