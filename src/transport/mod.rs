//! HTTP plumbing shared by [`Registrar`](crate::Registrar) and
//! [`SessionClient`](crate::SessionClient).
//!
//! Both talk to the appliance through the [`Transport`] trait so the protocol
//! logic can run against a scripted transport in tests. [`HttpTransport`] is the
//! real implementation: one `reqwest` client whose TLS trust is limited to the
//! appliance's own root CA.

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use url::Url;

use crate::error::Error;

/// Local address of the appliance, reachable only from its own network.
pub const FREEBOX_LOCAL_URL: &str = "https://mafreebox.freebox.fr";

/// Root certificate the appliance's HTTPS certificates chain to.
pub const FREEBOX_ROOT_CA: &str = include_str!("../../certs/freebox_root_ca.pem");

/// Header carrying the session token on authenticated calls (`X-Fbx-App-Auth`).
pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-fbx-app-auth");

/// A single call to the appliance. Immutable once built.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<JsonValue>,
    operation: &'static str,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: Url, operation: &'static str) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            operation,
        }
    }

    #[must_use]
    pub fn get(url: Url, operation: &'static str) -> Self {
        Self::new(Method::GET, url, operation)
    }

    #[must_use]
    pub fn post(url: Url, operation: &'static str) -> Self {
        Self::new(Method::POST, url, operation)
    }

    #[must_use]
    pub fn with_json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Header`] if `value` is not a legal header value.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self, Error> {
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&JsonValue> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

/// Executes requests against the appliance.
///
/// Implementations return the decoded JSON body of a 2xx response and map
/// everything else to an [`Error`]. No retries.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<JsonValue, Error>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<JsonValue, Error>> + Send {
        (**self).execute(request)
    }
}

/// Standard wrapper of every versioned endpoint's answer.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub(crate) success: bool,
    pub(crate) result: Option<T>,
    #[serde(default)]
    pub(crate) error_code: Option<String>,
    #[serde(default)]
    pub(crate) msg: Option<String>,
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// Decodes `body` and checks `success`.
    pub(crate) fn parse(body: JsonValue, operation: &'static str) -> Result<Self, Error> {
        let envelope: Self = serde_json::from_value(body)?;
        if envelope.success {
            return Ok(envelope);
        }
        Err(Error::Api {
            operation,
            status: None,
            code: envelope.error_code,
            detail: envelope.msg.unwrap_or_default(),
        })
    }

    /// Decodes `body`, checks `success` and requires a `result`.
    pub(crate) fn into_result(body: JsonValue, operation: &'static str) -> Result<T, Error> {
        Self::parse(body, operation)?.result.ok_or_else(|| Error::Api {
            operation,
            status: None,
            code: None,
            detail: "missing result".into(),
        })
    }
}

/// `reqwest`-backed transport trusting only the appliance root CA.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Transport pinned to the bundled [`FREEBOX_ROOT_CA`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, Error> {
        Self::with_root_ca(FREEBOX_ROOT_CA.as_bytes())
    }

    /// Transport pinned to caller-provided PEM root certificates.
    ///
    /// Built-in roots are disabled, so `pem` must hold at least one certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `pem` contains no certificate, or
    /// [`Error::Http`] if a certificate is malformed or the client cannot be built.
    pub fn with_root_ca(pem: &[u8]) -> Result<Self, Error> {
        let certificates = reqwest::Certificate::from_pem_bundle(pem)?;
        if certificates.is_empty() {
            return Err(Error::Config(
                "root CA bundle contains no PEM certificate".into(),
            ));
        }
        let builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false);
        let http = certificates
            .into_iter()
            .fold(builder, reqwest::ClientBuilder::add_root_certificate)
            .build()?;
        Ok(Self { http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(client: reqwest::Client) -> Self {
        Self { http: client }
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let (code, detail) = match serde_json::from_str::<ApiEnvelope<JsonValue>>(&body) {
            Ok(envelope) => (envelope.error_code, envelope.msg.unwrap_or(body)),
            Err(_) => (None, body),
        };
        Err(Error::Api {
            operation,
            status: Some(status),
            code,
            detail,
        })
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<JsonValue, Error> {
        let ApiRequest {
            method,
            url,
            headers,
            body,
            operation,
        } = request;
        tracing::debug!(%method, %url, operation, "appliance request");

        let mut builder = self.http.request(method, url).headers(headers);
        if let Some(body) = &body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let response = Self::ensure_success(response, operation).await?;

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_str(&text).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn test_bundled_root_ca_is_pem() {
        assert!(FREEBOX_ROOT_CA.trim_start().starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(FREEBOX_ROOT_CA.trim_end().ends_with("-----END CERTIFICATE-----"));
    }

    #[test]
    fn test_http_transport_builds_with_pinned_ca() {
        assert!(HttpTransport::new().is_ok());
    }

    #[test]
    fn test_root_ca_without_certificate_is_rejected() {
        for pem in [&b"not a certificate"[..], b"", b"   \n"] {
            assert!(
                matches!(HttpTransport::with_root_ca(pem), Err(Error::Config(_))),
                "accepted {:?}",
                String::from_utf8_lossy(pem)
            );
        }
    }

    #[test]
    fn test_root_ca_bundle_with_several_certificates() {
        let bundle = format!("{FREEBOX_ROOT_CA}\n{FREEBOX_ROOT_CA}");
        assert!(HttpTransport::with_root_ca(bundle.as_bytes()).is_ok());
    }

    #[test]
    fn test_request_builder() {
        let req = ApiRequest::post(url("https://mafreebox.freebox.fr/api/v8/login"), "login")
            .with_json(json!({"a": 1}))
            .with_header(SESSION_HEADER, "tok")
            .unwrap();
        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.operation(), "login");
        assert_eq!(req.body(), Some(&json!({"a": 1})));
        assert_eq!(req.headers().get(&SESSION_HEADER).unwrap(), "tok");
    }

    #[test]
    fn test_header_rejects_control_characters() {
        let req = ApiRequest::get(url("https://mafreebox.freebox.fr/"), "x");
        assert!(matches!(
            req.with_header(SESSION_HEADER, "bad\nvalue"),
            Err(Error::Header(_))
        ));
    }

    #[test]
    fn test_envelope_success() {
        let result: JsonValue = ApiEnvelope::into_result(
            json!({"success": true, "result": {"challenge": "c"}}),
            "challenge",
        )
        .unwrap();
        assert_eq!(result, json!({"challenge": "c"}));
    }

    #[test]
    fn test_envelope_failure_carries_code() {
        let err = ApiEnvelope::<JsonValue>::into_result(
            json!({"success": false, "error_code": "invalid_token", "msg": "nope"}),
            "session open",
        )
        .unwrap_err();
        match err {
            Error::Api {
                operation,
                code,
                detail,
                status,
            } => {
                assert_eq!(operation, "session open");
                assert_eq!(code.as_deref(), Some("invalid_token"));
                assert_eq!(detail, "nope");
                assert_eq!(status, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_envelope_missing_result() {
        let err = ApiEnvelope::<JsonValue>::into_result(json!({"success": true}), "logout")
            .unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
        assert!(ApiEnvelope::<JsonValue>::parse(json!({"success": true}), "logout").is_ok());
    }
}
