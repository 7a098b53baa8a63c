use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Answer of the unauthenticated `api_version` discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiscoveryInfo {
    pub api_domain: String,
    #[serde(default)]
    pub https_port: Option<u16>,
    pub api_base_url: String,
    pub api_version: String,
}

/// Versioned API root, e.g. `https://mafreebox.freebox.fr/api/v8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase(Url);

impl ApiBase {
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Absolute URL of `path` below the versioned root.
    ///
    /// `Url::join` would replace the last segment (`v8`), so paths are appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.0.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{base}/{path}").parse()?)
    }
}

impl std::fmt::Display for ApiBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Major version path segment: the first character of `api_version`, trimmed.
///
/// `"8.1"` gives `"v8"`. Two-digit majors (`"10.0"`) collapse to their first
/// digit; keep callers going through this function so the rule can change in
/// one place.
///
/// # Errors
///
/// Returns [`Error::Validation`] when `api_version` is blank.
pub fn major_version_segment(api_version: &str) -> Result<String, Error> {
    let major: String = api_version.chars().take(1).collect();
    let major = major.trim();
    if major.is_empty() {
        return Err(Error::Validation(vec![
            "api_version must start with a major version digit".into(),
        ]));
    }
    Ok(format!("v{major}"))
}

/// `https://<domain>[:<port>]`, the origin a persisted bundle points at.
#[must_use]
pub fn origin_for(api_domain: &str, https_port: Option<u16>) -> String {
    match https_port {
        Some(port) => format!("https://{api_domain}:{port}"),
        None => format!("https://{api_domain}"),
    }
}

/// `<origin><api_base_url>v<major>`.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a blank version and [`Error::Url`] when the
/// pieces do not form a URL.
pub fn compute_api_base(
    origin: &str,
    api_base_url: &str,
    api_version: &str,
) -> Result<ApiBase, Error> {
    let segment = major_version_segment(api_version)?;
    let origin = origin.trim_end_matches('/');
    let url: Url = format!("{origin}{api_base_url}{segment}").parse()?;
    Ok(ApiBase(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_segment_uses_first_character() {
        assert_eq!(major_version_segment("8.1").unwrap(), "v8");
        assert_eq!(major_version_segment("5").unwrap(), "v5");
        assert_eq!(major_version_segment("4.0").unwrap(), "v4");
    }

    #[test]
    fn major_segment_truncates_two_digit_versions() {
        assert_eq!(major_version_segment("10.2").unwrap(), "v1");
    }

    #[test]
    fn major_segment_rejects_blank() {
        assert!(major_version_segment("").is_err());
        assert!(major_version_segment(" 8").is_err());
    }

    #[test]
    fn api_base_for_local_url() {
        let base =
            compute_api_base("https://mafreebox.freebox.fr", "/api/", "8.0").unwrap();
        assert_eq!(base.as_str(), "https://mafreebox.freebox.fr/api/v8");
    }

    #[test]
    fn api_base_tolerates_trailing_slash_origin() {
        let base =
            compute_api_base("https://mafreebox.freebox.fr/", "/api/", "6.0").unwrap();
        assert_eq!(base.as_str(), "https://mafreebox.freebox.fr/api/v6");
    }

    #[test]
    fn api_base_with_remote_domain_and_port() {
        let origin = origin_for("x.fbxos.fr", Some(8443));
        let base = compute_api_base(&origin, "/api/", "8.1").unwrap();
        assert_eq!(base.as_str(), "https://x.fbxos.fr:8443/api/v8");

        let origin = origin_for("x.fbxos.fr", None);
        let base = compute_api_base(&origin, "/api/", "5").unwrap();
        assert_eq!(base.as_str(), "https://x.fbxos.fr/api/v5");
    }

    #[test]
    fn endpoint_appends_below_version() {
        let base =
            compute_api_base("https://mafreebox.freebox.fr", "/api/", "8.0").unwrap();
        assert_eq!(
            base.endpoint("login/authorize/42").unwrap().as_str(),
            "https://mafreebox.freebox.fr/api/v8/login/authorize/42"
        );
        assert_eq!(
            base.endpoint("/login").unwrap().as_str(),
            "https://mafreebox.freebox.fr/api/v8/login"
        );
    }

    #[test]
    fn discovery_info_deserializes() {
        let info: DiscoveryInfo = serde_json::from_value(serde_json::json!({
            "uid": "23b86ec8091013d668829fe12791fdab",
            "device_name": "Freebox Server",
            "api_version": "8.0",
            "api_base_url": "/api/",
            "device_type": "FreeboxServer1,1",
            "api_domain": "x.fbxos.fr",
            "https_available": true,
            "https_port": 443,
        }))
        .unwrap();
        assert_eq!(info.api_domain, "x.fbxos.fr");
        assert_eq!(info.https_port, Some(443));
        assert_eq!(info.api_version, "8.0");
    }
}
