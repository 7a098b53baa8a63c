use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix the appliance expects on application identifiers.
pub const APP_ID_PREFIX: &str = "fbx.";

const DEFAULT_APP_NAME_PREFIX: &str = "rust_app";
const DEFAULT_APP_VERSION: &str = "1.0.0";
const DEFAULT_DEVICE_NAME: &str = "Rust";

const SUFFIX_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LENGTH: usize = 9;

/// Identity of the calling application, shown to the operator on the appliance.
///
/// Serialized as the body of the authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AppIdentity {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub device_name: String,
}

impl AppIdentity {
    /// Builds an identity, filling in whatever is missing.
    ///
    /// Empty strings count as missing. With neither value, both are generated from
    /// a random suffix; with only one, the other is derived from it plus the suffix.
    #[must_use]
    pub fn new(app_id: Option<String>, app_name: Option<String>) -> Self {
        let app_id = app_id.filter(|s| !s.is_empty());
        let app_name = app_name.filter(|s| !s.is_empty());
        let suffix = generate_suffix();

        let (app_id, app_name) = match (app_id, app_name) {
            (Some(id), Some(name)) => (id, name),
            (None, Some(name)) => (format!("{APP_ID_PREFIX}{name}{suffix}"), name),
            (Some(id), None) => {
                let name = format!("{id}{suffix}");
                (id, name)
            }
            (None, None) => {
                let name = format!("{DEFAULT_APP_NAME_PREFIX}{suffix}");
                (format!("{APP_ID_PREFIX}{name}"), name)
            }
        };

        Self {
            app_id,
            app_name,
            app_version: DEFAULT_APP_VERSION.into(),
            device_name: DEFAULT_DEVICE_NAME.into(),
        }
    }

    /// Fully generated identity.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(None, None)
    }

    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    #[must_use]
    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self::generate()
    }
}

/// `_` followed by 9 random lowercase base-36 characters.
fn generate_suffix() -> String {
    let mut rng = rand::rng();
    let mut suffix = String::with_capacity(SUFFIX_LENGTH + 1);
    suffix.push('_');
    for _ in 0..SUFFIX_LENGTH {
        let idx = rng.random_range(0..SUFFIX_CHARSET.len());
        suffix.push(char::from(SUFFIX_CHARSET[idx]));
    }
    suffix
}
