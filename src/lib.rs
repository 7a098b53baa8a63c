#![doc = include_str!("../README.md")]

pub mod authorization;
pub mod cancel;
pub mod challenge;
pub mod config;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod register;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenient access
pub use authorization::{AuthorizationProgress, PollOutcome};
pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use challenge::compute_password;
pub use config::{CredentialBundle, PollPolicy, RegisterOptions};
pub use discovery::{ApiBase, DiscoveryInfo, compute_api_base, major_version_segment};
pub use error::Error;
pub use identity::AppIdentity;
pub use register::{AuthorizationTicket, Registrar};
pub use session::{Challenge, OpenedSession, Request, SessionClient, SessionStart, SessionState};
pub use transport::{
    ApiRequest, FREEBOX_LOCAL_URL, FREEBOX_ROOT_CA, HttpTransport, SESSION_HEADER, Transport,
};
pub use types::{AuthorizationStatus, Permissions, RegistrationStage, SessionToken, TrackId};
