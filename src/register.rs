use serde::Deserialize;
use url::Url;

use crate::authorization::{self, AuthorizationProgress, PollOutcome};
use crate::cancel::CancelToken;
use crate::config::{CredentialBundle, PollPolicy, RegisterOptions};
use crate::discovery::{self, ApiBase, DiscoveryInfo};
use crate::error::Error;
use crate::identity::AppIdentity;
use crate::transport::{ApiEnvelope, ApiRequest, FREEBOX_LOCAL_URL, HttpTransport, Transport};
use crate::types::{RegistrationStage, TrackId};

/// Answer of the authorization request.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct AuthorizationTicket {
    /// Long-lived secret; only usable once the request is granted.
    pub app_token: String,
    pub track_id: TrackId,
}

/// One-time registration of an application with the appliance.
///
/// Must run from the appliance's local network: the operator has to approve the
/// request on the appliance itself.
///
/// ```rust,ignore
/// use fbx_pairing::{AppIdentity, RegisterOptions, Registrar};
///
/// let mut registrar = Registrar::new(AppIdentity::new(None, Some("homebot".into())))?;
/// let bundle = registrar.register(RegisterOptions::default()).await?;
/// // persist `bundle`, then build a SessionClient from it on later runs
/// ```
pub struct Registrar<T = HttpTransport> {
    identity: AppIdentity,
    local_url: Url,
    transport: T,
    poll_policy: PollPolicy,
    cancel: CancelToken,
    discovery: Option<(DiscoveryInfo, ApiBase)>,
    stage: RegistrationStage,
}

impl Registrar<HttpTransport> {
    /// Registrar talking to the appliance over TLS pinned to its root CA.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the TLS client cannot be built.
    pub fn new(identity: AppIdentity) -> Result<Self, Error> {
        Ok(Self::with_transport(identity, HttpTransport::new()?))
    }
}

impl<T: Transport> Registrar<T> {
    #[must_use]
    pub fn with_transport(identity: AppIdentity, transport: T) -> Self {
        Self {
            identity,
            local_url: FREEBOX_LOCAL_URL.parse().expect("valid default URL"),
            transport,
            poll_policy: PollPolicy::default(),
            cancel: CancelToken::never(),
            discovery: None,
            stage: RegistrationStage::NotStarted,
        }
    }

    /// Override the appliance's local address.
    #[must_use]
    pub fn with_local_url(mut self, url: Url) -> Self {
        self.local_url = url;
        self
    }

    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Abort the approval wait when `token` is cancelled.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    #[must_use]
    pub fn stage(&self) -> RegistrationStage {
        self.stage
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Versioned API root, once discovery has run.
    #[must_use]
    pub fn api_base(&self) -> Option<&ApiBase> {
        self.discovery.as_ref().map(|(_, base)| base)
    }

    /// Fetch the appliance's API description. Cached for the registrar's lifetime.
    ///
    /// # Errors
    ///
    /// Every failure is wrapped in [`Error::NotConnected`].
    pub async fn discover(&mut self) -> Result<DiscoveryInfo, Error> {
        self.discovered().await.map(|(info, _)| info)
    }

    async fn discovered(&mut self) -> Result<(DiscoveryInfo, ApiBase), Error> {
        if let Some(found) = &self.discovery {
            return Ok(found.clone());
        }

        let (info, base) = match self.fetch_discovery().await {
            Ok(found) => found,
            Err(source) => {
                self.stage = RegistrationStage::Failed;
                return Err(Error::NotConnected {
                    url: self.origin().to_owned(),
                    source: Box::new(source),
                });
            }
        };

        tracing::debug!(api_base = %base, api_version = %info.api_version, "appliance discovered");
        self.discovery = Some((info.clone(), base.clone()));
        self.stage = RegistrationStage::Discovered;
        Ok((info, base))
    }

    async fn fetch_discovery(&self) -> Result<(DiscoveryInfo, ApiBase), Error> {
        let url = format!("{}/api_version", self.origin()).parse()?;
        let body = self
            .transport
            .execute(ApiRequest::get(url, "discovery"))
            .await?;
        let info: DiscoveryInfo = serde_json::from_value(body)?;
        let base = discovery::compute_api_base(self.origin(), &info.api_base_url, &info.api_version)?;
        Ok((info, base))
    }

    /// Ask the appliance to register this application.
    ///
    /// Returns as soon as the request is recorded; approval happens on the
    /// appliance and is observed with [`poll_authorization`](Self::poll_authorization).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if discovery has to run and fails, or the
    /// transport error of the request.
    pub async fn request_authorization(&mut self) -> Result<AuthorizationTicket, Error> {
        let base = self.ensure_discovered().await?;
        let request = ApiRequest::post(base.endpoint("login/authorize")?, "authorization request")
            .with_json(serde_json::to_value(&self.identity)?);

        let ticket = self.send_for_result::<AuthorizationTicket>(request).await;
        match ticket {
            Ok(ticket) => {
                tracing::debug!(track_id = %ticket.track_id, app_id = %self.identity.app_id, "authorization requested");
                self.stage = RegistrationStage::AuthorizationRequested;
                Ok(ticket)
            }
            Err(e) => {
                self.stage = RegistrationStage::Failed;
                Err(e)
            }
        }
    }

    /// Single status check of an authorization request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty `track_id` (before any network
    /// call), [`Error::NotConnected`] if discovery fails, or the transport error.
    pub async fn authorization_status(
        &mut self,
        track_id: &TrackId,
    ) -> Result<AuthorizationProgress, Error> {
        track_id.validate()?;
        let base = self.ensure_discovered().await?;
        self.check_status(&base, track_id).await
    }

    /// Wait until the operator answers the authorization request.
    ///
    /// Polls every [`PollPolicy::interval`], one check at a time, and stops on the
    /// first terminal status, transport error, exhausted budget or cancellation.
    /// `denied`, `timeout` and `unknown` come back as [`PollOutcome::Rejected`];
    /// [`PollOutcome::into_result`] turns them into [`Error::Authorization`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty `track_id`,
    /// [`Error::PollingExhausted`], [`Error::Cancelled`], or the transport error.
    pub async fn poll_authorization(&mut self, track_id: &TrackId) -> Result<PollOutcome, Error> {
        track_id.validate()?;
        let base = self.ensure_discovered().await?;
        self.stage = RegistrationStage::Polling;

        let mut cancel = self.cancel.clone();
        let this = &*self;
        let base = &base;
        let outcome = authorization::poll_until_resolved(&this.poll_policy, &mut cancel, move || {
            this.check_status(base, track_id)
        })
        .await;

        self.stage = match &outcome {
            Ok(PollOutcome::Granted { .. }) => RegistrationStage::Granted,
            Ok(PollOutcome::Rejected { status, .. }) => RegistrationStage::from_terminal(*status),
            Err(_) => RegistrationStage::Failed,
        };
        if let Ok(PollOutcome::Rejected { status, .. }) = &outcome {
            tracing::debug!(%status, "authorization rejected");
        }
        outcome
    }

    /// Discovery, authorization request and approval wait in one go.
    ///
    /// Unless `options.silent`, operator-facing notices are logged at each step.
    /// Everything else this registrar logs stays at `debug` level.
    ///
    /// # Errors
    ///
    /// Propagates the first failure; see [`discover`](Self::discover) and
    /// [`poll_authorization`](Self::poll_authorization).
    pub async fn register(&mut self, options: RegisterOptions) -> Result<CredentialBundle, Error> {
        let info = match self.discover().await {
            Ok(info) => info,
            Err(e) => {
                if !options.silent {
                    tracing::error!(
                        url = %self.origin(),
                        "You are probably not connected to your Freebox network"
                    );
                }
                return Err(e);
            }
        };

        let ticket = self.request_authorization().await?;
        if !options.silent {
            tracing::info!(
                "Please check your Freebox Server LCD screen and authorize application access to register your app"
            );
        }

        let outcome = self.poll_authorization(&ticket.track_id).await?;
        if let PollOutcome::Rejected { status, .. } = &outcome {
            if !options.silent {
                tracing::warn!(%status, "{}", status.description());
            }
        }
        outcome.into_result()?;

        let bundle = CredentialBundle::new(ticket.app_token, self.identity.app_id.clone(), &info);
        if !options.silent {
            tracing::info!(
                app_id = %bundle.app_id,
                api_domain = %bundle.api_domain,
                "Your app has been granted access; store the credential bundle safely"
            );
        }
        Ok(bundle)
    }

    fn origin(&self) -> &str {
        self.local_url.as_str().trim_end_matches('/')
    }

    async fn ensure_discovered(&mut self) -> Result<ApiBase, Error> {
        self.discovered().await.map(|(_, base)| base)
    }

    async fn check_status(
        &self,
        base: &ApiBase,
        track_id: &TrackId,
    ) -> Result<AuthorizationProgress, Error> {
        let url = base.endpoint(&format!("login/authorize/{track_id}"))?;
        let body = self
            .transport
            .execute(ApiRequest::get(url, "authorization status"))
            .await?;
        AuthorizationProgress::from_response(body)
    }

    async fn send_for_result<R: serde::de::DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<R, Error> {
        let operation = request.operation();
        let body = self.transport.execute(request).await?;
        ApiEnvelope::into_result(body, operation)
    }
}
