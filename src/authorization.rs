//! Waiting for the operator to approve an authorization request.
//!
//! The appliance only reports progress when asked, so the client polls the
//! status endpoint on a fixed cadence. Each check completes before the next one
//! is scheduled, and the loop returns exactly once with a [`PollOutcome`].

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cancel::CancelToken;
use crate::config::PollPolicy;
use crate::error::Error;
use crate::types::AuthorizationStatus;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// One status check: the parsed status plus the raw answer for diagnostics.
#[derive(Debug, Clone)]
pub struct AuthorizationProgress {
    pub status: AuthorizationStatus,
    pub response: JsonValue,
}

impl AuthorizationProgress {
    /// Reads `result.status` out of a status-endpoint answer.
    pub(crate) fn from_response(response: JsonValue) -> Result<Self, Error> {
        #[derive(Deserialize)]
        struct StatusResult {
            status: AuthorizationStatus,
        }

        let result: StatusResult =
            crate::transport::ApiEnvelope::into_result(response.clone(), "authorization status")?;
        Ok(Self {
            status: result.status,
            response,
        })
    }
}

/// Terminal result of the polling loop.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Granted {
        attempts: u32,
    },
    /// `denied`, `timeout` or `unknown`.
    Rejected {
        status: AuthorizationStatus,
        response: JsonValue,
        attempts: u32,
    },
}

impl PollOutcome {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Granted { attempts } | Self::Rejected { attempts, .. } => *attempts,
        }
    }

    /// `Ok` on grant, [`Error::Authorization`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] for a rejected request.
    pub fn into_result(self) -> Result<u32, Error> {
        match self {
            Self::Granted { attempts } => Ok(attempts),
            Self::Rejected {
                status, response, ..
            } => Err(Error::Authorization { status, response }),
        }
    }
}

/// Runs `check` every `policy.interval` until a terminal status.
///
/// The first check happens one interval after the call. Transport errors from
/// `check` end the loop immediately.
pub(crate) async fn poll_until_resolved<F, Fut>(
    policy: &PollPolicy,
    cancel: &mut CancelToken,
    mut check: F,
) -> Result<PollOutcome, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AuthorizationProgress, Error>>,
{
    // tokio intervals must be non-zero
    let period = policy.interval.max(MIN_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(attempts, "authorization polling cancelled");
                return Err(Error::Cancelled);
            }
            _ = ticker.tick() => {}
        }

        attempts += 1;
        let progress = check().await?;
        tracing::debug!(attempts, status = %progress.status, "authorization status");

        match progress.status {
            AuthorizationStatus::Pending => {
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    tracing::debug!(attempts, "authorization still pending, giving up");
                    return Err(Error::PollingExhausted { attempts });
                }
            }
            AuthorizationStatus::Granted => return Ok(PollOutcome::Granted { attempts }),
            status => {
                return Ok(PollOutcome::Rejected {
                    status,
                    response: progress.response,
                    attempts,
                });
            }
        }
    }
}
