//! Passive check: a single empty upload classified by its response

use super::artifact::ProbeArtifact;
use super::{endpoint, validate_target, UPLOAD_ENDPOINT, VULNERABLE_DORK};
use crate::error::Result;
use crate::http::Transport;
use crate::models::ResultSet;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

/// Single-request heuristic classifier
#[derive(Clone)]
pub struct PassiveProbe {
    transport: Arc<dyn Transport>,
}

impl PassiveProbe {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Uploads an empty filter and classifies the script manager's answer
    pub async fn scan(&self, target: &str) -> Result<ResultSet> {
        validate_target(target)?;

        let url = endpoint(target, UPLOAD_ENDPOINT);
        let artifact = ProbeArtifact::empty();
        let response = self
            .transport
            .post_multipart(&url, artifact.filename(), artifact.content())
            .await?;
        debug!("Passive upload to {url} returned {}", response.status);

        let mut rs = ResultSet::default();
        match response.status {
            StatusCode::BAD_REQUEST => {
                rs.vulnerable = response.body.contains(VULNERABLE_DORK);
            }
            // Admin portal explicitly disabled.
            StatusCode::FORBIDDEN => rs.admin_disabled = true,
            _ => {}
        }

        Ok(rs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZuulError;
    use crate::http::HttpResponse;
    use crate::scanner::testing::{unreachable, StubTransport};

    fn probe_with(status: StatusCode, body: &'static str) -> (Arc<StubTransport>, PassiveProbe) {
        let stub = Arc::new(StubTransport::new().route("POST", UPLOAD_ENDPOINT, move |_| {
            Ok(HttpResponse::new(status, body))
        }));
        let probe = PassiveProbe::new(stub.clone());
        (stub, probe)
    }

    #[tokio::test]
    async fn test_empty_target_makes_no_requests() {
        let (stub, probe) = probe_with(StatusCode::BAD_REQUEST, VULNERABLE_DORK);

        let err = probe.scan("").await.expect_err("empty target");
        assert!(matches!(err, ZuulError::InvalidInput(_)));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn test_usage_signature_is_vulnerable() {
        let (stub, probe) = probe_with(
            StatusCode::BAD_REQUEST,
            "Usage: /scriptManager?action=<ACTION_TYPE>&<ARGS>\n",
        );

        let rs = probe.scan("http://zuul.test").await.expect("scan");
        assert_eq!(
            rs,
            ResultSet {
                vulnerable: true,
                ..ResultSet::default()
            }
        );

        let requests = stub.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://zuul.test/admin/scriptmanager?action=UPLOAD");
        assert_eq!(requests[0].filename.as_deref(), Some("Emptyfile.groovy"));
    }

    #[tokio::test]
    async fn test_forbidden_is_admin_disabled() {
        let (_, probe) = probe_with(StatusCode::FORBIDDEN, "");
        let rs = probe.scan("http://zuul.test").await.expect("scan");
        assert_eq!(
            rs,
            ResultSet {
                admin_disabled: true,
                ..ResultSet::default()
            }
        );
    }

    #[tokio::test]
    async fn test_other_statuses_are_clean() {
        for (status, body) in [
            (StatusCode::BAD_REQUEST, "bad request"),
            (StatusCode::NOT_FOUND, ""),
            (StatusCode::INTERNAL_SERVER_ERROR, ""),
            (StatusCode::OK, ""),
        ] {
            let (_, probe) = probe_with(status, body);
            let rs = probe.scan("http://zuul.test").await.expect("scan");
            assert!(rs.is_clean(), "{status} should not set any facet: {rs}");
        }
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let stub = Arc::new(
            StubTransport::new().route("POST", UPLOAD_ENDPOINT, |req| Err(unreachable(&req.url))),
        );
        let probe = PassiveProbe::new(stub);

        let err = probe.scan("http://zuul.test").await.expect_err("unreachable");
        assert!(matches!(err, ZuulError::TargetUnreachable(_)));
    }
}
