//! Zuul admin console probes and the passive scan orchestrator

pub mod active;
pub mod artifact;
pub mod orchestrator;
pub mod passive;

pub use active::{ActiveProbe, Sleeper, TokioSleeper};
pub use orchestrator::{ScanEvent, ScanOrchestrator, ScanStream, ScanSummary};
pub use passive::PassiveProbe;

use crate::error::{Result, ZuulError};

/// Registry id of the uploaded verification filter
pub const VCHECK_FILTER_ID: &str = "origin:Vulncheck:pre";

pub const FILTERS_ENDPOINT: &str = "/admin/filterLoader.jsp";
pub const SET_FILTER_ENDPOINT: &str = "/admin/scriptmanager";
pub const UPLOAD_ENDPOINT: &str = "/admin/scriptmanager?action=UPLOAD";
pub const VCHECK_ENDPOINT: &str = "/vulncheck-spt";

/// Body of the usage error the script manager returns for a bad upload
pub const VULNERABLE_DORK: &str = "Usage: /scriptManager?action=<ACTION_TYPE>&<ARGS>";
/// Appears in upload errors when the Cassandra Hystrix dependency is missing
pub const CASSANDRA_DORK: &str = "HystrixCassandraPut";
/// Body served by the verification filter once active
pub const VCHECK_CONFIRMATION: &str = "vulnerable";

/// Rejects empty targets before any request is made
fn validate_target(target: &str) -> Result<()> {
    if target.trim().is_empty() {
        return Err(ZuulError::InvalidInput("target can not be empty".to_string()));
    }
    Ok(())
}

/// Joins a target base URL and a fixed endpoint suffix
fn endpoint(target: &str, suffix: &str) -> String {
    format!("{}{}", target.trim_end_matches('/'), suffix)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted [`Transport`] double shared by the probe tests

    use crate::error::{Result, ZuulError};
    use crate::http::{HttpResponse, Transport};
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Handler = Box<dyn Fn(&Request) -> Result<HttpResponse> + Send + Sync>;

    /// A request as seen by the double
    #[derive(Debug, Clone)]
    pub struct Request {
        pub method: &'static str,
        pub url: String,
        pub form: Vec<(String, String)>,
        pub filename: Option<String>,
    }

    /// Routes requests by method and URL suffix; unrouted requests get 404
    pub struct StubTransport {
        routes: Vec<(&'static str, String, Handler)>,
        log: Mutex<Vec<Request>>,
    }

    impl StubTransport {
        pub fn new() -> Self {
            Self {
                routes: Vec::new(),
                log: Mutex::new(Vec::new()),
            }
        }

        pub fn route<F>(mut self, method: &'static str, suffix: &str, handler: F) -> Self
        where
            F: Fn(&Request) -> Result<HttpResponse> + Send + Sync + 'static,
        {
            self.routes.push((method, suffix.to_string(), Box::new(handler)));
            self
        }

        pub fn requests(&self) -> Vec<Request> {
            self.log.lock().expect("log lock").clone()
        }

        pub fn count(&self, method: &str, suffix: &str) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.method == method && r.url.ends_with(suffix))
                .count()
        }

        fn dispatch(&self, request: Request) -> Result<HttpResponse> {
            self.log.lock().expect("log lock").push(request.clone());
            // Longest suffix wins so the upload route beats the bare script manager.
            let handler = self
                .routes
                .iter()
                .filter(|(method, suffix, _)| *method == request.method && request.url.ends_with(suffix.as_str()))
                .max_by_key(|(_, suffix, _)| suffix.len());
            match handler {
                Some((_, _, handler)) => handler(&request),
                None => Ok(HttpResponse::new(reqwest::StatusCode::NOT_FOUND, "")),
            }
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn get(&self, url: &str) -> Result<HttpResponse> {
            self.dispatch(Request {
                method: "GET",
                url: url.to_string(),
                form: Vec::new(),
                filename: None,
            })
        }

        async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse> {
            self.dispatch(Request {
                method: "POST",
                url: url.to_string(),
                form: form
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                filename: None,
            })
        }

        async fn post_multipart(
            &self,
            url: &str,
            filename: &str,
            _content: &[u8],
        ) -> Result<HttpResponse> {
            self.dispatch(Request {
                method: "POST",
                url: url.to_string(),
                form: Vec::new(),
                filename: Some(filename.to_string()),
            })
        }
    }

    pub fn unreachable(url: &str) -> ZuulError {
        ZuulError::TargetUnreachable(url.to_string())
    }
}
