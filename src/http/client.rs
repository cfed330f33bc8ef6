//! HTTP transport used by the probes, plus its reqwest-backed implementation

use crate::error::{Result, ZuulError};
use crate::models::ScanConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Multipart field the Zuul script manager reads uploads from
pub const UPLOAD_FIELD: &str = "upload";

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Boundary between the probes and the network.
///
/// Implementations must not follow redirects: a 302 has to reach the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a GET request
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    /// Sends an url-encoded form POST
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse>;

    /// Uploads `content` as a multipart file named `filename` under the `upload` field
    async fn post_multipart(
        &self,
        url: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<HttpResponse>;
}

/// reqwest client wrapper with request counting
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_count: Arc<AtomicU64>,
}

impl HttpClient {
    /// Creates a new HttpClient from scan configuration
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none());

        if let Some(ref proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ZuulError::ConfigError(format!("Invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            request_count: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Returns the total number of requests made
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ZuulError::TargetUnreachable(format!("{url}: {e}"))
            } else {
                ZuulError::HttpError(e)
            }
        })?;

        let status = response.status();
        debug!("Response: {status} for {url}");
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(url, self.client.get(url)).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse> {
        self.send(url, self.client.post(url).form(form)).await
    }

    async fn post_multipart(
        &self,
        url: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<HttpResponse> {
        let part = Part::bytes(content.to_vec()).file_name(filename.to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);
        self.send(url, self.client.post(url).multipart(form)).await
    }
}
