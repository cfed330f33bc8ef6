//! Error types for zuulscan

use crate::models::ResultSet;
use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for zuulscan operations
#[derive(Debug, Error)]
pub enum ZuulError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Filter registry parse error: {0}")]
    ParseError(String),

    #[error("Filter registry unavailable at {url}: status {status}")]
    RegistryUnavailable { url: String, status: StatusCode },

    #[error("Revision didn't increase after filter upload (prev: {previous}, curr: {current})")]
    StateInconsistency { previous: u64, current: u64 },

    #[error("Unexpected response when activating filter: {0}")]
    ActivationError(StatusCode),

    #[error("Filter seems to have been uploaded but never became active after {0} checks")]
    ActivationTimeout(u32),

    #[error("Failed to deactivate filter: {0}")]
    DeactivationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("OOB error: {0}")]
    OobError(String),
}

/// Result type alias for zuulscan operations
pub type Result<T> = std::result::Result<T, ZuulError>;

/// Failure of an active scan, carrying the facets determined before the error.
///
/// A deactivation failure leaves `result.vulnerable` set, so callers should
/// inspect `result` instead of discarding it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProbeFailure {
    pub result: ResultSet,
    #[source]
    pub error: ZuulError,
}
