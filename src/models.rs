//! Core data models for zuulscan

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default ceiling of passive probes in flight at once
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Outcome facets of a passive or active scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    /// The verification filter was already enabled before the scan started
    pub prev_enabled: bool,
    /// POSTing to the filter upload endpoint is forbidden
    pub admin_disabled: bool,
    /// Remote code execution confirmed
    pub vulnerable: bool,
    /// Suspicious signature observed, but not confirmable
    pub might_vulnerable: bool,
}

impl ResultSet {
    /// Returns true when no facet is set
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prev_enabled={} admin_disabled={} vulnerable={} might_vulnerable={}",
            self.prev_enabled, self.admin_disabled, self.vulnerable, self.might_vulnerable
        )
    }
}

/// Configuration for a scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User-Agent header value
    pub user_agent: String,
    /// HTTP/HTTPS proxy URL
    pub proxy: Option<String>,
    /// Maximum passive probes running at once
    pub concurrency: usize,
    /// Host (IP or hostname reachable from the target) for OOB callbacks
    #[serde(default)]
    pub callback_host: Option<String>,
    /// Port the OOB callback listener binds
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
}

fn default_callback_port() -> u16 {
    8888
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "zuulscan/0.1.0".to_string(),
            proxy: None,
            concurrency: DEFAULT_CONCURRENCY,
            callback_host: None,
            callback_port: default_callback_port(),
        }
    }
}
