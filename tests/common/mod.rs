//! Common test utilities

use std::sync::Arc;
use zuulscan::http::HttpClient;
use zuulscan::models::ScanConfig;

/// Creates a test ScanConfig with a short timeout
pub fn test_config() -> ScanConfig {
    ScanConfig {
        timeout_secs: 10,
        user_agent: "zuulscan-test/0.1.0".to_string(),
        ..ScanConfig::default()
    }
}

/// Creates a reqwest-backed transport for wiremock targets
pub fn test_client() -> Arc<HttpClient> {
    Arc::new(HttpClient::from_config(&test_config()).expect("client"))
}

/// Renders a filterLoader.jsp page listing the verification filter up to
/// `revision`, plus an unrelated filter
pub fn registry_page(revision: u64) -> String {
    let mut page = String::from("<html><body><table>");
    for rev in 1..=revision {
        page.push_str(&format!(
            "<tr><td><a id={rev} href=scriptmanager?action=DOWNLOAD&filter_id=origin:Vulncheck:pre&revision={rev}>DOWNLOAD</a></td></tr>"
        ));
    }
    page.push_str(
        "<tr><td><a id=99 href=scriptmanager?action=DOWNLOAD&filter_id=dummy&revision=3>DOWNLOAD</a></td></tr>",
    );
    page.push_str("</table></body></html>");
    page
}
