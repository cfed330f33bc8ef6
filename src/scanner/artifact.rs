//! Filter files uploaded to the Zuul script manager

/// Groovy verification filter, with the callback URL still templated
const VULNCHECK_TEMPLATE: &str = include_str!("../../resources/Vulncheck.groovy");

/// URL in the template replaced by the scanner's callback URL
pub const CALLBACK_PLACEHOLDER: &str =
    "http://__HOSTPORT_PLACEHOLDER__/callback/__SCAN_PLACEHOLDER__";

pub const VULNCHECK_FILENAME: &str = "Vulncheck.groovy";
pub const EMPTY_FILENAME: &str = "Emptyfile.groovy";

/// An in-memory named file ready for a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeArtifact {
    filename: String,
    content: Vec<u8>,
}

impl ProbeArtifact {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Zero-length upload used by the passive check
    pub fn empty() -> Self {
        Self::new(EMPTY_FILENAME, Vec::new())
    }

    /// Verification filter calling back to `callback_url` once it runs
    pub fn vulncheck(callback_url: &str) -> Self {
        Self::new(
            VULNCHECK_FILENAME,
            VULNCHECK_TEMPLATE.replace(CALLBACK_PLACEHOLDER, callback_url),
        )
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}
