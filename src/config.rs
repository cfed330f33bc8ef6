//! Configuration management for zuulscan

use crate::error::{Result, ZuulError};
use crate::models::ScanConfig;
use serde::Deserialize;
use std::path::Path;

/// File-based configuration structure matching default.toml
#[derive(Debug, Deserialize)]
struct FileConfig {
    scan: Option<ScanSection>,
    callback: Option<CallbackSection>,
}

#[derive(Debug, Deserialize)]
struct ScanSection {
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
    concurrency: Option<usize>,
    proxy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackSection {
    host: Option<String>,
    port: Option<u16>,
}

/// Loads configuration from a TOML file and merges with defaults
pub fn load_config(path: &Path) -> Result<ScanConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses TOML configuration content over the defaults
pub fn parse_config(content: &str) -> Result<ScanConfig> {
    let file_config: FileConfig = toml::from_str(content)?;

    let mut config = ScanConfig::default();

    if let Some(scan) = file_config.scan {
        if let Some(timeout) = scan.timeout_secs {
            config.timeout_secs = timeout;
        }
        if let Some(ua) = scan.user_agent {
            config.user_agent = ua;
        }
        if let Some(concurrency) = scan.concurrency {
            config.concurrency = concurrency;
        }
        if scan.proxy.is_some() {
            config.proxy = scan.proxy;
        }
    }

    if let Some(callback) = file_config.callback {
        if callback.host.is_some() {
            config.callback_host = callback.host;
        }
        if let Some(port) = callback.port {
            config.callback_port = port;
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Merges CLI arguments into an existing ScanConfig
pub fn merge_cli_args(
    config: &mut ScanConfig,
    timeout: Option<u64>,
    concurrency: Option<usize>,
    proxy: Option<String>,
    callback_host: Option<String>,
    callback_port: Option<u16>,
) -> Result<()> {
    if let Some(t) = timeout {
        config.timeout_secs = t;
    }
    if let Some(c) = concurrency {
        config.concurrency = c;
    }
    if let Some(p) = proxy {
        config.proxy = Some(p);
    }
    if let Some(h) = callback_host {
        config.callback_host = Some(h);
    }
    if let Some(p) = callback_port {
        config.callback_port = p;
    }
    validate(config)
}

fn validate(config: &ScanConfig) -> Result<()> {
    if config.concurrency == 0 {
        return Err(ZuulError::ConfigError(
            "concurrency must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Reads a newline-delimited targets file, skipping blank lines
pub fn read_targets(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
