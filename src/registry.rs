//! Filter registry extraction from the Zuul filterLoader admin page
//!
//! The page lists every uploaded filter revision as a download link of the
//! form `scriptmanager?action=DOWNLOAD&filter_id=<id>&revision=<n>`.

use crate::error::{Result, ZuulError};
use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

/// Base used to resolve the relative hrefs the registry page emits
const RESOLVE_BASE: &str = "http://registry.invalid/admin/";

/// Highest known revision per filter identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRegistry {
    revisions: HashMap<String, u64>,
}

impl FilterRegistry {
    /// Returns the highest revision for `filter_id`, or 0 if never seen
    pub fn revision(&self, filter_id: &str) -> u64 {
        self.revisions.get(filter_id).copied().unwrap_or(0)
    }

    /// Records a revision, keeping the maximum per identifier
    pub fn record(&mut self, filter_id: &str, revision: u64) {
        let entry = self.revisions.entry(filter_id.to_string()).or_insert(0);
        if revision > *entry {
            *entry = revision;
        }
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn contains(&self, filter_id: &str) -> bool {
        self.revisions.contains_key(filter_id)
    }
}

/// Parses the registry page into a [`FilterRegistry`].
///
/// Anchors without `filter_id` or `revision` are skipped. A malformed href or a
/// revision that is not a non-negative integer is an error.
pub fn parse_registry(html: &str) -> Result<FilterRegistry> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]")
        .map_err(|e| ZuulError::ParseError(format!("invalid selector: {e:?}")))?;

    let base = Url::parse(RESOLVE_BASE)?;
    let mut registry = FilterRegistry::default();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let url = resolve_href(&base, href)?;

        let mut filter_id = None;
        let mut revision = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "filter_id" if filter_id.is_none() => filter_id = Some(value.into_owned()),
                "revision" if revision.is_none() => revision = Some(value.into_owned()),
                _ => {}
            }
        }

        let (Some(filter_id), Some(revision)) = (filter_id, revision) else {
            continue;
        };

        let revision: u64 = revision.trim().parse().map_err(|_| {
            ZuulError::ParseError(format!(
                "invalid revision '{revision}' for filter '{filter_id}'"
            ))
        })?;

        registry.record(&filter_id, revision);
    }

    Ok(registry)
}

/// Resolves an href, rejecting ones that are not well-formed URL references
fn resolve_href(base: &Url, href: &str) -> Result<Url> {
    let trimmed = href.trim();

    // A colon before any path, query or fragment delimiter introduces a scheme.
    let head_end = trimmed.find(['/', '?', '#']).unwrap_or(trimmed.len());
    if let Some(colon) = trimmed[..head_end].find(':') {
        let scheme = &trimmed[..colon];
        let valid = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid {
            return Err(ZuulError::ParseError(format!("malformed href '{href}'")));
        }
    }

    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(ZuulError::ParseError(format!(
            "malformed href '{}': control character",
            href.escape_debug()
        )));
    }
    if has_bad_escape(trimmed) {
        return Err(ZuulError::ParseError(format!(
            "malformed href '{href}': invalid percent escape"
        )));
    }

    base.join(trimmed)
        .map_err(|e| ZuulError::ParseError(format!("malformed href '{href}': {e}")))
}

/// True if some `%` is not followed by two hex digits
fn has_bad_escape(href: &str) -> bool {
    let bytes = href.as_bytes();
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !(bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    })
}
