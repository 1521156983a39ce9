// src/ingest/locator.rs
//! Source id extraction from caller-supplied locators.

use crate::error::FetchError;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_QUERY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]id=([A-Za-z0-9._]+)").expect("valid id regex"));

static RE_PACKAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)+$").expect("valid package regex")
});

/// Listing URL (`...details?id=com.example.app&hl=es`) or bare package id.
/// Fails before any network activity.
pub fn parse_locator(locator: &str) -> Result<String, FetchError> {
    let trimmed = locator.trim();
    if let Some(c) = RE_QUERY_ID.captures(trimmed) {
        return Ok(c[1].to_string());
    }
    if RE_PACKAGE.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }
    Err(FetchError::MalformedSourceLocator {
        locator: trimmed.to_string(),
    })
}
