// src/text.rs
//! Small text helpers shared by logging and filtering.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Whitespace-delimited token count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Char-safe preview for logs: at most `max` chars, `...` appended when cut.
pub fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Short anonymised id (first 6 bytes of SHA-256) so logs can correlate items
/// without carrying raw feedback text.
pub fn anon_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
