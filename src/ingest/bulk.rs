// src/ingest/bulk.rs
//! Decoding of uploaded bulk files into a list of comments.

use crate::error::TriageError;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

const HEADER_HINTS: &[&str] = &["comment", "text", "review", "comentario"];

/// Bytes to text: BOM-sniffed encoding first, then strict UTF-8, then
/// Windows-1252 (a superset of Latin-1 for printable text).
pub fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, &'static Encoding) {
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
        return (text, enc);
    }
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return (text, UTF_8);
    }
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (text, WINDOWS_1252)
}

/// First column of every CSV row, trimmed. A first row that names the column
/// (comment/text/review/comentario) is skipped, as are blank cells.
pub fn parse_comments(text: &str) -> Result<Vec<String>, TriageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut out = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| TriageError::InvalidInput(format!("malformed CSV at row {}: {e}", row + 1)))?;
        let Some(cell) = record.get(0).map(str::trim) else {
            continue;
        };
        if row == 0 && is_header(cell) {
            continue;
        }
        if !cell.is_empty() {
            out.push(cell.to_string());
        }
    }
    Ok(out)
}

fn is_header(cell: &str) -> bool {
    let lower = cell.to_lowercase();
    HEADER_HINTS.iter().any(|h| lower.contains(h))
}

/// Decode and parse an uploaded file. An empty result is invalid input.
pub fn decode_bulk(bytes: &[u8]) -> Result<Vec<String>, TriageError> {
    let (text, encoding) = decode_text(bytes);
    let comments = parse_comments(&text)?;
    if comments.is_empty() {
        return Err(TriageError::InvalidInput(
            "file contains no comments".to_string(),
        ));
    }
    tracing::debug!(encoding = encoding.name(), comments = comments.len(), "bulk file decoded");
    Ok(comments)
}
