// src/ingest/providers/playstore.rs
//! Google Play review pages through the public `batchexecute` RPC.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use serde_json::{json, Value};
use std::time::Duration;

use crate::ingest::types::{RawReview, ReviewPage, ReviewSource};

pub const PLAY_BATCHEXECUTE_URL: &str =
    "https://play.google.com/_/PlayStoreUi/data/batchexecute";

const RPC_ID: &str = "UsvDTd";
/// Play's "most relevant" ordering.
const SORT_MOST_RELEVANT: u8 = 1;
/// Anti-JSON-hijacking prefix on every batchexecute response.
const XSSI_PREFIX: &str = ")]}'";

pub struct PlayStoreSource {
    http: reqwest::Client,
    base_url: String,
    language: String,
    country: String,
}

impl PlayStoreSource {
    pub fn new(language: &str, country: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(PLAY_BATCHEXECUTE_URL, language, country, timeout)
    }

    pub fn with_base_url(base_url: &str, language: &str, country: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; feedback-triage/0.1)")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()
            .context("building play store http client")?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
            language: language.to_string(),
            country: country.to_string(),
        })
    }
}

/// `f.req` form value for one review page.
pub fn build_request_payload(app_id: &str, count: usize, cursor: Option<&str>) -> String {
    let inner = json!([
        null,
        null,
        [2, SORT_MOST_RELEVANT, [count, null, cursor], null, []],
        [app_id, 7]
    ]);
    json!([[[RPC_ID, inner.to_string(), null, "generic"]]]).to_string()
}

/// Parse a batchexecute body into a page. Reviews with missing fields keep
/// whatever is present; a response without review data is an empty, final page.
pub fn parse_page(body: &str) -> Result<ReviewPage> {
    let json_part = body
        .trim_start()
        .strip_prefix(XSSI_PREFIX)
        .unwrap_or(body)
        .trim_start();
    let outer: Value = serde_json::from_str(json_part).context("parsing batchexecute envelope")?;
    let payload = outer
        .pointer("/0/2")
        .ok_or_else(|| anyhow!("batchexecute envelope has no payload"))?;
    let Some(payload) = payload.as_str() else {
        // `null` payload: the app exists but there is nothing (more) to return.
        return Ok(ReviewPage::default());
    };
    let data: Value = serde_json::from_str(payload).context("parsing review payload")?;

    let items = data
        .get(0)
        .and_then(Value::as_array)
        .map(|rows| rows.iter().map(parse_review).collect())
        .unwrap_or_default();

    let next_cursor = data
        .as_array()
        .filter(|a| a.len() >= 2)
        .and_then(|a| a.get(a.len() - 2))
        .and_then(Value::as_array)
        .and_then(|a| a.last())
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ReviewPage { items, next_cursor })
}

fn parse_review(row: &Value) -> RawReview {
    let at = row
        .pointer("/5/0")
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339());
    RawReview {
        content: row.get(4).and_then(Value::as_str).unwrap_or_default().to_string(),
        user_name: row.pointer("/1/0").and_then(Value::as_str).map(str::to_string),
        score: row.get(2).and_then(Value::as_i64),
        at,
    }
}

#[async_trait]
impl ReviewSource for PlayStoreSource {
    async fn page(&self, app_id: &str, cursor: Option<&str>, batch_size: usize) -> Result<ReviewPage> {
        let t0 = std::time::Instant::now();
        let payload = build_request_payload(app_id, batch_size, cursor);
        let resp = self
            .http
            .post(&self.base_url)
            .query(&[("hl", self.language.as_str()), ("gl", self.country.as_str())])
            .form(&[("f.req", payload.as_str())])
            .send()
            .await
            .context("play store request")?
            .error_for_status()
            .context("play store status")?;
        let body = resp.text().await.context("play store body")?;
        let page = parse_page(&body)?;

        histogram!("fetch_page_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(
            app_id,
            items = page.items.len(),
            has_next = page.next_cursor.is_some(),
            "play store page"
        );
        Ok(page)
    }

    fn name(&self) -> &'static str {
        "play_store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with(data: Value) -> String {
        let outer = json!([["wrb.fr", RPC_ID, data.to_string(), null, null, null, "generic"]]);
        format!(")]}}'\n\n{}", outer)
    }

    #[test]
    fn payload_embeds_app_count_and_cursor() {
        let p = build_request_payload("com.example", 100, Some("tok"));
        let outer: Value = serde_json::from_str(&p).unwrap();
        assert_eq!(outer[0][0][0], RPC_ID);
        let inner: Value = serde_json::from_str(outer[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(inner[2][2], json!([100, null, "tok"]));
        assert_eq!(inner[3][0], "com.example");

        let first = build_request_payload("com.example", 5, None);
        let outer: Value = serde_json::from_str(&first).unwrap();
        let inner: Value = serde_json::from_str(outer[0][0][1].as_str().unwrap()).unwrap();
        assert_eq!(inner[2][2], json!([5, null, null]));
    }

    #[test]
    fn parses_reviews_and_cursor() {
        let data = json!([
            [
                ["id1", ["Ana", null], 3, null, "No encuentro la opción de exportar", [1700000000, 0]],
                ["id2", null, null, null, null, null]
            ],
            null,
            [null, "next-token"],
            null
        ]);
        let page = parse_page(&body_with(data)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].user_name.as_deref(), Some("Ana"));
        assert_eq!(page.items[0].score, Some(3));
        assert!(page.items[0].at.as_deref().unwrap().starts_with("2023-11-14"));
        assert_eq!(page.items[1].content, "");
        assert_eq!(page.items[1].score, None);
        assert_eq!(page.next_cursor.as_deref(), Some("next-token"));
    }

    #[test]
    fn null_payload_is_an_empty_final_page() {
        let outer = json!([["wrb.fr", RPC_ID, null, null, null, null, "generic"]]);
        let page = parse_page(&format!(")]}}'\n{outer}")).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_page("<html>rate limited</html>").is_err());
    }
}
