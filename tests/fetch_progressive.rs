// tests/fetch_progressive.rs
//
// Progressive fetcher against in-memory and scripted review sources.
//
// Covered:
// - stops mid-page once the target is reached
// - scan ceiling, source exhaustion
// - source errors and page timeouts -> SourceUnavailable (no partial result)
// - malformed locator fails before any page request
// - cancellation before and during a page request
// - rejection attribution order (empty, rating, length)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use feedback_triage::ingest::filter::FilterConfig;
use feedback_triage::ingest::providers::MemorySource;
use feedback_triage::ingest::types::{RawReview, ReviewPage, ReviewSource};
use feedback_triage::ingest::{FetchSettings, ProgressiveFetcher};
use feedback_triage::FetchError;

const APP: &str = "com.example.notes";

fn long_text(tag: usize) -> String {
    format!(
        "La aplicación {tag} debería permitir exportar las notas a PDF porque ahora solo se pueden copiar a mano"
    )
}

fn review(content: String, score: i64) -> RawReview {
    RawReview {
        content,
        user_name: Some("usuario".into()),
        score: Some(score),
        at: None,
    }
}

/// `pages` pages of 100 reviews; every tenth review passes the default filter.
fn paged_reviews(pages: usize) -> Vec<RawReview> {
    (0..pages * 100)
        .map(|i| {
            if i % 10 == 0 {
                review(long_text(i), 3)
            } else {
                review(long_text(i), 5)
            }
        })
        .collect()
}

fn fetcher(src: Arc<dyn ReviewSource>) -> ProgressiveFetcher {
    ProgressiveFetcher::new(src, FetchSettings::default())
}

#[tokio::test]
async fn stops_mid_third_page_when_target_reached() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(3)));
    let out = fetcher(src.clone())
        .fetch(APP, 25, 500, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect("fetch ok");

    assert_eq!(out.items.len(), 25);
    assert_eq!(out.stats.accepted, 25);
    // 25th match is review #240 (offset 40 of the third page).
    assert_eq!(out.stats.total_scanned, 241);
    assert_eq!(out.stats.rejected_by_rating, 216);
    assert!(out.stats.target_reached);
    assert!(!out.stats.ceiling_reached);
    assert_eq!(src.pages_served(), 3);
    assert_eq!(out.items[24].text, long_text(240));
}

#[tokio::test]
async fn ceiling_bounds_the_scan() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(10)));
    let out = fetcher(src)
        .fetch(APP, 100, 250, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect("fetch ok");

    assert_eq!(out.stats.total_scanned, 250);
    assert_eq!(out.items.len(), 25);
    assert!(out.stats.ceiling_reached);
    assert!(!out.stats.target_reached);
}

#[tokio::test]
async fn exhausted_source_returns_what_it_has() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(1)));
    let out = fetcher(src.clone())
        .fetch(APP, 50, 500, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect("fetch ok");

    assert_eq!(out.stats.total_scanned, 100);
    assert_eq!(out.items.len(), 10);
    assert!(!out.stats.target_reached);
    assert!(!out.stats.ceiling_reached);
    assert_eq!(src.pages_served(), 1);
}

#[tokio::test]
async fn stats_are_consistent_with_items() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(2)));
    let out = fetcher(src)
        .fetch(APP, 15, 500, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect("fetch ok");

    assert_eq!(out.items.len(), out.stats.accepted);
    assert_eq!(out.stats.total_scanned, out.stats.accepted + out.stats.rejected());
}

#[tokio::test]
async fn rejection_is_attributed_to_first_failing_check() {
    let reviews = vec![
        // empty and bad rating -> empty
        review("   ".into(), 5),
        // bad rating and too short -> rating
        review("corto".into(), 1),
        // good rating, too short -> length
        review("muy corto".into(), 2),
        review(long_text(1), 2),
        // missing rating -> rating
        RawReview {
            content: long_text(2),
            user_name: None,
            score: None,
            at: None,
        },
    ];
    let src = Arc::new(MemorySource::new().with_app(APP, reviews));
    let out = fetcher(src)
        .fetch(APP, 10, 500, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect("fetch ok");

    assert_eq!(out.stats.rejected_empty, 1);
    assert_eq!(out.stats.rejected_by_rating, 2);
    assert_eq!(out.stats.rejected_by_length, 1);
    assert_eq!(out.stats.accepted, 1);
    assert_eq!(out.stats.total_scanned, 5);
}

/// Serves one good page, then fails.
struct FlakySource;

#[async_trait]
impl ReviewSource for FlakySource {
    async fn page(&self, _id: &str, cursor: Option<&str>, _n: usize) -> Result<ReviewPage> {
        match cursor {
            None => Ok(ReviewPage {
                items: vec![review(long_text(0), 3)],
                next_cursor: Some("page-2".into()),
            }),
            Some(_) => bail!("HTTP 502 from upstream"),
        }
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Never answers.
struct HangingSource;

#[async_trait]
impl ReviewSource for HangingSource {
    async fn page(&self, _id: &str, _cursor: Option<&str>, _n: usize) -> Result<ReviewPage> {
        std::future::pending::<()>().await;
        Ok(ReviewPage::default())
    }

    fn name(&self) -> &'static str {
        "hanging"
    }
}

#[tokio::test]
async fn source_failure_discards_partial_result() {
    let err = fetcher(Arc::new(FlakySource))
        .fetch(APP, 10, 500, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect_err("second page fails");

    match err {
        FetchError::SourceUnavailable { reason } => assert!(reason.contains("502"), "{reason}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn page_timeout_is_source_unavailable() {
    let f = ProgressiveFetcher::new(
        Arc::new(HangingSource),
        FetchSettings {
            batch_size: 100,
            page_timeout: Duration::from_millis(50),
        },
    );
    let err = f
        .fetch(APP, 10, 500, &FilterConfig::default(), &CancellationToken::new())
        .await
        .expect_err("times out");
    assert!(matches!(err, FetchError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn malformed_locator_fails_before_any_request() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(1)));
    let err = fetcher(src.clone())
        .fetch_locator(
            "https://example.com/no-id-here",
            10,
            500,
            &FilterConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .expect_err("malformed");

    assert!(matches!(err, FetchError::MalformedSourceLocator { .. }));
    assert_eq!(src.pages_served(), 0);
}

#[tokio::test]
async fn listing_url_locator_is_fetched() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(1)));
    let out = fetcher(src)
        .fetch_locator(
            "https://play.google.com/store/apps/details?id=com.example.notes&hl=es",
            5,
            500,
            &FilterConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .expect("fetch ok");
    assert_eq!(out.items.len(), 5);
}

#[tokio::test]
async fn cancelled_token_stops_before_first_page() {
    let src = Arc::new(MemorySource::new().with_app(APP, paged_reviews(1)));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fetcher(src.clone())
        .fetch(APP, 10, 500, &FilterConfig::default(), &cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, FetchError::Cancelled { scanned: 0 }));
    assert_eq!(src.pages_served(), 0);
}

#[tokio::test]
async fn cancellation_interrupts_pending_page() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = fetcher(Arc::new(HangingSource))
        .fetch(APP, 10, 500, &FilterConfig::default(), &cancel)
        .await
        .expect_err("cancelled");

    assert!(matches!(err, FetchError::Cancelled { .. }));
}
