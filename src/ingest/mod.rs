// src/ingest/mod.rs
//! Review ingestion: quality filter, progressive fetcher, bulk-file decoding.

pub mod bulk;
pub mod filter;
pub mod locator;
pub mod providers;
pub mod types;

use crate::error::FetchError;
use crate::ingest::filter::{evaluate, FilterConfig};
use crate::ingest::types::{FetchOutcome, FetchStats, FetchedItem, ReviewSource};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use locator::parse_locator;

#[derive(Debug, Clone, Copy)]
pub struct FetchSettings {
    /// Reviews requested per page.
    pub batch_size: usize,
    /// Bound on one page request; elapsed = source unavailable.
    pub page_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            page_timeout: Duration::from_secs(30),
        }
    }
}

/// Pages a review source until enough items pass the filter, the scan
/// ceiling is hit, or the source runs dry. All or nothing: any source failure
/// discards the partial result.
pub struct ProgressiveFetcher {
    source: Arc<dyn ReviewSource>,
    settings: FetchSettings,
}

impl ProgressiveFetcher {
    pub fn new(source: Arc<dyn ReviewSource>, settings: FetchSettings) -> Self {
        Self { source, settings }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Parse `locator` first (no network on failure), then fetch.
    pub async fn fetch_locator(
        &self,
        locator: &str,
        target_accepted: usize,
        max_scanned: usize,
        filter: &FilterConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let source_id = parse_locator(locator)?;
        self.fetch(&source_id, target_accepted, max_scanned, filter, cancel)
            .await
    }

    pub async fn fetch(
        &self,
        source_id: &str,
        target_accepted: usize,
        max_scanned: usize,
        filter: &FilterConfig,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let batch_size = self.settings.batch_size.max(1);
        let mut stats = FetchStats::default();
        let mut items: Vec<FetchedItem> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        while items.len() < target_accepted && stats.total_scanned < max_scanned {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled {
                    scanned: stats.total_scanned,
                });
            }

            let request = batch_size.min(max_scanned - stats.total_scanned);
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(FetchError::Cancelled { scanned: stats.total_scanned });
                }
                res = tokio::time::timeout(
                    self.settings.page_timeout,
                    self.source.page(source_id, cursor.as_deref(), request),
                ) => res,
            };
            let page = match page {
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    warn!(source = self.source.name(), source_id, error = ?e, "review page failed");
                    return Err(FetchError::SourceUnavailable {
                        reason: format!("{e:#}"),
                    });
                }
                Err(_) => {
                    warn!(source = self.source.name(), source_id, "review page timed out");
                    return Err(FetchError::SourceUnavailable {
                        reason: format!("page request timed out after {:?}", self.settings.page_timeout),
                    });
                }
            };
            pages += 1;
            counter!("fetch_pages_total").increment(1);

            if page.items.is_empty() {
                debug!(source_id, pages, "source returned an empty page");
                break;
            }

            let scanned_before = stats.total_scanned;
            for raw in page.items.into_iter().take(request) {
                stats.total_scanned += 1;
                let item = FetchedItem::from_raw(raw);
                let verdict = evaluate(&item, filter);
                verdict.record(&mut stats);
                if verdict.is_accepted() {
                    items.push(item);
                    if items.len() == target_accepted {
                        break;
                    }
                }
            }
            counter!("fetch_items_scanned_total")
                .increment((stats.total_scanned - scanned_before) as u64);
            debug!(
                source_id,
                pages,
                scanned = stats.total_scanned,
                accepted = items.len(),
                "review batch processed"
            );

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        stats.target_reached = items.len() >= target_accepted;
        stats.ceiling_reached = stats.total_scanned >= max_scanned;
        info!(
            source = self.source.name(),
            source_id,
            pages,
            scanned = stats.total_scanned,
            accepted = stats.accepted,
            target_reached = stats.target_reached,
            ceiling_reached = stats.ceiling_reached,
            "fetch finished"
        );
        Ok(FetchOutcome { items, stats })
    }
}
