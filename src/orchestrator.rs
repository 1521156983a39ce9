// src/orchestrator.rs
//! The three public workflows (single comment, bulk list, progressive source),
//! each producing a timed `ResultEnvelope` or an explicit `TriageError`.

use crate::cache::Cache;
use crate::error::TriageError;
use crate::ingest::bulk::decode_bulk;
use crate::ingest::filter::FilterConfig;
use crate::ingest::types::{FetchOutcome, FetchStats};
use crate::ingest::{parse_locator, ProgressiveFetcher};
use crate::pipeline::{BatchOutput, BatchPipeline, Diagnostic, ItemResult};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cache operation name for fetch sessions.
pub const OP_FETCH: &str = "fetch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Single,
    Bulk,
    Source,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Single => "single",
            SourceKind::Bulk => "bulk",
            SourceKind::Source => "source",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub total_items: usize,
    pub accepted_count: usize,
    pub results: Vec<ItemResult>,
    pub elapsed_ms: u64,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_stats: Option<FetchStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRequest {
    /// Listing URL or bare source id.
    pub locator: String,
    pub target_accepted: Option<usize>,
    pub max_scanned: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub filter: FilterConfig,
    pub default_target: usize,
    pub default_max_scanned: usize,
    pub fetch_ttl: Duration,
    /// Part of the fetch cache key; must match what the source is configured with.
    pub language: String,
    pub country: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            default_target: 30,
            default_max_scanned: 500,
            fetch_ttl: Duration::from_secs(1800),
            language: "es".to_string(),
            country: "us".to_string(),
        }
    }
}

#[derive(Serialize)]
struct FetchKey<'a> {
    source_id: &'a str,
    target: usize,
    max_scanned: usize,
    language: &'a str,
    country: &'a str,
    filter: &'a FilterConfig,
}

pub struct Orchestrator {
    pipeline: BatchPipeline,
    fetcher: ProgressiveFetcher,
    cache: Arc<Cache>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        pipeline: BatchPipeline,
        fetcher: ProgressiveFetcher,
        cache: Arc<Cache>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            pipeline,
            fetcher,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn pipeline(&self) -> &BatchPipeline {
        &self.pipeline
    }

    pub async fn process_single(
        &self,
        text: &str,
        want_enrichment: bool,
    ) -> Result<ResultEnvelope, TriageError> {
        let started = Instant::now();
        let text = text.trim();
        if text.is_empty() {
            return Err(TriageError::InvalidInput("comment is empty".to_string()));
        }
        let out = self
            .pipeline
            .classify_batch(&[text.to_string()], want_enrichment)
            .await?;
        Ok(self.envelope(SourceKind::Single, 1, out, None, started))
    }

    pub async fn process_bulk(
        &self,
        items: Vec<String>,
        want_enrichment: bool,
    ) -> Result<ResultEnvelope, TriageError> {
        let started = Instant::now();
        if items.is_empty() {
            return Err(TriageError::InvalidInput("no comments to process".to_string()));
        }
        let out = self.pipeline.classify_batch(&items, want_enrichment).await?;
        Ok(self.envelope(SourceKind::Bulk, items.len(), out, None, started))
    }

    /// Decode an uploaded file, then run it as a bulk list.
    pub async fn process_bulk_file(
        &self,
        bytes: &[u8],
        want_enrichment: bool,
    ) -> Result<ResultEnvelope, TriageError> {
        let items = decode_bulk(bytes)?;
        self.process_bulk(items, want_enrichment).await
    }

    /// Fetch (cached) then classify the accepted items. `total_items` reports
    /// everything scanned, not only what passed the filter.
    pub async fn process_source(
        &self,
        req: &SourceRequest,
        want_enrichment: bool,
        cancel: &CancellationToken,
    ) -> Result<ResultEnvelope, TriageError> {
        let started = Instant::now();
        let source_id = parse_locator(&req.locator)?;
        let target = req.target_accepted.unwrap_or(self.settings.default_target);
        let max_scanned = req.max_scanned.unwrap_or(self.settings.default_max_scanned);

        let key = FetchKey {
            source_id: &source_id,
            target,
            max_scanned,
            language: &self.settings.language,
            country: &self.settings.country,
            filter: &self.settings.filter,
        };
        let fetched: FetchOutcome = self
            .cache
            .get_or_compute(OP_FETCH, &key, self.settings.fetch_ttl, || {
                self.fetcher
                    .fetch(&source_id, target, max_scanned, &self.settings.filter, cancel)
            })
            .await?;

        let texts: Vec<String> = fetched.items.into_iter().map(|i| i.text).collect();
        let out = self.pipeline.classify_batch(&texts, want_enrichment).await?;
        Ok(self.envelope(
            SourceKind::Source,
            fetched.stats.total_scanned,
            out,
            Some(fetched.stats),
            started,
        ))
    }

    fn envelope(
        &self,
        kind: SourceKind,
        total_items: usize,
        out: BatchOutput,
        fetch_stats: Option<FetchStats>,
        started: Instant,
    ) -> ResultEnvelope {
        let elapsed = started.elapsed();
        let accepted_count = out.accepted_count();
        histogram!("workflow_elapsed_ms", "kind" => kind.as_str())
            .record(elapsed.as_secs_f64() * 1_000.0);
        info!(
            kind = kind.as_str(),
            total_items,
            accepted = accepted_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "workflow finished"
        );
        ResultEnvelope {
            total_items,
            accepted_count,
            results: out.results,
            elapsed_ms: elapsed.as_millis() as u64,
            source_kind: kind,
            fetch_stats,
            diagnostics: out.diagnostics,
        }
    }
}
