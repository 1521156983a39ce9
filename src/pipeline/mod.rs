// src/pipeline/mod.rs
//! Batch classification pipeline.
//!
//! 1. acceptance classifier over every item, labels mapped through `LabelPolicy`;
//! 2. partition into accepted/rejected positions, rejected results built at once;
//! 3. category classifier over the accepted subset only, then one enrichment
//!    call per accepted item, all awaited together.
//!
//! Results are restitched by position, so output order always equals input order
//! regardless of which sub-call finished first.

pub mod partition;
pub mod workers;

use crate::cache::Cache;
use crate::classify::{ClassificationOutcome, DynClassifier, LabelDecision, LabelPolicy};
use crate::enrich::{enrich_or_fallback, DynEnricher, EnrichmentOutcome};
use crate::error::{PipelineError, Stage};
use crate::text::{anon_id, preview};
use futures::future::join_all;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use partition::{Partition, Slot};
pub use workers::ClassifierPool;

/// One result per input item. Rejected items never carry category data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub source_text: String,
    pub is_accepted: bool,
    pub category: Option<String>,
    pub enrichment: Option<String>,
    pub accept_confidence: f32,
    pub category_confidence: Option<f32>,
}

impl ItemResult {
    fn rejected(source_text: String, accept_confidence: f32) -> Self {
        Self {
            source_text,
            is_accepted: false,
            category: None,
            enrichment: None,
            accept_confidence,
            category_confidence: None,
        }
    }
}

/// Non-fatal data-quality events recorded while processing a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    UnknownLabel {
        position: usize,
        label: String,
    },
    EnrichmentFallback {
        position: usize,
        category: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutput {
    pub results: Vec<ItemResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl BatchOutput {
    pub fn accepted_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_accepted).count()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Max concurrent classifier calls.
    pub classifier_workers: usize,
    pub classifier_timeout: Duration,
    /// Per enrichment call; elapsed means template fallback.
    pub enrich_timeout: Duration,
    pub enrich_ttl: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classifier_workers: 4,
            classifier_timeout: Duration::from_secs(30),
            enrich_timeout: Duration::from_secs(15),
            enrich_ttl: Duration::from_secs(7200),
        }
    }
}

pub struct BatchPipeline {
    acceptance: DynClassifier,
    category: DynClassifier,
    enricher: DynEnricher,
    cache: Arc<Cache>,
    labels: LabelPolicy,
    pool: ClassifierPool,
    settings: PipelineSettings,
}

impl BatchPipeline {
    pub fn new(
        acceptance: DynClassifier,
        category: DynClassifier,
        enricher: DynEnricher,
        cache: Arc<Cache>,
        labels: LabelPolicy,
        settings: PipelineSettings,
    ) -> Self {
        let pool = ClassifierPool::new(settings.classifier_workers, settings.classifier_timeout);
        Self {
            acceptance,
            category,
            enricher,
            cache,
            labels,
            pool,
            settings,
        }
    }

    pub fn labels(&self) -> &LabelPolicy {
        &self.labels
    }

    pub fn enricher_name(&self) -> &'static str {
        self.enricher.provider_name()
    }

    pub async fn classify_batch(
        &self,
        items: &[String],
        want_enrichment: bool,
    ) -> Result<BatchOutput, PipelineError> {
        if items.is_empty() {
            return Ok(BatchOutput::default());
        }
        let mut diagnostics = Vec::new();

        // Stage 1: accept/reject.
        let verdicts = self
            .pool
            .run(&self.acceptance, Stage::Acceptance, items.to_vec())
            .await?;
        let decisions: Vec<bool> = verdicts
            .iter()
            .enumerate()
            .map(|(pos, outcome)| self.decide(pos, outcome, &items[pos], &mut diagnostics))
            .collect();

        // Stage 2: partition. Rejected items are final from here on.
        let partition = Partition::from_decisions(decisions);
        let rejected: Vec<ItemResult> = partition
            .rejected()
            .iter()
            .map(|&pos| ItemResult::rejected(items[pos].clone(), verdicts[pos].confidence))
            .collect();
        let subset: Vec<String> = partition
            .accepted()
            .iter()
            .map(|&pos| items[pos].clone())
            .collect();

        // Stage 3: category over the accepted subset, then enrichment fan-out.
        let categories = self
            .pool
            .run(&self.category, Stage::Category, subset.clone())
            .await?;
        let enrichments: Vec<Option<EnrichmentOutcome>> = if want_enrichment {
            join_all(subset.iter().zip(&categories).map(|(text, cat)| async move {
                Some(
                    enrich_or_fallback(
                        self.enricher.as_ref(),
                        &self.cache,
                        self.settings.enrich_ttl,
                        self.settings.enrich_timeout,
                        text,
                        &cat.label,
                    )
                    .await,
                )
            }))
            .await
        } else {
            vec![None; subset.len()]
        };

        let mut accepted = Vec::with_capacity(subset.len());
        for (i, ((text, cat), enrichment)) in subset
            .into_iter()
            .zip(categories)
            .zip(enrichments)
            .enumerate()
        {
            if let Some(EnrichmentOutcome::Fallback { reason, .. }) = &enrichment {
                counter!("enrichment_fallbacks_total").increment(1);
                diagnostics.push(Diagnostic::EnrichmentFallback {
                    position: partition.accepted()[i],
                    category: cat.label.clone(),
                    reason: reason.clone(),
                });
            }
            let pos = partition.accepted()[i];
            accepted.push(ItemResult {
                source_text: text,
                is_accepted: true,
                category: Some(cat.label),
                enrichment: enrichment.map(EnrichmentOutcome::into_text),
                accept_confidence: verdicts[pos].confidence,
                category_confidence: Some(cat.confidence),
            });
        }

        let accepted_count = accepted.len();
        let results = partition
            .restitch(rejected, accepted)
            .ok_or_else(|| PipelineError::ClassificationFailure {
                stage: Stage::Category,
                reason: "result count does not match the accepted subset".into(),
            })?;

        counter!("items_classified_total").increment(results.len() as u64);
        counter!("items_accepted_total").increment(accepted_count as u64);
        info!(
            items = results.len(),
            accepted = accepted_count,
            enriched = want_enrichment,
            diagnostics = diagnostics.len(),
            "batch classified"
        );

        Ok(BatchOutput {
            results,
            diagnostics,
        })
    }

    fn decide(
        &self,
        position: usize,
        outcome: &ClassificationOutcome,
        text: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> bool {
        match self.labels.decide(&outcome.label) {
            LabelDecision::Accept => true,
            LabelDecision::Reject => {
                debug!(position, item = %anon_id(text), label = %outcome.label, "item rejected");
                false
            }
            LabelDecision::Unknown => {
                counter!("unknown_labels_total").increment(1);
                warn!(
                    position,
                    item = %anon_id(text),
                    preview = %preview(text, 40),
                    label = %outcome.label,
                    "unknown acceptance label; treating as rejected"
                );
                diagnostics.push(Diagnostic::UnknownLabel {
                    position,
                    label: outcome.label.clone(),
                });
                false
            }
        }
    }
}
