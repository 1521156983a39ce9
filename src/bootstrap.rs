// src/bootstrap.rs
//! Wires configured components into an `Orchestrator`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{Cache, CacheSettings, MemoryStore, RedisConnector, StoreConnector};
use crate::classify::{DynClassifier, LabelPolicy, LexiconClassifier, RemoteClassifier};
use crate::config::{AppConfig, CacheConfig, ClassifierConfig, ClassifierMode, EnrichConfig};
use crate::enrich::{ChatEnricher, ChatProvider, DisabledEnricher, DynEnricher};
use crate::ingest::providers::PlayStoreSource;
use crate::ingest::types::ReviewSource;
use crate::ingest::{FetchSettings, ProgressiveFetcher};
use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::pipeline::{BatchPipeline, PipelineSettings};

pub struct TriageRuntime {
    pub cfg: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
}

impl TriageRuntime {
    /// Build with the Play Store as review source. Must run inside a tokio
    /// runtime (the remote classifier captures its handle).
    pub fn from_config(cfg: AppConfig) -> anyhow::Result<Self> {
        let source = Arc::new(PlayStoreSource::new(
            &cfg.fetch.language,
            &cfg.fetch.country,
            Duration::from_millis(cfg.fetch.page_timeout_ms),
        )?);
        Self::with_source(cfg, source)
    }

    pub fn with_source(cfg: AppConfig, source: Arc<dyn ReviewSource>) -> anyhow::Result<Self> {
        let cache = build_cache(&cfg.cache);
        let labels = cfg.labels.policy();
        let (acceptance, category) = build_classifiers(
            &cfg.classifier,
            &labels,
            Duration::from_millis(cfg.pipeline.classifier_timeout_ms),
        )?;
        let enricher = build_enricher(&cfg.enrich, Duration::from_millis(cfg.pipeline.enrich_timeout_ms));

        // Safe diagnostics only: names and flags, never keys.
        info!(
            classifier_mode = ?cfg.classifier.mode,
            acceptance = acceptance.name(),
            category = category.name(),
            enricher = enricher.provider_name(),
            cache_enabled = cfg.cache.enabled,
            label_invert = cfg.labels.invert,
            "triage runtime configured"
        );

        let pipeline = BatchPipeline::new(
            acceptance,
            category,
            enricher,
            Arc::clone(&cache),
            labels,
            PipelineSettings {
                classifier_workers: cfg.pipeline.classifier_workers,
                classifier_timeout: Duration::from_millis(cfg.pipeline.classifier_timeout_ms),
                enrich_timeout: Duration::from_millis(cfg.pipeline.enrich_timeout_ms),
                enrich_ttl: cfg.cache.enrich_ttl(),
            },
        );
        let fetcher = ProgressiveFetcher::new(
            source,
            FetchSettings {
                batch_size: cfg.fetch.batch_size,
                page_timeout: Duration::from_millis(cfg.fetch.page_timeout_ms),
            },
        );
        let orchestrator = Orchestrator::new(
            pipeline,
            fetcher,
            cache,
            OrchestratorSettings {
                filter: cfg.filter,
                default_target: cfg.fetch.target_accepted,
                default_max_scanned: cfg.fetch.max_scanned,
                fetch_ttl: cfg.cache.fetch_ttl(),
                language: cfg.fetch.language.clone(),
                country: cfg.fetch.country.clone(),
            },
        );
        Ok(Self {
            cfg,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// One-off smoke run of the single-comment workflow. Logs, never fails.
    pub async fn quick_probe(&self) {
        let sample = "La aplicación debería permitir aumentar el tamaño de la letra en los menús.";
        match self.orchestrator.process_single(sample, false).await {
            Ok(env) => info!(
                accepted = env.accepted_count,
                category = ?env.results.first().and_then(|r| r.category.as_deref()),
                elapsed_ms = env.elapsed_ms,
                "quick probe finished"
            ),
            Err(e) => warn!(error = %e, "quick probe failed"),
        }
    }
}

pub fn build_cache(cfg: &CacheConfig) -> Arc<Cache> {
    let settings = CacheSettings {
        key_prefix: cfg.key_prefix.clone(),
        op_timeout: Duration::from_millis(cfg.op_timeout_ms),
        max_connect_failures: cfg.max_connect_failures,
    };
    let connector: Option<Arc<dyn StoreConnector>> = match (cfg.enabled, cfg.url.as_deref()) {
        (false, _) => None,
        (true, Some(url)) => Some(Arc::new(RedisConnector::new(url)) as Arc<dyn StoreConnector>),
        (true, None) => Some(Arc::new(MemoryStore::new()) as Arc<dyn StoreConnector>),
    };
    Arc::new(Cache::new(connector, settings))
}

pub fn build_classifiers(
    cfg: &ClassifierConfig,
    labels: &LabelPolicy,
    timeout: Duration,
) -> anyhow::Result<(DynClassifier, DynClassifier)> {
    match cfg.mode {
        ClassifierMode::Remote => {
            if cfg.api_token.is_none() {
                warn!("remote classifier without HF_API_TOKEN; requests may be rate limited");
            }
            let acceptance =
                RemoteClassifier::new(&cfg.binary_model, cfg.api_token.clone(), timeout, "hf-binary")?;
            let category = RemoteClassifier::new(
                &cfg.multiclass_model,
                cfg.api_token.clone(),
                timeout,
                "hf-multiclass",
            )?;
            Ok((Arc::new(acceptance), Arc::new(category)))
        }
        ClassifierMode::Lexicon => {
            let accept = pick_label(labels.accept_labels(), "aplica")
                .ok_or_else(|| anyhow::anyhow!("label policy has no accept labels"))?;
            let reject = pick_label(labels.reject_labels(), "no-aplica").unwrap_or_default();
            Ok((
                Arc::new(LexiconClassifier::acceptance(accept, reject)),
                Arc::new(LexiconClassifier::categories()),
            ))
        }
    }
}

/// `preferred` if the set contains it, else the set's first label.
fn pick_label<'a>(labels: impl Iterator<Item = &'a str>, preferred: &str) -> Option<String> {
    let all: Vec<&str> = labels.collect();
    all.iter()
        .find(|l| **l == preferred)
        .or_else(|| all.first())
        .map(|l| l.to_string())
}

pub fn build_enricher(cfg: &EnrichConfig, timeout: Duration) -> DynEnricher {
    if !cfg.is_enabled() {
        warn!(provider = %cfg.provider, "enrichment provider not configured; using templates");
        return Arc::new(DisabledEnricher);
    }
    let Some(provider) = ChatProvider::parse(&cfg.provider) else {
        warn!(provider = %cfg.provider, "unsupported enrichment provider; using templates");
        return Arc::new(DisabledEnricher);
    };
    match ChatEnricher::new(provider, cfg.api_key.clone(), cfg.model.as_deref(), timeout) {
        Ok(e) => {
            info!(provider = provider.name(), model = e.model(), "enrichment provider ready");
            Arc::new(e)
        }
        Err(e) => {
            warn!(error = %e, "enrichment provider init failed; using templates");
            Arc::new(DisabledEnricher)
        }
    }
}
