// src/enrich/mod.rs
//! Enricher capability: `enrich(text, category) -> description`.
//!
//! Providers may fail or be slow. `enrich_or_fallback` turns every failure into
//! the category's template, so a single item can never fail a batch.

pub mod catalog;
pub mod provider;

use crate::cache::Cache;
use crate::text::anon_id;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use provider::{ChatEnricher, ChatProvider};

/// Cache operation name for generated descriptions.
pub const OP_ENRICH: &str = "enrich";

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment disabled")]
    Disabled,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider returned an empty description")]
    Empty,
}

pub trait Enricher: Send + Sync {
    fn enrich<'a>(
        &'a self,
        text: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichError>> + Send + 'a>>;

    /// Provider name for logs and diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynEnricher = Arc<dyn Enricher>;

/// Used when no provider key is configured. Every item gets its template.
pub struct DisabledEnricher;

impl Enricher for DisabledEnricher {
    fn enrich<'a>(
        &'a self,
        _text: &'a str,
        _category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichError>> + Send + 'a>> {
        Box::pin(async { Err(EnrichError::Disabled) })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Result of one enrichment attempt, fallback made explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentOutcome {
    Generated { text: String },
    Fallback { text: String, reason: String },
}

impl EnrichmentOutcome {
    pub fn text(&self) -> &str {
        match self {
            EnrichmentOutcome::Generated { text } | EnrichmentOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            EnrichmentOutcome::Generated { text } | EnrichmentOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EnrichmentOutcome::Fallback { .. })
    }
}

#[derive(Serialize)]
struct EnrichKey<'a> {
    text: &'a str,
    category: &'a str,
}

/// Cached, time-bounded enrichment. Only generated descriptions are cached;
/// a failure yields the template for `category` and is not stored.
pub async fn enrich_or_fallback(
    enricher: &dyn Enricher,
    cache: &Cache,
    ttl: Duration,
    timeout: Duration,
    text: &str,
    category: &str,
) -> EnrichmentOutcome {
    let key = EnrichKey { text, category };
    let generated = cache
        .get_or_compute(OP_ENRICH, &key, ttl, || async move {
            match tokio::time::timeout(timeout, enricher.enrich(text, category)).await {
                Ok(Ok(desc)) if desc.trim().is_empty() => Err(EnrichError::Empty),
                Ok(res) => res,
                Err(_) => Err(EnrichError::Timeout(timeout)),
            }
        })
        .await;

    match generated {
        Ok(text) => EnrichmentOutcome::Generated { text },
        Err(e) => {
            if !matches!(e, EnrichError::Disabled) {
                warn!(
                    provider = enricher.provider_name(),
                    item = %anon_id(text),
                    category,
                    error = %e,
                    "enrichment failed; using template"
                );
            }
            EnrichmentOutcome::Fallback {
                text: catalog::template_for(category).to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    struct Fixed(&'static str);

    impl Enricher for Fixed {
        fn enrich<'a>(
            &'a self,
            _text: &'a str,
            _category: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<String, EnrichError>> + Send + 'a>> {
            let out = self.0.to_string();
            Box::pin(async move { Ok(out) })
        }
        fn provider_name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn disabled_enricher_uses_template_and_caches_nothing() {
        let store = MemoryStore::new();
        let cache = Cache::in_memory(store.clone());
        let out = enrich_or_fallback(
            &DisabledEnricher,
            &cache,
            Duration::from_secs(60),
            Duration::from_secs(1),
            "no encuentro la ayuda",
            "Asistencia al usuario",
        )
        .await;
        assert!(out.is_fallback());
        assert_eq!(out.text(), catalog::template_for("Asistencia al usuario"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn blank_output_counts_as_failure() {
        let cache = Cache::disabled();
        let out = enrich_or_fallback(
            &Fixed("   "),
            &cache,
            Duration::from_secs(60),
            Duration::from_secs(1),
            "texto",
            "Inclusividad",
        )
        .await;
        assert!(matches!(out, EnrichmentOutcome::Fallback { ref reason, .. } if reason.contains("empty")));
    }

    #[tokio::test]
    async fn generated_text_is_cached() {
        let store = MemoryStore::new();
        let cache = Cache::in_memory(store.clone());
        let out = enrich_or_fallback(
            &Fixed("El sistema debe ..."),
            &cache,
            Duration::from_secs(60),
            Duration::from_secs(1),
            "texto",
            "Inclusividad",
        )
        .await;
        assert_eq!(out, EnrichmentOutcome::Generated { text: "El sistema debe ...".into() });
        assert_eq!(store.len(), 1);
    }
}
