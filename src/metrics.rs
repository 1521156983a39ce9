// src/metrics.rs
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register series descriptions.
    /// Fails if a global recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("items_classified_total", "Items that went through the acceptance stage.");
    describe_counter!("items_accepted_total", "Items accepted by the acceptance stage.");
    describe_counter!("unknown_labels_total", "Acceptance labels in neither label set.");
    describe_counter!(
        "enrichment_fallbacks_total",
        "Accepted items that received the template description."
    );
    describe_counter!("fetch_pages_total", "Review pages fetched from the source.");
    describe_counter!("fetch_items_scanned_total", "Raw reviews run through the quality filter.");
    describe_counter!("cache_hits_total", "Cache lookups answered from the store.");
    describe_counter!("cache_misses_total", "Cache lookups that computed fresh.");
    describe_counter!("cache_errors_total", "Cache store failures absorbed as misses.");
    describe_histogram!("fetch_page_ms", "Review page request time in milliseconds.");
    describe_histogram!("workflow_elapsed_ms", "Workflow wall time in milliseconds, by kind.");
}
