//! Feedback triage service, binary entrypoint.
//! Loads configuration, wires the orchestrator and serves the Axum router.

use feedback_triage::api::{self, AppState};
use feedback_triage::bootstrap::TriageRuntime;
use feedback_triage::config::AppConfig;
use feedback_triage::metrics::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with `LOG_FORMAT=json`.
/// A no-op if the runtime already installed a subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feedback_triage=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let runtime = TriageRuntime::from_config(cfg)?;
    if std::env::var("TRIAGE_QUICK_PROBE").is_ok_and(|v| v == "1") {
        runtime.quick_probe().await;
    }

    let state = AppState {
        orchestrator: runtime.orchestrator.clone(),
    };
    let mut router = api::router(state);
    match Metrics::init() {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %e, "metrics recorder not installed"),
    }

    Ok(router.into())
}
