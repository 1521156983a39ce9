// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod cache;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{FetchError, PipelineError, Stage, TriageError};
pub use crate::orchestrator::{Orchestrator, ResultEnvelope, SourceKind, SourceRequest};
pub use crate::pipeline::{BatchOutput, BatchPipeline, Diagnostic, ItemResult};
