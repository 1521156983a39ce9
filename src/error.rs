// src/error.rs
//! Error taxonomy shared by the fetcher, the batch pipeline and the orchestrator.
//!
//! Enrichment and cache failures have their own types (`EnrichError`, `StoreError`)
//! but never leave their modules: they are absorbed into fallbacks or misses.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which classifier stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Binary accept/reject classifier.
    Acceptance,
    /// Multiclass category classifier (accepted subset only).
    Category,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Acceptance => f.write_str("acceptance"),
            Stage::Category => f.write_str("category"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The caller-supplied locator does not contain a usable source id.
    #[error("cannot derive a source id from locator `{locator}`")]
    MalformedSourceLocator { locator: String },

    /// Transport or protocol failure while paging the review source.
    #[error("review source unavailable: {reason}")]
    SourceUnavailable { reason: String },

    /// The request was cancelled between two pages.
    #[error("fetch cancelled after scanning {scanned} items")]
    Cancelled { scanned: usize },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage 1 or stage 2 classifier call failed; the whole batch fails with it.
    #[error("{stage} classification failed: {reason}")]
    ClassificationFailure { stage: Stage, reason: String },
}

/// Orchestrator-level failure. An envelope is either complete or replaced by one of these.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl TriageError {
    /// Upstream source failures may succeed on a later attempt; nothing else should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TriageError::Fetch(FetchError::SourceUnavailable { .. }))
    }

    /// Stable machine-readable kind for API bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TriageError::InvalidInput(_) => "invalid_input",
            TriageError::Fetch(FetchError::MalformedSourceLocator { .. }) => {
                "malformed_source_locator"
            }
            TriageError::Fetch(FetchError::SourceUnavailable { .. }) => "source_unavailable",
            TriageError::Fetch(FetchError::Cancelled { .. }) => "cancelled",
            TriageError::Pipeline(PipelineError::ClassificationFailure { .. }) => {
                "classification_failure"
            }
        }
    }
}
