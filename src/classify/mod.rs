// src/classify/mod.rs
//! Classifier capability: `classify(text) -> {label, confidence}`.
//!
//! Implementations are synchronous and may block (local inference, blocking
//! HTTP). The pipeline runs them on the blocking pool behind a semaphore, so the
//! coordinating task never blocks on them.

pub mod labels;
pub mod lexicon;
pub mod remote;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use labels::{LabelDecision, LabelPolicy};
pub use lexicon::LexiconClassifier;
pub use remote::RemoteClassifier;

/// One classifier answer. Produced fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub label: String,
    /// In `[0, 1]`.
    pub confidence: f32,
}

impl ClassificationOutcome {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier transport error: {0}")]
    Transport(String),
    #[error("classifier returned malformed output: {0}")]
    Malformed(String),
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

pub trait Classifier: Send + Sync + 'static {
    fn classify(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError>;

    /// Batched form. Must equal per-item `classify` calls in the same order.
    fn classify_many(
        &self,
        texts: &[String],
    ) -> Result<Vec<ClassificationOutcome>, ClassifierError> {
        texts.iter().map(|t| self.classify(t)).collect()
    }

    /// Whether `classify_many` is cheaper than one call per item.
    fn supports_batch(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

pub type DynClassifier = Arc<dyn Classifier>;
