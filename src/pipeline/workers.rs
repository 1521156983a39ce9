// src/pipeline/workers.rs
//! Bounded pool for blocking classifier calls.
//!
//! Each call runs on tokio's blocking pool while holding a semaphore permit, so
//! at most `workers` classifier calls are in flight per pipeline and the
//! coordinating task stays responsive.

use crate::classify::{ClassificationOutcome, DynClassifier};
use crate::error::{PipelineError, Stage};
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub struct ClassifierPool {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl ClassifierPool {
    pub fn new(workers: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
        }
    }

    /// Classify `texts` in order. Uses the batched form when the classifier
    /// supports it, otherwise one concurrent call per item. Any failure,
    /// timeout or short answer fails the whole stage.
    pub async fn run(
        &self,
        classifier: &DynClassifier,
        stage: Stage,
        texts: Vec<String>,
    ) -> Result<Vec<ClassificationOutcome>, PipelineError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();

        let outcomes = if classifier.supports_batch() {
            let c = Arc::clone(classifier);
            self.blocking(stage, move || c.classify_many(&texts)).await?
        } else {
            try_join_all(texts.into_iter().map(|text| {
                let c = Arc::clone(classifier);
                self.blocking(stage, move || c.classify(&text))
            }))
            .await?
        };

        if outcomes.len() != expected {
            return Err(PipelineError::ClassificationFailure {
                stage,
                reason: format!(
                    "{} returned {} outcomes for {} inputs",
                    classifier.name(),
                    outcomes.len(),
                    expected
                ),
            });
        }

        Ok(outcomes
            .into_iter()
            .map(|mut o| {
                o.confidence = clamp_confidence(o.confidence);
                o
            })
            .collect())
    }

    async fn blocking<T, F>(&self, stage: Stage, f: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, crate::classify::ClassifierError> + Send + 'static,
    {
        let fail = |reason: String| PipelineError::ClassificationFailure { stage, reason };

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(Ok(v))) => Ok(v),
            Ok(Ok(Err(e))) => Err(fail(e.to_string())),
            Ok(Err(join)) => Err(fail(format!("classifier worker failed: {join}"))),
            Err(_) => Err(fail(format!("timed out after {:?}", self.timeout))),
        }
    }
}

fn clamp_confidence(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}
