// src/classify/remote.rs
//! Hosted text-classification model (Hugging Face inference API).

use super::{ClassificationOutcome, Classifier, ClassifierError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

pub const DEFAULT_INFERENCE_BASE: &str = "https://router.huggingface.co/hf-inference/models";

/// Blocking classifier backed by an async HTTP client.
///
/// `classify` drives the request to completion on the runtime captured at
/// construction, so it must only be called from a blocking-pool thread (the
/// pipeline's worker pool does exactly that).
pub struct RemoteClassifier {
    http: reqwest::Client,
    runtime: Handle,
    endpoint: String,
    token: Option<String>,
    name: &'static str,
}

impl RemoteClassifier {
    /// `name` is used in logs and diagnostics, e.g. "hf-binary".
    pub fn new(
        model: &str,
        token: Option<String>,
        timeout: Duration,
        name: &'static str,
    ) -> Result<Self, ClassifierError> {
        Self::with_base(DEFAULT_INFERENCE_BASE, model, token, timeout, name)
    }

    pub fn with_base(
        base: &str,
        model: &str,
        token: Option<String>,
        timeout: Duration,
        name: &'static str,
    ) -> Result<Self, ClassifierError> {
        let runtime = Handle::try_current()
            .map_err(|e| ClassifierError::Unavailable(format!("no tokio runtime: {e}")))?;
        let http = reqwest::Client::builder()
            .user_agent("feedback-triage/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            runtime,
            endpoint: format!("{}/{}", base.trim_end_matches('/'), model),
            token: token.filter(|t| !t.trim().is_empty()),
            name,
        })
    }

    async fn infer(&self, inputs: Value, expected: usize) -> Result<Vec<ClassificationOutcome>, ClassifierError> {
        let body = json!({ "inputs": inputs, "options": { "wait_for_model": true } });
        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        let status = resp.status();
        let value: Value = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        if !status.is_success() {
            let msg = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("no error message")
                .to_string();
            return Err(ClassifierError::Unavailable(format!("{status}: {msg}")));
        }
        debug!(classifier = self.name, expected, "inference response received");
        parse_predictions(&value, expected)
    }
}

impl Classifier for RemoteClassifier {
    fn classify(&self, text: &str) -> Result<ClassificationOutcome, ClassifierError> {
        let mut out = self
            .runtime
            .block_on(self.infer(Value::String(text.to_string()), 1))?;
        out.pop()
            .ok_or_else(|| ClassifierError::Malformed("empty prediction list".into()))
    }

    fn classify_many(&self, texts: &[String]) -> Result<Vec<ClassificationOutcome>, ClassifierError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.runtime
            .block_on(self.infer(json!(texts), texts.len()))
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// Accepts the shapes the inference API returns:
/// `[[{label,score},..],..]` (one list per input) or `[{label,score},..]`
/// (a single input's scores). Picks the top-scoring label per input.
pub fn parse_predictions(value: &Value, expected: usize) -> Result<Vec<ClassificationOutcome>, ClassifierError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ClassifierError::Malformed("expected a JSON array".into()))?;

    let per_input: Vec<Vec<LabelScore>> = if arr.iter().all(Value::is_array) {
        arr.iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?
    } else {
        let one: Vec<LabelScore> = serde_json::from_value(value.clone())
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        vec![one]
    };

    if per_input.len() != expected {
        return Err(ClassifierError::Malformed(format!(
            "expected {expected} predictions, got {}",
            per_input.len()
        )));
    }

    per_input
        .into_iter()
        .map(|scores| {
            scores
                .into_iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .map(|top| ClassificationOutcome::new(top.label, top.score.clamp(0.0, 1.0)))
                .ok_or_else(|| ClassifierError::Malformed("empty score list".into()))
        })
        .collect()
}
