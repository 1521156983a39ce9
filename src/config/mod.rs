// src/config/mod.rs
//! Application configuration: `config/triage.toml` (or `$TRIAGE_CONFIG_PATH`),
//! built-in defaults when the file is absent, then environment overrides.

pub mod enrich;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use std::{env, fs};
use tracing::warn;

use crate::classify::LabelPolicy;
use crate::ingest::filter::FilterConfig;
pub use enrich::EnrichConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/triage.toml";
pub const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub accept: Vec<String>,
    pub reject: Vec<String>,
    /// Swap the two sets (models trained with the opposite polarity).
    pub invert: bool,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        let policy = LabelPolicy::default();
        Self {
            accept: policy.accept_labels().map(str::to_string).collect(),
            reject: policy.reject_labels().map(str::to_string).collect(),
            invert: false,
        }
    }
}

impl LabelsConfig {
    pub fn policy(&self) -> LabelPolicy {
        let p = LabelPolicy::new(self.accept.iter().cloned(), self.reject.iter().cloned());
        if self.invert {
            p.inverted()
        } else {
            p
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub batch_size: usize,
    pub target_accepted: usize,
    pub max_scanned: usize,
    pub page_timeout_ms: u64,
    pub language: String,
    pub country: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            target_accepted: 30,
            max_scanned: 500,
            page_timeout_ms: 30_000,
            language: "es".into(),
            country: "us".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub classifier_workers: usize,
    pub classifier_timeout_ms: u64,
    pub enrich_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier_workers: 4,
            classifier_timeout_ms: 30_000,
            enrich_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// `None` = in-process memory store.
    pub url: Option<String>,
    /// Base TTL for cached operations.
    pub ttl_secs: u64,
    /// Per-operation TTLs; `0` inherits `ttl_secs`.
    pub fetch_ttl_secs: u64,
    pub enrich_ttl_secs: u64,
    pub op_timeout_ms: u64,
    pub max_connect_failures: u32,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            ttl_secs: 3600,
            fetch_ttl_secs: 1800,
            enrich_ttl_secs: 7200,
            op_timeout_ms: 2000,
            max_connect_failures: 3,
            key_prefix: crate::cache::DEFAULT_KEY_PREFIX.into(),
        }
    }
}

impl CacheConfig {
    pub fn fetch_ttl(&self) -> Duration {
        self.ttl_or_base(self.fetch_ttl_secs)
    }

    pub fn enrich_ttl(&self) -> Duration {
        self.ttl_or_base(self.enrich_ttl_secs)
    }

    fn ttl_or_base(&self, secs: u64) -> Duration {
        Duration::from_secs(if secs == 0 { self.ttl_secs } else { secs })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Hosted inference API.
    Remote,
    /// Bundled keyword lexicon, no network.
    Lexicon,
}

impl FromStr for ClassifierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(ClassifierMode::Remote),
            "lexicon" => Ok(ClassifierMode::Lexicon),
            other => Err(format!("unknown classifier mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub mode: ClassifierMode,
    pub binary_model: String,
    pub multiclass_model: String,
    /// Inference API token; usually from `HF_API_TOKEN`.
    pub api_token: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: ClassifierMode::Lexicon,
            binary_model: "SamuelSoto7/Perseus_binario".into(),
            multiclass_model: "SamuelSoto7/Perseus_Multiclase".into(),
            api_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub labels: LabelsConfig,
    pub filter: FilterConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub classifier: ClassifierConfig,
    pub enrich: EnrichConfig,
}

impl AppConfig {
    /// `$TRIAGE_CONFIG_PATH`, else `config/triage.toml`, else defaults.
    /// Environment overrides and sanitising are applied in every case.
    pub fn load() -> Result<Self> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut cfg = if path.exists() {
            Self::from_file(&path)?
        } else {
            if env::var(ENV_CONFIG_PATH).is_ok() {
                warn!(path = %path.display(), "config file not found; using defaults");
            }
            Self::default()
        };
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Parse a TOML file as-is (no env overrides).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("REDIS_URL") {
            self.cache.url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(v) = env_parse::<bool>("CACHE_ENABLED") {
            self.cache.enabled = v;
        }
        // One TTL for every cached operation.
        if let Some(v) = env_parse::<u64>("CACHE_TTL_SECS") {
            self.cache.ttl_secs = v;
            self.cache.fetch_ttl_secs = 0;
            self.cache.enrich_ttl_secs = 0;
        }
        if let Ok(t) = env::var("HF_API_TOKEN") {
            self.classifier.api_token = Some(t);
        }
        if let Ok(m) = env::var("BINARY_MODEL") {
            self.classifier.binary_model = m;
        }
        if let Ok(m) = env::var("MULTICLASS_MODEL") {
            self.classifier.multiclass_model = m;
        }
        if let Some(mode) = env_parse::<ClassifierMode>("CLASSIFIER_MODE") {
            self.classifier.mode = mode;
        }
        self.enrich.resolve();
    }

    /// Replace invalid values with defaults instead of failing.
    pub fn sanitize(&mut self) {
        let d = AppConfig::default();
        if self.filter.min_rating > self.filter.max_rating {
            std::mem::swap(&mut self.filter.min_rating, &mut self.filter.max_rating);
        }
        if self.fetch.batch_size == 0 {
            self.fetch.batch_size = d.fetch.batch_size;
        }
        if self.fetch.page_timeout_ms == 0 {
            self.fetch.page_timeout_ms = d.fetch.page_timeout_ms;
        }
        if self.pipeline.classifier_workers == 0 {
            self.pipeline.classifier_workers = d.pipeline.classifier_workers;
        }
        if self.pipeline.classifier_timeout_ms == 0 {
            self.pipeline.classifier_timeout_ms = d.pipeline.classifier_timeout_ms;
        }
        if self.pipeline.enrich_timeout_ms == 0 {
            self.pipeline.enrich_timeout_ms = d.pipeline.enrich_timeout_ms;
        }
        if self.cache.op_timeout_ms == 0 {
            self.cache.op_timeout_ms = d.cache.op_timeout_ms;
        }
        if self.cache.max_connect_failures == 0 {
            self.cache.max_connect_failures = 1;
        }
        if self.cache.key_prefix.trim().is_empty() {
            self.cache.key_prefix = d.cache.key_prefix;
        }
        if self.cache.ttl_secs == 0 {
            self.cache.ttl_secs = d.cache.ttl_secs;
        }
        if self.labels.accept.is_empty() && self.labels.reject.is_empty() {
            self.labels = d.labels;
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "ignoring invalid env override");
            None
        }
    }
}
