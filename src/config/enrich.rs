// src/config/enrich.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "groq".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// "groq" | "openai" | "disabled" (case-insensitive)
    pub provider: String,
    /// "ENV" means: read from GROQ_API_KEY / OPENAI_API_KEY (by provider)
    pub api_key: String,
    /// Provider default when absent.
    pub model: Option<String>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: default_api_key(),
            model: None,
        }
    }
}

impl EnrichConfig {
    /// Apply `ENRICH_*` overrides, normalize the provider and resolve an "ENV"
    /// key. A missing key leaves `api_key` empty; the bootstrap then runs with
    /// template-only enrichment instead of failing.
    pub fn resolve(&mut self) {
        if let Ok(p) = env::var("ENRICH_PROVIDER") {
            self.provider = p;
        }
        if let Ok(m) = env::var("ENRICH_MODEL") {
            self.model = Some(m);
        }
        if let Ok(k) = env::var("ENRICH_API_KEY") {
            self.api_key = k;
        }

        self.provider = self.provider.trim().to_lowercase();
        self.model = self.model.take().filter(|m| !m.trim().is_empty());

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            let var = match self.provider.as_str() {
                "groq" => Some("GROQ_API_KEY"),
                "openai" => Some("OPENAI_API_KEY"),
                _ => None,
            };
            self.api_key = var.and_then(|v| env::var(v).ok()).unwrap_or_default();
        }
    }

    pub fn is_enabled(&self) -> bool {
        let key = self.api_key.trim();
        self.provider != "disabled" && !key.is_empty() && !key.eq_ignore_ascii_case("env")
    }
}
