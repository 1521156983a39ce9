// src/enrich/provider.rs
//! OpenAI-compatible chat-completions enricher (Groq or OpenAI endpoints).

use super::{catalog, EnrichError, Enricher};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Longest description kept after sanitising, in chars.
const MAX_DESCRIPTION_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    Groq,
    OpenAi,
}

impl ChatProvider {
    /// "groq" | "openai" (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(ChatProvider::Groq),
            "openai" => Some(ChatProvider::OpenAi),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChatProvider::Groq => "groq",
            ChatProvider::OpenAi => "openai",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            ChatProvider::Groq => GROQ_BASE_URL,
            ChatProvider::OpenAi => OPENAI_BASE_URL,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ChatProvider::Groq => GROQ_DEFAULT_MODEL,
            ChatProvider::OpenAi => OPENAI_DEFAULT_MODEL,
        }
    }
}

pub struct ChatEnricher {
    http: reqwest::Client,
    provider: ChatProvider,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatEnricher {
    pub fn new(
        provider: ChatProvider,
        api_key: impl Into<String>,
        model: Option<&str>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Self::with_base_url(provider, provider.base_url(), api_key, model, timeout)
    }

    pub fn with_base_url(
        provider: ChatProvider,
        base_url: &str,
        api_key: impl Into<String>,
        model: Option<&str>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            anyhow::bail!("missing API key for {}", provider.name());
        }
        let http = reqwest::Client::builder()
            .user_agent("feedback-triage/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            provider,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.unwrap_or(provider.default_model()).to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str =
    "Eres un experto en ingeniería de requisitos de software y usabilidad ISO/IEC 25010.";

pub fn build_prompt(comment: &str, category: &str) -> String {
    let definition = catalog::definition_for(category);
    format!(
        "Comentario del usuario: \"{comment}\"\n\n\
         Subcaracterística de usabilidad detectada: {category}\n\
         Definición: {definition}\n\n\
         Tarea: redacta UNA descripción formal de requisito de usabilidad basada en el comentario.\n\
         - Escribe en tercera persona (El sistema debe...)\n\
         - Indica QUÉ debe hacer el sistema e incluye elementos del comentario\n\
         - Máximo 2 o 3 oraciones, enfocadas en {category}\n\n\
         Devuelve SOLO la descripción, sin explicaciones adicionales."
    )
}

impl Enricher for ChatEnricher {
    fn enrich<'a>(
        &'a self,
        text: &'a str,
        category: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichError>> + Send + 'a>> {
        Box::pin(async move {
            let prompt = build_prompt(text, category);
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: &prompt,
                    },
                ],
                temperature: 0.3,
                max_tokens: 200,
            };

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| EnrichError::Provider(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(EnrichError::Provider(format!("http status {status}")));
            }
            let body: Resp = resp
                .json()
                .await
                .map_err(|e| EnrichError::Provider(e.to_string()))?;
            let content = body
                .choices
                .first()
                .and_then(|c| c.message.content.as_deref())
                .unwrap_or("");
            let cleaned = sanitize_description(content);
            if cleaned.is_empty() {
                Err(EnrichError::Empty)
            } else {
                Ok(cleaned)
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

/// One line, collapsed whitespace, surrounding quotes stripped, bounded length.
pub fn sanitize_description(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    trimmed.chars().take(MAX_DESCRIPTION_CHARS).collect()
}
