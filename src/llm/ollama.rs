//! Ollama backend for locally served models such as `sqlcoder`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlGuardError};
use crate::llm::http::{BackendSettings, JsonTransport};
use crate::llm::{LlmClient, RewritePrompt};

pub const DEFAULT_OLLAMA_MODEL: &str = "sqlcoder:15b";

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    settings: BackendSettings,
    transport: JsonTransport,
}

impl OllamaClient {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        // A local server that is down stays down; no point backing off.
        let transport = JsonTransport::new("Ollama", settings.timeout_secs)?
            .with_connect_hint("Is it running? Try: ollama serve")
            .with_max_attempts(1);
        Ok(Self {
            settings,
            transport,
        })
    }

    /// Reads `OLLAMA_URL`, and `OLLAMA_MODEL` when no model is given.
    pub fn from_env(model: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let base_url =
            std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let model = BackendSettings::resolve_model(model, "OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL);
        Self::new(BackendSettings::new(base_url, model).with_timeout(timeout_secs))
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn request<'a>(&'a self, prompt: &'a RewritePrompt) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.settings.model,
            system: &prompt.system,
            prompt: &prompt.user,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &RewritePrompt) -> Result<String> {
        let response: GenerateResponse = self
            .transport
            .post(&self.settings.url("api/generate"), &[], &self.request(prompt))
            .await?;

        if response.response.is_empty() {
            return Err(SqlGuardError::llm(format!(
                "Ollama returned no text for {}",
                self.settings.model
            )));
        }
        Ok(response.response)
    }
}

/// Body for `/api/generate`, which takes the system prompt as its own field.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
