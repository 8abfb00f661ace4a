//! OpenAI chat completions backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlGuardError};
use crate::llm::http::{key_from_env, BackendSettings, JsonTransport};
use crate::llm::{LlmClient, RewritePrompt};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const KEY_VAR: &str = "OPENAI_API_KEY";

/// Rewrites through OpenAI's `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    settings: BackendSettings,
    transport: JsonTransport,
}

impl OpenAiClient {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        settings.require_key(KEY_VAR)?;
        let transport = JsonTransport::new("OpenAI", settings.timeout_secs)?.with_key_var(KEY_VAR);
        Ok(Self {
            settings,
            transport,
        })
    }

    /// Reads `OPENAI_API_KEY`, and `OPENAI_MODEL` when no model is given.
    pub fn from_env(model: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let model = BackendSettings::resolve_model(model, "OPENAI_MODEL", DEFAULT_OPENAI_MODEL);
        Self::new(
            BackendSettings::new(OPENAI_BASE_URL, model)
                .with_api_key(key_from_env(KEY_VAR)?)
                .with_timeout(timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn request<'a>(&'a self, prompt: &'a RewritePrompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: &prompt.system,
                },
                ChatTurn {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &RewritePrompt) -> Result<String> {
        let bearer = format!("Bearer {}", self.settings.require_key(KEY_VAR)?);
        let response: ChatResponse = self
            .transport
            .post(
                &self.settings.url("chat/completions"),
                &[("Authorization", bearer.as_str())],
                &self.request(prompt),
            )
            .await?;

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| SqlGuardError::llm("No response from OpenAI"))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}
