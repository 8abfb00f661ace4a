//! Anthropic messages backend.
//!
//! The system prompt travels as a top-level field, not as a turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlGuardError};
use crate::llm::http::{key_from_env, BackendSettings, JsonTransport};
use crate::llm::{LlmClient, RewritePrompt};

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Rewrites are single statements.
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    settings: BackendSettings,
    transport: JsonTransport,
}

impl AnthropicClient {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        settings.require_key(KEY_VAR)?;
        let transport =
            JsonTransport::new("Anthropic", settings.timeout_secs)?.with_key_var(KEY_VAR);
        Ok(Self {
            settings,
            transport,
        })
    }

    /// Reads `ANTHROPIC_API_KEY`, and `ANTHROPIC_MODEL` when no model is given.
    pub fn from_env(model: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let model =
            BackendSettings::resolve_model(model, "ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL);
        Self::new(
            BackendSettings::new(ANTHROPIC_BASE_URL, model)
                .with_api_key(key_from_env(KEY_VAR)?)
                .with_timeout(timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn request<'a>(&'a self, prompt: &'a RewritePrompt) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.settings.model,
            max_tokens: MAX_TOKENS,
            system: &prompt.system,
            messages: [UserTurn {
                role: "user",
                content: &prompt.user,
            }],
            temperature: 0.0,
        }
    }
}

/// Concatenates the text blocks of a reply, ignoring any other block type.
fn reply_text(response: MessagesResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect()
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &RewritePrompt) -> Result<String> {
        let key = self.settings.require_key(KEY_VAR)?;
        let response: MessagesResponse = self
            .transport
            .post(
                &self.settings.url("messages"),
                &[("x-api-key", key), ("anthropic-version", ANTHROPIC_VERSION)],
                &self.request(prompt),
            )
            .await?;

        let text = reply_text(response);
        if text.is_empty() {
            return Err(SqlGuardError::llm("No response from Anthropic"));
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserTurn<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}
