//! Google Gemini `generateContent` backend.
//!
//! This is the default backend, matching the model the rewrite prompt was
//! tuned against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlGuardError};
use crate::llm::http::{key_from_env, BackendSettings, JsonTransport};
use crate::llm::{LlmClient, RewritePrompt};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// The model and method are appended.
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    settings: BackendSettings,
    transport: JsonTransport,
}

impl GeminiClient {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        settings.require_key(KEY_VAR)?;
        let transport = JsonTransport::new("Gemini", settings.timeout_secs)?.with_key_var(KEY_VAR);
        Ok(Self {
            settings,
            transport,
        })
    }

    /// Settings for the public endpoint with the given key and model.
    pub fn settings(api_key: impl Into<String>, model: impl Into<String>) -> BackendSettings {
        BackendSettings::new(GEMINI_BASE_URL, model).with_api_key(api_key)
    }

    /// Reads `GEMINI_API_KEY`, and `GEMINI_MODEL` when no model is given.
    pub fn from_env(model: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let model = BackendSettings::resolve_model(model, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL);
        Self::new(Self::settings(key_from_env(KEY_VAR)?, model).with_timeout(timeout_secs))
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn generate_url(&self) -> String {
        self.settings
            .url(&format!("{}:generateContent", self.settings.model))
    }

    fn request(prompt: &RewritePrompt) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: [TextPart {
                    text: &prompt.system,
                }],
            },
            contents: [UserContent {
                role: "user",
                parts: [TextPart { text: &prompt.user }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        }
    }
}

/// Joins the parts of the first candidate. Blocked prompts come back without content.
fn candidate_text(response: GenerateContentResponse) -> Option<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .map(|part| part.text)
        .collect();

    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &RewritePrompt) -> Result<String> {
        let key = self.settings.require_key(KEY_VAR)?;
        let response: GenerateContentResponse = self
            .transport
            .post(
                &self.generate_url(),
                &[("x-goog-api-key", key)],
                &Self::request(prompt),
            )
            .await?;

        candidate_text(response).ok_or_else(|| SqlGuardError::llm("No response from Gemini"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: [UserContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserContent<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

/// Non-text parts decode with an empty string.
#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(GeminiClient::settings("key", DEFAULT_GEMINI_MODEL)).unwrap()
    }

    #[test]
    fn test_generate_url() {
        assert_eq!(
            client().generate_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_missing_key_is_reported() {
        let settings = BackendSettings::new(GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL);
        let err = GeminiClient::new(settings).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
        assert!(err.to_string().contains(KEY_VAR));
    }

    #[test]
    fn test_request_serialization() {
        let prompt = RewritePrompt::new("s", "u");

        let json = serde_json::to_value(GeminiClient::request(&prompt)).unwrap();

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "s");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "u");
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"SELECT "},{"text":"1"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(candidate_text(response), Some("SELECT 1".to_string()));
    }

    #[test]
    fn test_candidate_text_blocked_response() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(candidate_text(response), None);
    }
}
