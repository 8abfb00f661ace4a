//! LLM client factory.
//!
//! Centralizes provider-specific logic for creating LLM clients.

use std::sync::Arc;

use crate::error::Result;
use crate::llm::{
    AnthropicClient, GeminiClient, LlmClient, LlmProvider, MockLlmClient, OllamaClient,
    OpenAiClient,
};

/// Creates an LLM client for the given provider.
///
/// `model` overrides the provider's model environment variable
/// (`OPENAI_MODEL`, `ANTHROPIC_MODEL`, `GEMINI_MODEL`, `OLLAMA_MODEL`), which
/// in turn overrides the built-in default. API keys always come from the
/// environment (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`).
pub fn create_client(
    provider: LlmProvider,
    model: Option<&str>,
    timeout_secs: u64,
) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::from_env(model, timeout_secs)?),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::from_env(model, timeout_secs)?),
        LlmProvider::Gemini => Arc::new(GeminiClient::from_env(model, timeout_secs)?),
        LlmProvider::Ollama => Arc::new(OllamaClient::from_env(model, timeout_secs)?),
        LlmProvider::Mock => Arc::new(MockLlmClient::new()),
    };
    Ok(client)
}
