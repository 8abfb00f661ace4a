//! LLM integration for sqlguard.
//!
//! Provides the client trait and implementations for the supported providers.
//! The rewrite engine consumes these through [`crate::rewrite::LlmGenerator`].

mod anthropic;
mod factory;
mod gemini;
mod http;
mod mock;
mod ollama;
mod openai;
mod prompt;

pub use anthropic::{AnthropicClient, DEFAULT_ANTHROPIC_MODEL};
pub use factory::create_client;
pub use gemini::{GeminiClient, DEFAULT_GEMINI_MODEL};
pub use http::BackendSettings;
pub use mock::MockLlmClient;
pub use ollama::{OllamaClient, DEFAULT_OLLAMA_MODEL};
pub use openai::{OpenAiClient, DEFAULT_OPENAI_MODEL};
pub use prompt::{build_rewrite_prompt, RewritePrompt};

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// A text-generation backend.
///
/// Implementations must be thread-safe (Send + Sync); the selector calls one
/// client from several tasks at once.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the raw model output for a rewrite prompt.
    async fn complete(&self, prompt: &RewritePrompt) -> Result<String>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LlmProvider {
    /// Google Gemini
    #[default]
    Gemini,
    /// OpenAI (GPT-4, etc.)
    OpenAi,
    /// Anthropic (Claude)
    Anthropic,
    /// Local Ollama instance
    Ollama,
    /// Mock client for testing (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
