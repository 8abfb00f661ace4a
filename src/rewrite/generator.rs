//! Candidate generation capability and its adapters.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::catalog::Instruction;
use crate::error::{Result, SqlGuardError};
use crate::llm::{LlmClient, RewritePrompt};

/// Produces a rewrite of `sql` under `instruction`.
///
/// The returned text is raw generator output; callers clean it before use.
#[async_trait]
pub trait RewriteGenerator: Send + Sync {
    async fn generate(&self, sql: &str, instruction: &Instruction) -> Result<String>;
}

/// Generator backed by an LLM client.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RewriteGenerator for LlmGenerator {
    async fn generate(&self, sql: &str, instruction: &Instruction) -> Result<String> {
        let prompt = RewritePrompt::for_rewrite(sql, instruction.as_str());
        let start = Instant::now();
        let response = self.client.complete(&prompt).await?;

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            response_len = response.len(),
            "LLM rewrite completed"
        );

        // Some backends report failures in-band instead of via status codes.
        if response.trim_start().starts_with("ERROR") {
            return Err(SqlGuardError::llm(response.trim().to_string()));
        }

        Ok(response)
    }
}

/// Wraps a generator with a deadline.
pub struct TimeoutGenerator {
    inner: Arc<dyn RewriteGenerator>,
    timeout: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn RewriteGenerator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl RewriteGenerator for TimeoutGenerator {
    async fn generate(&self, sql: &str, instruction: &Instruction) -> Result<String> {
        tokio::time::timeout(self.timeout, self.inner.generate(sql, instruction))
            .await
            .map_err(|_| {
                SqlGuardError::llm(format!(
                    "Rewrite generation timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
    }
}

/// A generator resolved from the registry, carrying its identifier.
#[derive(Clone)]
pub struct NamedGenerator {
    pub name: String,
    pub generator: Arc<dyn RewriteGenerator>,
}

impl std::fmt::Debug for NamedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedGenerator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Maps backend identifiers to generators.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Arc<dyn RewriteGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `generator` under `name`, replacing any previous entry.
    pub fn register(mut self, name: impl Into<String>, generator: Arc<dyn RewriteGenerator>) -> Self {
        self.generators.insert(name.into(), generator);
        self
    }

    /// Looks up a backend by identifier.
    pub fn resolve(&self, name: &str) -> Result<NamedGenerator> {
        let generator = self.generators.get(name).cloned().ok_or_else(|| {
            SqlGuardError::config(format!(
                "Unknown rewrite backend '{}'. Registered: {}",
                name,
                self.names().join(", ")
            ))
        })?;

        Ok(NamedGenerator {
            name: name.to_string(),
            generator,
        })
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.generators.keys().map(String::as_str).collect()
    }
}
