//! Gated entry point for callers.
//!
//! Applies admission control, then the safety filter, then runs the rewrite
//! pipeline. Composes the engine from configuration.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, SqlGuardError};
use crate::llm::{create_client, LlmProvider};
use crate::rate_limit::{Admission, RateLimiter};
use crate::rewrite::{
    GeneratorRegistry, GuardedExecutor, InstructionCatalog, InstructionSelector, LlmGenerator,
    PipelineResult, RewriteGenerator, RewritePipeline, Selection, SqlExecutor, TimeoutGenerator,
};
use crate::safety;

/// Operation name used for rate limiting full rewrites.
pub const OP_REWRITE: &str = "rewrite";
/// Operation name used for rate limiting instruction searches.
pub const OP_SEARCH: &str = "search";

/// Rate-limited, safety-checked access to a [`RewritePipeline`].
pub struct RewriteService {
    limiter: Arc<RateLimiter>,
    pipeline: RewritePipeline,
}

impl RewriteService {
    pub fn new(limiter: Arc<RateLimiter>, pipeline: RewritePipeline) -> Self {
        Self { limiter, pipeline }
    }

    /// Builds the service described by `config` on top of `executor`.
    ///
    /// Statements proposed by a generator are screened by the safety filter
    /// before they reach `executor`.
    pub fn from_config(config: &Config, executor: Arc<dyn SqlExecutor>) -> Result<Self> {
        let registry = build_registry(config)?;

        let catalog = if config.search.single_instruction {
            InstructionCatalog::strict()
        } else {
            InstructionCatalog::default()
        };
        let selector = InstructionSelector::new(catalog).with_concurrency(config.search.concurrency);
        let executor: Arc<dyn SqlExecutor> = Arc::new(GuardedExecutor::new(executor));

        let primary = registry.resolve(&backend_id(
            &config.llm.provider,
            config.llm.model.as_deref(),
        ))?;
        let mut pipeline = RewritePipeline::new(selector, executor, primary)
            .with_policy(config.search.fallback_policy);
        if let Some(fallback) = &config.llm.fallback_provider {
            let id = backend_id(fallback, config.llm.fallback_model.as_deref());
            pipeline = pipeline.with_fallback(registry.resolve(&id)?);
        }

        let limiter = Arc::new(RateLimiter::new(config.rate_limit.to_settings()));
        Ok(Self::new(limiter, pipeline))
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Produces the best verified rewrite of `sql` on behalf of `subject`.
    pub async fn rewrite(&self, subject: &str, sql: &str) -> Result<PipelineResult> {
        self.gate(subject, OP_REWRITE, sql)?;
        self.pipeline.rewrite(sql).await
    }

    /// Scores every instruction for `sql` on behalf of `subject`.
    pub async fn search(&self, subject: &str, sql: &str) -> Result<Selection> {
        self.gate(subject, OP_SEARCH, sql)?;
        self.pipeline.search(sql).await
    }

    fn gate(&self, subject: &str, operation: &str, sql: &str) -> Result<()> {
        if let Admission::Reject { retry_after_secs } = self.limiter.admit(subject, operation) {
            return Err(SqlGuardError::RateLimited { retry_after_secs });
        }

        if let Err(violation) = safety::check_sql(sql) {
            warn!(subject, operation, %violation, "Rejected unsafe SQL");
            return Err(violation.into());
        }

        info!(subject, operation, "Request admitted");
        Ok(())
    }
}

/// Registers a generator for the configured primary and fallback providers.
pub fn build_registry(config: &Config) -> Result<GeneratorRegistry> {
    let timeout_secs = config.llm.timeout_secs.max(1);
    let mut registry = GeneratorRegistry::new();

    let mut backends = vec![(config.llm.provider.as_str(), config.llm.model.as_deref())];
    if let Some(fallback) = &config.llm.fallback_provider {
        backends.push((fallback.as_str(), config.llm.fallback_model.as_deref()));
    }

    for (name, model) in backends {
        let provider: LlmProvider = name.parse().map_err(SqlGuardError::config)?;
        let client = create_client(provider, model, timeout_secs)?;
        let generator: Arc<dyn RewriteGenerator> = Arc::new(TimeoutGenerator::new(
            Arc::new(LlmGenerator::new(client)),
            Duration::from_secs(timeout_secs),
        ));
        registry = registry.register(backend_id(provider.as_str(), model), generator);
    }

    Ok(registry)
}

/// Registry identifier for a provider and optional model, e.g. `ollama/sqlcoder:15b`.
fn backend_id(provider: &str, model: Option<&str>) -> String {
    let provider = provider.to_lowercase();
    match model {
        Some(model) => format!("{provider}/{model}"),
        None => provider,
    }
}
