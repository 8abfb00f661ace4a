//! Top-level rewrite orchestration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::catalog::Instruction;
use super::clean::clean_sql;
use super::compare::{compare, Verdict};
use super::evaluator::CandidateResult;
use super::executor::SqlExecutor;
use super::generator::NamedGenerator;
use super::outcome::ExecutionOutcome;
use super::selector::{InstructionSelector, Selection};
use crate::error::Result;

/// When the fallback backend replaces the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Only when the primary backend failed to generate anything.
    GenerationError,
    /// Also when none of the primary backend's rewrites executed.
    #[default]
    AnyFailure,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerationError => "generation-error",
            Self::AnyFailure => "any-failure",
        }
    }

    fn should_fall_back(&self, selection: &Selection) -> bool {
        match self {
            Self::GenerationError => selection.all_generation_failed(),
            Self::AnyFailure => {
                selection.all_generation_failed() || selection.best().score() == 0
            }
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generation-error" => Ok(Self::GenerationError),
            "any-failure" => Ok(Self::AnyFailure),
            _ => Err(format!("Unknown fallback policy: {}", s)),
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final product of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Outcome of the original query, run once by the pipeline.
    pub original: ExecutionOutcome,
    pub rewritten_sql: String,
    pub rewritten_result: ExecutionOutcome,
    /// Original outcome compared against the winning rewrite's outcome.
    pub comparison: Verdict,
    pub instruction: Instruction,
    /// Identifier of the backend that produced the winner.
    pub backend: String,
    pub candidates: Vec<CandidateResult>,
}

/// Selection over a primary backend with an optional single fallback.
pub struct RewritePipeline {
    selector: InstructionSelector,
    executor: Arc<dyn SqlExecutor>,
    primary: NamedGenerator,
    fallback: Option<NamedGenerator>,
    policy: FallbackPolicy,
}

impl RewritePipeline {
    pub fn new(
        selector: InstructionSelector,
        executor: Arc<dyn SqlExecutor>,
        primary: NamedGenerator,
    ) -> Self {
        Self {
            selector,
            executor,
            primary,
            fallback: None,
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: NamedGenerator) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn selector(&self) -> &InstructionSelector {
        &self.selector
    }

    /// Evaluates every instruction against `original` with the primary
    /// backend only.
    pub async fn search(&self, original: &str) -> Result<Selection> {
        self.selector
            .select_best(
                self.primary.generator.as_ref(),
                self.executor.as_ref(),
                original,
            )
            .await
    }

    /// Produces the best verified rewrite of `original`.
    ///
    /// Errors only when the execution capability itself is unusable while
    /// running the original; per-instruction failures are folded into the
    /// candidates.
    pub async fn rewrite(&self, original: &str) -> Result<PipelineResult> {
        let start = Instant::now();
        let original_outcome = self.executor.execute(original).await?;

        let mut selection = self.search(original).await?;
        let mut backend = self.primary.name.clone();

        if let Some(fallback) = &self.fallback {
            if self.policy.should_fall_back(&selection) {
                warn!(
                    primary = %self.primary.name,
                    fallback = %fallback.name,
                    policy = %self.policy,
                    "Primary backend produced no usable rewrite, trying fallback"
                );
                let retried = self
                    .selector
                    .select_best(
                        fallback.generator.as_ref(),
                        self.executor.as_ref(),
                        original,
                    )
                    .await?;

                if retried.best().score() >= selection.best().score() {
                    selection = retried;
                    backend = fallback.name.clone();
                }
            }
        }

        let (best, candidates) = selection.into_parts();
        let rewritten_sql = clean_sql(best.rewritten_sql());
        let comparison = compare(&original_outcome, best.outcome());

        info!(
            backend = %backend,
            score = best.score(),
            valid = comparison.valid,
            reason = %comparison.reason,
            duration_ms = start.elapsed().as_millis() as u64,
            "Rewrite pipeline finished"
        );

        Ok(PipelineResult {
            original: original_outcome,
            rewritten_sql,
            rewritten_result: best.outcome().clone(),
            comparison,
            instruction: best.instruction().clone(),
            backend,
            candidates,
        })
    }
}
