//! Running every instruction and picking the winner.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Instant;
use tracing::debug;

use super::catalog::InstructionCatalog;
use super::evaluator::{evaluate, CandidateResult};
use super::executor::SqlExecutor;
use super::generator::RewriteGenerator;
use crate::error::{Result, SqlGuardError};

/// Default number of instructions evaluated at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Every candidate in catalog order, plus the index of the best one.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    candidates: Vec<CandidateResult>,
    best: usize,
}

impl Selection {
    pub fn best(&self) -> &CandidateResult {
        &self.candidates[self.best]
    }

    pub fn all(&self) -> &[CandidateResult] {
        &self.candidates
    }

    /// True if every candidate failed at the generation step.
    pub fn all_generation_failed(&self) -> bool {
        self.candidates.iter().all(CandidateResult::generation_failed)
    }

    pub fn into_parts(self) -> (CandidateResult, Vec<CandidateResult>) {
        let best = self.candidates[self.best].clone();
        (best, self.candidates)
    }
}

/// Evaluates a catalog of instructions against one query.
#[derive(Debug, Clone)]
pub struct InstructionSelector {
    catalog: InstructionCatalog,
    concurrency: usize,
}

impl InstructionSelector {
    pub fn new(catalog: InstructionCatalog) -> Self {
        Self {
            catalog,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets how many evaluations may be in flight at once (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn catalog(&self) -> &InstructionCatalog {
        &self.catalog
    }

    /// Evaluates every instruction and selects the highest score.
    ///
    /// Ties go to the instruction earliest in the catalog. Individual
    /// failures only lower that candidate's score.
    pub async fn select_best(
        &self,
        generator: &dyn RewriteGenerator,
        executor: &dyn SqlExecutor,
        original: &str,
    ) -> Result<Selection> {
        if self.catalog.is_empty() {
            return Err(SqlGuardError::config("instruction catalog is empty"));
        }

        let start = Instant::now();
        let candidates: Vec<CandidateResult> = stream::iter(self.catalog.iter())
            .map(|instruction| evaluate(generator, executor, original, instruction))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut best = 0;
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.score() > candidates[best].score() {
                best = index;
            }
        }

        debug!(
            candidates = candidates.len(),
            best_score = candidates[best].score(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Instruction selection finished"
        );

        Ok(Selection { candidates, best })
    }
}
