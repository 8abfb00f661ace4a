//! Scoring a single instruction.

use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;

use super::catalog::Instruction;
use super::clean::clean_sql;
use super::compare::{compare, Verdict};
use super::executor::SqlExecutor;
use super::generator::RewriteGenerator;
use super::outcome::ExecutionOutcome;
use crate::error::{Result, SqlGuardError};

/// Points for a rewrite that executed.
const EXECUTED_POINTS: u8 = 1;
/// Points for a rewrite whose results match the original.
const MATCH_POINTS: u8 = 2;

/// One scored rewrite attempt.
///
/// The score is derived from the outcome and verdict at construction and
/// cannot be set independently.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    instruction: Instruction,
    rewritten_sql: String,
    outcome: ExecutionOutcome,
    verdict: Verdict,
    score: u8,
    generation_failed: bool,
}

impl CandidateResult {
    fn scored(
        instruction: Instruction,
        rewritten_sql: String,
        outcome: ExecutionOutcome,
        verdict: Verdict,
    ) -> Self {
        let mut score = 0;
        if outcome.success {
            score += EXECUTED_POINTS;
        }
        if verdict.valid {
            score += MATCH_POINTS;
        }

        Self {
            instruction,
            rewritten_sql,
            outcome,
            verdict,
            score,
            generation_failed: false,
        }
    }

    fn failed(instruction: Instruction, error: &SqlGuardError, generation_failed: bool) -> Self {
        let message = error.to_string();
        Self {
            instruction,
            rewritten_sql: String::new(),
            outcome: ExecutionOutcome::failure(message.clone(), Duration::ZERO),
            verdict: Verdict::evaluation_failed(message),
            score: 0,
            generation_failed,
        }
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    /// Cleaned rewrite text; empty when evaluation failed.
    pub fn rewritten_sql(&self) -> &str {
        &self.rewritten_sql
    }

    pub fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// 0, 1 or 3.
    pub fn score(&self) -> u8 {
        self.score
    }

    /// True if the generator itself failed for this instruction.
    pub fn generation_failed(&self) -> bool {
        self.generation_failed
    }
}

enum Stage {
    Generation,
    Execution,
}

/// Generates, cleans, executes and compares one rewrite.
///
/// Never fails: any error along the way becomes a zero-score candidate.
pub async fn evaluate(
    generator: &dyn RewriteGenerator,
    executor: &dyn SqlExecutor,
    original: &str,
    instruction: &Instruction,
) -> CandidateResult {
    let start = Instant::now();

    match try_evaluate(generator, executor, original, instruction).await {
        Ok(candidate) => {
            debug!(
                instruction = %instruction,
                score = candidate.score,
                reason = %candidate.verdict.reason,
                duration_ms = start.elapsed().as_millis() as u64,
                "Candidate evaluated"
            );
            candidate
        }
        Err((stage, error)) => {
            let generation_failed = matches!(stage, Stage::Generation);
            debug!(
                instruction = %instruction,
                generation_failed,
                error = %error,
                duration_ms = start.elapsed().as_millis() as u64,
                "Candidate evaluation failed"
            );
            CandidateResult::failed(instruction.clone(), &error, generation_failed)
        }
    }
}

async fn try_evaluate(
    generator: &dyn RewriteGenerator,
    executor: &dyn SqlExecutor,
    original: &str,
    instruction: &Instruction,
) -> std::result::Result<CandidateResult, (Stage, SqlGuardError)> {
    let raw = generator
        .generate(original, instruction)
        .await
        .map_err(|e| (Stage::Generation, e))?;

    let rewritten_sql = clean_sql(&raw);
    if rewritten_sql.is_empty() {
        return Err((
            Stage::Generation,
            SqlGuardError::llm("generator returned no SQL"),
        ));
    }

    let executed = run_pair(executor, &rewritten_sql, original)
        .await
        .map_err(|e| (Stage::Execution, e))?;
    let (rewritten_outcome, original_outcome) = executed;

    let verdict = compare(&original_outcome, &rewritten_outcome);
    Ok(CandidateResult::scored(
        instruction.clone(),
        rewritten_sql,
        rewritten_outcome,
        verdict,
    ))
}

async fn run_pair(
    executor: &dyn SqlExecutor,
    rewritten: &str,
    original: &str,
) -> Result<(ExecutionOutcome, ExecutionOutcome)> {
    let rewritten_outcome = executor.execute(rewritten).await?;
    let original_outcome = executor.execute(original).await?;
    Ok((rewritten_outcome, original_outcome))
}
