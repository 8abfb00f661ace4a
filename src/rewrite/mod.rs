//! Rewrite verification and selection engine.
//!
//! Given a generation capability and an execution capability, tries every
//! catalog instruction against a query, scores each rewrite by whether it
//! executes and whether its results match the original, and returns the best
//! one together with the full comparison.

mod catalog;
mod clean;
mod compare;
mod evaluator;
mod executor;
mod generator;
mod outcome;
mod pipeline;
mod selector;

pub use catalog::{Instruction, InstructionCatalog};
pub use clean::clean_sql;
pub use compare::{compare, Verdict, VerdictReason};
pub use evaluator::{evaluate, CandidateResult};
pub use executor::{DatabaseExecutor, GuardedExecutor, SqlExecutor};
pub use generator::{
    GeneratorRegistry, LlmGenerator, NamedGenerator, RewriteGenerator, TimeoutGenerator,
};
pub use outcome::{ExecutionOutcome, OutcomeRow};
pub use pipeline::{FallbackPolicy, PipelineResult, RewritePipeline};
pub use selector::{InstructionSelector, Selection, DEFAULT_CONCURRENCY};
