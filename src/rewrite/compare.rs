//! Structural equivalence check between two execution outcomes.

use serde::{Serialize, Serializer};
use std::fmt;

use super::outcome::{ExecutionOutcome, OutcomeRow};
use crate::db::Value;

/// Why a comparison came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictReason {
    OriginalFailed,
    RewriteFailed(String),
    RowCountMismatch,
    RowValueMismatch,
    ResultsMatch,
    /// Generation or execution of the candidate itself errored.
    EvaluationFailed(String),
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OriginalFailed => write!(f, "original failed"),
            Self::RewriteFailed(error) => write!(f, "rewrite failed: {error}"),
            Self::RowCountMismatch => write!(f, "row count mismatch"),
            Self::RowValueMismatch => write!(f, "row value mismatch"),
            Self::ResultsMatch => write!(f, "results match"),
            Self::EvaluationFailed(error) => write!(f, "evaluation failed: {error}"),
        }
    }
}

impl Serialize for VerdictReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of comparing an original outcome against a rewrite's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub reason: VerdictReason,
}

impl Verdict {
    fn valid() -> Self {
        Self {
            valid: true,
            reason: VerdictReason::ResultsMatch,
        }
    }

    fn invalid(reason: VerdictReason) -> Self {
        Self {
            valid: false,
            reason,
        }
    }

    /// Verdict attached to a candidate whose evaluation errored.
    pub fn evaluation_failed(error: impl Into<String>) -> Self {
        Self::invalid(VerdictReason::EvaluationFailed(error.into()))
    }
}

/// Compares two outcomes row by row.
///
/// Row order matters. Within a row, column names are matched
/// case-insensitively and emission order is ignored, so a rewrite that
/// reorders its select list or changes alias casing still compares equal.
/// Values are compared exactly.
pub fn compare(original: &ExecutionOutcome, rewritten: &ExecutionOutcome) -> Verdict {
    if !original.success {
        return Verdict::invalid(VerdictReason::OriginalFailed);
    }
    if !rewritten.success {
        return Verdict::invalid(VerdictReason::RewriteFailed(
            rewritten.error_message().to_string(),
        ));
    }
    if original.row_count() != rewritten.row_count() {
        return Verdict::invalid(VerdictReason::RowCountMismatch);
    }

    let all_equal = original
        .rows
        .iter()
        .zip(&rewritten.rows)
        .all(|(left, right)| normalize_row(left) == normalize_row(right));

    if all_equal {
        Verdict::valid()
    } else {
        Verdict::invalid(VerdictReason::RowValueMismatch)
    }
}

/// Lower-cases column names and orders pairs by name. The sort is stable, so
/// columns that collide after lower-casing keep their relative order.
fn normalize_row(row: &OutcomeRow) -> Vec<(String, &Value)> {
    let mut pairs: Vec<(String, &Value)> = row
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}
