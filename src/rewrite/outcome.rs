//! Materialized result of running one statement.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::{duration_serde, QueryResult, Value};

/// One result row: `(column name, value)` pairs in column order.
pub type OutcomeRow = Vec<(String, Value)>;

/// Outcome of executing a statement through a [`super::SqlExecutor`].
///
/// A failed outcome carries no columns and no rows. A successful outcome's
/// rows each hold exactly one pair per column, named as in `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub columns: Vec<String>,
    pub rows: Vec<OutcomeRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock execution time. Informational only.
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,
}

impl ExecutionOutcome {
    /// Creates a successful outcome.
    ///
    /// Row values are paired with column names by position; missing values
    /// are padded with `Null` and surplus values dropped.
    pub fn success(columns: Vec<String>, rows: Vec<Vec<Value>>, elapsed: Duration) -> Self {
        let rows = rows
            .into_iter()
            .map(|values| {
                let mut values = values.into_iter();
                columns
                    .iter()
                    .map(|name| (name.clone(), values.next().unwrap_or_default()))
                    .collect()
            })
            .collect();

        Self {
            success: true,
            columns,
            rows,
            error: None,
            elapsed,
        }
    }

    /// Creates a failed outcome.
    pub fn failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some(error.into()),
            elapsed,
        }
    }

    /// Builds a successful outcome from a database result set.
    pub fn from_query_result(result: QueryResult) -> Self {
        let columns = result.columns.into_iter().map(|c| c.name).collect();
        Self::success(columns, result.rows, result.execution_time)
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the error message, or an empty string for successful outcomes.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}
