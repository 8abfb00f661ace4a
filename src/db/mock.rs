//! Mock database client for testing.
//!
//! Serves registered fixture results keyed by normalized SQL text, so the
//! rewrite engine can be exercised without a running database.

use super::{ColumnInfo, DatabaseClient, QueryResult, Value};
use crate::error::{Result, SqlGuardError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Outcome served for a registered statement.
#[derive(Debug, Clone)]
enum Fixture {
    Rows(QueryResult),
    Error(String),
}

/// One entry of a JSON fixture file.
///
/// ```json
/// [
///   {"sql": "SELECT id FROM users", "columns": ["id"], "rows": [[1], [2]]},
///   {"sql": "SELECT nope FROM users", "error": "column \"nope\" does not exist"}
/// ]
/// ```
#[derive(Debug, Deserialize)]
struct FixtureEntry {
    sql: String,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

/// A mock database client that returns predefined results.
#[derive(Debug, Default)]
pub struct MockDatabaseClient {
    fixtures: HashMap<String, Fixture>,
    unreachable: bool,
    executed: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with no fixtures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client whose every call fails as if the server were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Loads fixtures from a JSON file: an array of `{sql, columns, rows}` or `{sql, error}` objects.
    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SqlGuardError::config(format!(
                "Failed to read fixture file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_fixture_json(&content)
    }

    /// Loads fixtures from a JSON array.
    pub fn from_fixture_json(json: &str) -> Result<Self> {
        let entries: Vec<FixtureEntry> = serde_json::from_str(json)
            .map_err(|e| SqlGuardError::config(format!("Invalid fixture file: {e}")))?;

        let client = entries
            .into_iter()
            .fold(Self::new(), |client, entry| match entry.error {
                Some(message) => client.with_error(&entry.sql, message),
                None => {
                    let columns: Vec<&str> = entry.columns.iter().map(String::as_str).collect();
                    client.with_rows(&entry.sql, &columns, entry.rows)
                }
            });
        Ok(client)
    }

    /// Registers a result set for `sql`.
    ///
    /// `columns` names the result columns in emission order; each row lists
    /// values in the same order.
    pub fn with_rows(
        mut self,
        sql: &str,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let columns = columns
            .iter()
            .map(|name| ColumnInfo::new(*name, "text"))
            .collect();
        let result =
            QueryResult::with_data(columns, rows).with_execution_time(Duration::from_millis(1));
        self.fixtures
            .insert(normalize_sql(sql), Fixture::Rows(result));
        self
    }

    /// Registers a database-side failure for `sql`.
    pub fn with_error(mut self, sql: &str, message: impl Into<String>) -> Self {
        self.fixtures
            .insert(normalize_sql(sql), Fixture::Error(message.into()));
        self
    }

    /// Returns every statement executed so far, as received.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Returns how many times `sql` (normalized) was executed.
    pub fn execution_count(&self, sql: &str) -> usize {
        let wanted = normalize_sql(sql);
        self.executed()
            .iter()
            .filter(|s| normalize_sql(s) == wanted)
            .count()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }

        if self.unreachable {
            return Err(SqlGuardError::connection(
                "Cannot connect to mock database. Check that the server is running.",
            ));
        }

        match self.fixtures.get(&normalize_sql(sql)) {
            Some(Fixture::Rows(result)) => Ok(result.clone()),
            Some(Fixture::Error(message)) => Err(SqlGuardError::query(message.clone())),
            None => Err(SqlGuardError::query(format!(
                "ERROR: no fixture registered for: {}",
                sql.trim()
            ))),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Normalizes SQL for fixture lookup: lower-cased, whitespace collapsed,
/// trailing terminators dropped.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim_end()
        .to_lowercase()
}
