//! Query execution capability and its adapters.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use super::outcome::ExecutionOutcome;
use crate::db::DatabaseClient;
use crate::error::{Result, SqlGuardError};
use crate::safety;

/// Runs a statement and materializes its result.
///
/// A statement the database rejects is still `Ok`, as a failed outcome.
/// `Err` is reserved for the capability itself being unusable, such as an
/// unreachable database.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome>;
}

/// Executor backed by a [`DatabaseClient`].
pub struct DatabaseExecutor {
    client: Arc<dyn DatabaseClient>,
    timeout: Option<Duration>,
}

impl DatabaseExecutor {
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Fails statements that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl SqlExecutor for DatabaseExecutor {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome> {
        let statement = terminate(sql);
        let start = Instant::now();

        let result = match self.timeout {
            Some(timeout) => {
                match tokio::time::timeout(timeout, self.client.execute_query(&statement)).await {
                    Ok(result) => result,
                    Err(_) => Err(SqlGuardError::query(format!(
                        "Query timed out after {} seconds",
                        timeout.as_secs()
                    ))),
                }
            }
            None => self.client.execute_query(&statement).await,
        };

        match result {
            Ok(query_result) => {
                debug!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    rows = query_result.row_count(),
                    "Statement executed"
                );
                Ok(ExecutionOutcome::from_query_result(query_result))
            }
            Err(SqlGuardError::Query(message)) => {
                debug!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %message,
                    "Statement failed"
                );
                Ok(ExecutionOutcome::failure(message, start.elapsed()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Executor that refuses statements the safety filter rejects.
///
/// Rejected statements never reach the inner executor and come back as
/// failed outcomes, so a generator proposing a mutating statement simply
/// scores zero.
pub struct GuardedExecutor {
    inner: Arc<dyn SqlExecutor>,
}

impl GuardedExecutor {
    pub fn new(inner: Arc<dyn SqlExecutor>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SqlExecutor for GuardedExecutor {
    async fn execute(&self, sql: &str) -> Result<ExecutionOutcome> {
        if let Err(violation) = safety::check_sql(sql) {
            debug!(%violation, "Refusing to execute statement");
            return Ok(ExecutionOutcome::failure(
                format!("rejected by safety filter: {violation}"),
                Duration::ZERO,
            ));
        }
        self.inner.execute(sql).await
    }
}

/// Appends a statement terminator when missing.
fn terminate(sql: &str) -> String {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}
