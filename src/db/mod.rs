//! Database abstraction layer for sqlguard.
//!
//! Provides a trait-based interface for running SQL, allowing the
//! Postgres backend and the in-memory fixture backend to be used
//! interchangeably by the rewrite engine.

mod mock;
mod postgres;
mod types;

pub use mock::MockDatabaseClient;
pub use postgres::PostgresClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

pub(crate) use types::duration_serde;

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the interface for database clients.
///
/// Errors are split by cause: `SqlGuardError::Query` means the database ran
/// and rejected the statement, `SqlGuardError::Connection` means the database
/// could not be reached at all.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Executes a SQL query and returns the results.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
