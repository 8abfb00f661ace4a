//! PostgreSQL-backed integration tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use sqlguard::config::ConnectionConfig;
use sqlguard::db::{DatabaseClient, PostgresClient, Value};
use sqlguard::llm::MockLlmClient;
use sqlguard::rewrite::{
    DatabaseExecutor, InstructionCatalog, InstructionSelector, LlmGenerator, NamedGenerator,
    RewritePipeline, SqlExecutor, VerdictReason,
};
use std::sync::Arc;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a test client.
async fn get_test_client() -> Option<PostgresClient> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PostgresClient::connect(&config).await.ok()
}

const SERIES: &str = "SELECT n AS id, 'row ' || n AS label FROM generate_series(1, 3) AS n";

#[tokio::test]
async fn test_execute_typed_values() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1::int4 AS num, 'hello' AS greeting, NULL::text AS nothing, true AS flag")
        .await
        .unwrap();

    assert_eq!(result.columns.len(), 4);
    assert_eq!(result.columns[0].name, "num");
    assert_eq!(
        result.rows[0],
        vec![
            Value::Int(1),
            Value::Text("hello".to_string()),
            Value::Null,
            Value::Bool(true),
        ]
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1 AS a, 2 AS b WHERE false")
        .await
        .unwrap();

    assert!(result.is_empty());
    let names: Vec<_> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_syntax_error_becomes_failed_outcome() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let executor = DatabaseExecutor::new(Arc::new(client));
    let outcome = executor.execute("SELEC 1").await.unwrap();

    assert!(!outcome.success);
    assert!(outcome.error_message().contains("syntax error"));
}

#[tokio::test]
async fn test_pipeline_against_postgres() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let llm = MockLlmClient::new().with_response(
        "generate_series",
        "```sql\nSELECT 'row ' || n AS LABEL, n AS id FROM generate_series(1, 3) AS n\n```",
    );
    let pipeline = RewritePipeline::new(
        InstructionSelector::new(InstructionCatalog::default()),
        Arc::new(DatabaseExecutor::new(Arc::new(client))),
        NamedGenerator {
            name: "mock".to_string(),
            generator: Arc::new(LlmGenerator::new(Arc::new(llm))),
        },
    );

    let result = pipeline.rewrite(SERIES).await.unwrap();

    assert_eq!(result.original.row_count(), 3);
    assert!(result.comparison.valid);
    assert_eq!(result.comparison.reason, VerdictReason::ResultsMatch);
}
