//! Rewrite pipeline integration tests.
//!
//! Wires LLM-backed generators to the mock database and checks selection,
//! comparison and fallback end to end.

use pretty_assertions::assert_eq;
use sqlguard::db::{MockDatabaseClient, Value};
use sqlguard::error::SqlGuardError;
use sqlguard::llm::MockLlmClient;
use sqlguard::rewrite::{
    DatabaseExecutor, GuardedExecutor, InstructionCatalog, InstructionSelector, LlmGenerator,
    NamedGenerator, RewritePipeline, SqlExecutor, VerdictReason,
};
use std::sync::Arc;

const ORIGINAL: &str = "SELECT id, name FROM users";

fn users() -> MockDatabaseClient {
    MockDatabaseClient::new().with_rows(
        ORIGINAL,
        &["id", "name"],
        vec![
            vec![Value::Int(1), Value::Text("ada".to_string())],
            vec![Value::Int(2), Value::Text("grace".to_string())],
        ],
    )
}

fn executor(client: MockDatabaseClient) -> Arc<dyn SqlExecutor> {
    Arc::new(DatabaseExecutor::new(Arc::new(client)))
}

fn backend(name: &str, client: MockLlmClient) -> NamedGenerator {
    NamedGenerator {
        name: name.to_string(),
        generator: Arc::new(LlmGenerator::new(Arc::new(client))),
    }
}

fn pipeline(db: MockDatabaseClient, llm: MockLlmClient) -> RewritePipeline {
    RewritePipeline::new(
        InstructionSelector::new(InstructionCatalog::default()),
        executor(db),
        backend("mock", llm),
    )
}

#[tokio::test]
async fn test_identity_rewrite_selects_first_instruction() {
    let result = pipeline(users(), MockLlmClient::new())
        .rewrite(ORIGINAL)
        .await
        .unwrap();

    assert_eq!(result.candidates.len(), 8);
    assert!(result.candidates.iter().all(|c| c.score() == 3));
    assert_eq!(
        Some(&result.instruction),
        InstructionCatalog::default().first()
    );
    assert_eq!(result.rewritten_sql, ORIGINAL);
    assert_eq!(result.backend, "mock");
    assert!(result.comparison.valid);
    assert_eq!(result.comparison.reason, VerdictReason::ResultsMatch);
}

#[tokio::test]
async fn test_reordered_columns_compare_equal() {
    let db = users().with_rows(
        "SELECT name AS Name, id FROM users",
        &["Name", "id"],
        vec![
            vec![Value::Text("ada".to_string()), Value::Int(1)],
            vec![Value::Text("grace".to_string()), Value::Int(2)],
        ],
    );
    let llm = MockLlmClient::new().with_response(
        "from users",
        "Rewritten SQL:\n```sql\nSELECT name AS Name, id FROM users\n```",
    );

    let result = pipeline(db, llm).rewrite(ORIGINAL).await.unwrap();

    assert_eq!(result.rewritten_sql, "SELECT name AS Name, id FROM users");
    assert!(result.comparison.valid);
    assert_eq!(result.rewritten_result.columns, vec!["Name", "id"]);
}

#[tokio::test]
async fn test_result_changing_rewrite_is_invalid() {
    let db = users().with_rows(
        "SELECT id, name FROM users LIMIT 1",
        &["id", "name"],
        vec![vec![Value::Int(1), Value::Text("ada".to_string())]],
    );
    let llm = MockLlmClient::new()
        .with_response("from users", "SELECT id, name FROM users LIMIT 1");

    let result = pipeline(db, llm).rewrite(ORIGINAL).await.unwrap();

    assert!(result.candidates.iter().all(|c| c.score() == 1));
    assert!(!result.comparison.valid);
    assert_eq!(result.comparison.reason, VerdictReason::RowCountMismatch);
}

#[tokio::test]
async fn test_rewrite_that_fails_to_execute() {
    let db = users().with_error(
        "SELECT id, nmae FROM users",
        "column \"nmae\" does not exist",
    );
    let llm = MockLlmClient::new().with_response("from users", "SELECT id, nmae FROM users");

    let result = pipeline(db, llm).rewrite(ORIGINAL).await.unwrap();

    assert!(result.candidates.iter().all(|c| c.score() == 0));
    assert!(!result.rewritten_result.success);
    assert!(matches!(
        result.comparison.reason,
        VerdictReason::RewriteFailed(ref message) if message.contains("nmae")
    ));
}

#[tokio::test]
async fn test_original_failure_is_reported_not_raised() {
    let db = MockDatabaseClient::new().with_error(ORIGINAL, "relation \"users\" does not exist");

    let result = pipeline(db, MockLlmClient::new())
        .rewrite(ORIGINAL)
        .await
        .unwrap();

    assert!(!result.original.success);
    assert!(!result.comparison.valid);
    assert_eq!(result.comparison.reason, VerdictReason::OriginalFailed);
}

#[tokio::test]
async fn test_unreachable_database_is_an_error() {
    let err = pipeline(MockDatabaseClient::unreachable(), MockLlmClient::new())
        .rewrite(ORIGINAL)
        .await
        .unwrap_err();

    assert!(matches!(err, SqlGuardError::Connection(_)));
}

#[tokio::test]
async fn test_fallback_backend_replaces_failing_primary() {
    let primary = MockLlmClient::failing("quota exceeded");
    let fallback = MockLlmClient::new();

    let result = pipeline(users(), primary.clone())
        .with_fallback(backend("ollama/sqlcoder:15b", fallback.clone()))
        .rewrite(ORIGINAL)
        .await
        .unwrap();

    assert_eq!(result.backend, "ollama/sqlcoder:15b");
    assert!(result.comparison.valid);
    assert_eq!(primary.calls(), 8);
    assert_eq!(fallback.calls(), 8);
}

#[tokio::test]
async fn test_fallback_unused_when_primary_succeeds() {
    let fallback = MockLlmClient::new();

    let result = pipeline(users(), MockLlmClient::new())
        .with_fallback(backend("anthropic", fallback.clone()))
        .rewrite(ORIGINAL)
        .await
        .unwrap();

    assert_eq!(result.backend, "mock");
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_guarded_executor_blocks_mutating_rewrites() {
    let db = users();
    let llm = MockLlmClient::new().with_response("from users", "DELETE FROM users");
    let guarded: Arc<dyn SqlExecutor> = Arc::new(GuardedExecutor::new(executor(db)));

    let result = RewritePipeline::new(
        InstructionSelector::new(InstructionCatalog::strict()),
        guarded,
        backend("mock", llm),
    )
    .rewrite(ORIGINAL)
    .await
    .unwrap();

    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.candidates[0].score(), 0);
    assert!(result
        .rewritten_result
        .error_message()
        .contains("rejected by safety filter"));
}

#[tokio::test]
async fn test_search_reports_every_instruction() {
    let selection = pipeline(users(), MockLlmClient::new())
        .search(ORIGINAL)
        .await
        .unwrap();

    let instructions: Vec<_> = selection
        .all()
        .iter()
        .map(|c| c.instruction().clone())
        .collect();
    let catalog: Vec<_> = InstructionCatalog::default().iter().cloned().collect();
    assert_eq!(instructions, catalog);
    assert_eq!(selection.best().score(), 3);
}
