//! Gated service integration tests.
//!
//! Covers admission control and the safety filter in front of the pipeline,
//! and building the service from a TOML config file.

use sqlguard::config::Config;
use sqlguard::db::{MockDatabaseClient, Value};
use sqlguard::error::SqlGuardError;
use sqlguard::llm::MockLlmClient;
use sqlguard::rate_limit::{ManualClock, RateLimitSettings, RateLimiter};
use sqlguard::rewrite::{
    DatabaseExecutor, InstructionCatalog, InstructionSelector, LlmGenerator, NamedGenerator,
    RewritePipeline, SqlExecutor,
};
use sqlguard::service::RewriteService;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const QUERY: &str = "SELECT id FROM orders WHERE updated_at > '2024-01-01'";

fn executor() -> Arc<dyn SqlExecutor> {
    let client = MockDatabaseClient::new().with_rows(
        QUERY,
        &["id"],
        vec![vec![Value::Int(7)], vec![Value::Int(9)]],
    );
    Arc::new(DatabaseExecutor::new(Arc::new(client)))
}

fn service_with(limiter: RateLimiter, llm: MockLlmClient) -> RewriteService {
    let pipeline = RewritePipeline::new(
        InstructionSelector::new(InstructionCatalog::strict()),
        executor(),
        NamedGenerator {
            name: "mock".to_string(),
            generator: Arc::new(LlmGenerator::new(Arc::new(llm))),
        },
    );
    RewriteService::new(Arc::new(limiter), pipeline)
}

#[tokio::test]
async fn test_sixth_request_in_window_is_rejected() {
    let service = service_with(
        RateLimiter::new(RateLimitSettings::default()),
        MockLlmClient::new(),
    );

    for _ in 0..5 {
        let result = service.rewrite("user-1", QUERY).await.unwrap();
        assert!(result.comparison.valid);
    }

    match service.rewrite("user-1", QUERY).await {
        Err(SqlGuardError::RateLimited { retry_after_secs }) => {
            assert!((1..=60).contains(&retry_after_secs));
        }
        other => panic!("Expected rate limit rejection, got {:?}", other.map(|r| r.backend)),
    }

    assert!(service.rewrite("user-2", QUERY).await.is_ok());
}

#[tokio::test]
async fn test_window_reset_admits_again() {
    let clock = Arc::new(ManualClock::new());
    let settings = RateLimitSettings {
        max_requests: 1,
        ..RateLimitSettings::default()
    };
    let service = service_with(
        RateLimiter::with_clock(settings, clock.clone()),
        MockLlmClient::new(),
    );

    assert!(service.rewrite("user-1", QUERY).await.is_ok());
    assert!(matches!(
        service.rewrite("user-1", QUERY).await,
        Err(SqlGuardError::RateLimited { .. })
    ));

    clock.advance(Duration::from_secs(60));
    assert!(service.rewrite("user-1", QUERY).await.is_ok());
}

#[tokio::test]
async fn test_unsafe_sql_never_reaches_the_generator() {
    let llm = MockLlmClient::new();
    let service = service_with(RateLimiter::new(RateLimitSettings::default()), llm.clone());

    for sql in [
        "DROP TABLE orders",
        "SELECT 1; DELETE FROM orders",
        "SELECT id FROM orders -- trailing",
        "SELECT id FROM orders WHERE id = 7 -- AND tenant_id = 5\n",
        "SELECT id FROM orders -- WHERE tenant_id = 5\nLIMIT 10",
        "WITH RECURSIVE t(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM t) SELECT n FROM t",
    ] {
        let err = service.rewrite("user-1", sql).await.unwrap_err();
        assert!(matches!(err, SqlGuardError::Unsafe(_)), "{sql}");
    }

    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_word_boundaries_allow_safe_identifiers() {
    let service = service_with(
        RateLimiter::new(RateLimitSettings::default()),
        MockLlmClient::new(),
    );

    // `updated_at` contains "update" but is not the keyword.
    let result = service.search("user-1", QUERY).await.unwrap();
    assert_eq!(result.best().score(), 3);
}

#[tokio::test]
async fn test_service_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[llm]
provider = "mock"

[rate_limit]
window_secs = 30
max_requests = 1

[search]
concurrency = 2
single_instruction = true
fallback_policy = "generation-error"
"#
    )
    .unwrap();

    let config = Config::load_from_file(file.path()).unwrap();
    let service = RewriteService::from_config(&config, executor()).unwrap();

    let result = service.rewrite("user-1", QUERY).await.unwrap();
    assert_eq!(result.candidates.len(), 1);
    assert_eq!(result.backend, "mock");

    match service.rewrite("user-1", QUERY).await {
        Err(SqlGuardError::RateLimited { retry_after_secs }) => {
            assert!((1..=30).contains(&retry_after_secs));
        }
        other => panic!("Expected rate limit rejection, got {:?}", other.map(|r| r.backend)),
    }
}
