//! sqlguard - verified SQL rewrites from the command line.

mod cli;

use cli::{Cli, Command};
use serde::Serialize;
use serde_json::json;
use sqlguard::config::{Config, ConnectionConfig};
use sqlguard::db::{DatabaseClient, MockDatabaseClient, PostgresClient};
use sqlguard::error::{Result, SqlGuardError};
use sqlguard::rewrite::DatabaseExecutor;
use sqlguard::service::RewriteService;
use sqlguard::{logging, safety};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    let log_to_file = cli.log_file;
    if log_to_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        if log_to_file {
            eprintln!("{}: {}", e.category(), e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Check { text, sql } = &cli.command {
        return check(text, *sql);
    }

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    apply_llm_overrides(&cli, &mut config);

    let client = open_database(&cli, &config).await?;
    run_with_client(&cli, &config, client).await
}

/// Runs an engine command and closes the database on every path.
///
/// A command error takes precedence over a close error.
async fn run_with_client(cli: &Cli, config: &Config, client: Arc<dyn DatabaseClient>) -> Result<()> {
    let result = serve(cli, config, Arc::clone(&client)).await;
    let closed = client.close().await;
    result.and(closed)
}

async fn serve(cli: &Cli, config: &Config, client: Arc<dyn DatabaseClient>) -> Result<()> {
    let executor = Arc::new(DatabaseExecutor::new(client));
    let service = RewriteService::from_config(config, executor)?;

    match &cli.command {
        Command::Rewrite { sql } => print_json(&service.rewrite(&cli.subject, sql).await?),
        Command::Search { sql } => print_json(&service.search(&cli.subject, sql).await?),
        Command::Session => session(&service, &cli.subject).await,
        Command::Check { text, sql } => check(text, *sql),
    }
}

fn check(text: &str, sql: bool) -> Result<()> {
    let verdict = if sql {
        safety::check_sql(text)
    } else {
        safety::check_request(text)
    };
    let violation = verdict.err().map(|v| v.to_string());
    print_json(&json!({
        "safe": violation.is_none(),
        "violation": violation,
    }))
}

/// Rewrites one query per stdin line, printing one JSON object per line.
///
/// Rejections and failures are reported inline and do not end the session.
async fn session(service: &RewriteService, subject: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| SqlGuardError::internal(format!("Failed to read stdin: {e}")))?
    {
        let sql = line.trim();
        if sql.is_empty() {
            continue;
        }

        let entry = match service.rewrite(subject, sql).await {
            Ok(result) => json!({ "sql": sql, "result": result }),
            Err(e) => json!({ "sql": sql, "error": error_json(&e) }),
        };
        let line = serde_json::to_string(&entry)
            .map_err(|e| SqlGuardError::internal(format!("Failed to encode output: {e}")))?;
        println!("{line}");
    }

    Ok(())
}

fn error_json(e: &SqlGuardError) -> serde_json::Value {
    let mut value = json!({
        "category": e.category(),
        "message": e.to_string(),
        "retryable": e.is_retryable(),
    });
    if let SqlGuardError::RateLimited { retry_after_secs } = e {
        value["retry_after_secs"] = json!(retry_after_secs);
    }
    value
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)
        .map_err(|e| SqlGuardError::internal(format!("Failed to encode output: {e}")))?;
    println!("{output}");
    Ok(())
}

/// `--llm` replaces the primary provider along with its model.
fn apply_llm_overrides(cli: &Cli, config: &mut Config) {
    if let Some(provider) = &cli.llm {
        config.llm.provider = provider.clone();
        config.llm.model = cli.model.clone();
    } else if let Some(model) = &cli.model {
        config.llm.model = Some(model.clone());
    }
}

async fn open_database(cli: &Cli, config: &Config) -> Result<Arc<dyn DatabaseClient>> {
    if cli.mock_db {
        let client = match &cli.fixtures {
            Some(path) => MockDatabaseClient::from_fixture_file(path)?,
            None => MockDatabaseClient::new(),
        };
        return Ok(Arc::new(client));
    }

    let connection = resolve_connection(cli, config)?.ok_or_else(|| {
        SqlGuardError::config(
            "No database connection configured. Use --url, --host/--database, --connection or --mock-db.",
        )
    })?;
    info!("Connection: {}", connection.display_string());

    let timeout = Duration::from_secs(config.search.query_timeout_secs.max(1));
    let client = PostgresClient::connect(&connection)
        .await?
        .with_query_timeout(timeout);
    Ok(Arc::new(client))
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    let mut connection = cli.to_connection_config()?;

    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(SqlGuardError::config(format!(
                    "Connection '{}' not found in config file",
                    name
                )));
            }
        }
    }

    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    if connection.is_none() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            connection = Some(ConnectionConfig::from_connection_string(&url)?);
        }
    }

    if let Some(ref mut conn) = connection {
        conn.apply_env_defaults();
    }

    Ok(connection)
}
