use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::{env_bool, env_parse};

/// Pool and session settings for the report store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Applied to every session as `statement_timeout`.
    pub statement_timeout: Duration,
    pub disable_jit: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::clamped(None, None, None, None)
    }
}

impl PoolSettings {
    /// `JOBDOCTOR_DB_*` variables; anything missing or unparsable falls back
    /// to the default.
    pub fn from_env() -> Self {
        Self::clamped(
            env_parse("JOBDOCTOR_DB_MAX_CONNECTIONS"),
            env_parse("JOBDOCTOR_DB_ACQUIRE_TIMEOUT_SECS"),
            env_parse("JOBDOCTOR_DB_STATEMENT_TIMEOUT_SECS"),
            env_bool("JOBDOCTOR_DB_DISABLE_JIT"),
        )
    }

    fn clamped(
        max_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        statement_timeout_secs: Option<u64>,
        disable_jit: Option<bool>,
    ) -> Self {
        Self {
            max_connections: max_connections.unwrap_or(4).clamp(1, 32),
            acquire_timeout: Duration::from_secs(acquire_timeout_secs.unwrap_or(10).clamp(1, 60)),
            statement_timeout: Duration::from_secs(
                statement_timeout_secs.unwrap_or(30).clamp(1, 600),
            ),
            disable_jit: disable_jit.unwrap_or(true),
        }
    }

    /// Statements run on every new connection.
    fn session_statements(&self) -> Vec<String> {
        let mut stmts = vec![
            "SET application_name = 'jobdoctor'".to_string(),
            format!(
                "SET statement_timeout = {}",
                self.statement_timeout.as_millis()
            ),
        ];
        // report queries are tiny; JIT planning only adds latency
        if self.disable_jit {
            stmts.push("SET jit = OFF".to_string());
        }
        stmts
    }
}

pub async fn make_pool(database_url: &str, settings: &PoolSettings) -> anyhow::Result<PgPool> {
    let session = settings.session_statements();

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .after_connect(move |conn, _meta| {
            let session = session.clone();
            Box::pin(async move {
                for stmt in &session {
                    sqlx::query(stmt).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    tracing::debug!(
        max_connections = settings.max_connections,
        acquire_timeout_secs = settings.acquire_timeout.as_secs(),
        statement_timeout_secs = settings.statement_timeout.as_secs(),
        "database pool ready"
    );

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
