//! Opening the PostgreSQL connection pool.
//!
//! The pool is handed to [`Datastore::new`](super::Datastore::new); whoever
//! opened it closes it with [`PgPool::close`].

use crate::db::dsn::PostgresDsn;
use crate::error::{Error, ErrorKind, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Opening the pool failed.
pub const CODE_DB_OPEN: &str = "db_open_err";
/// The pool opened but the database did not answer a ping.
pub const CODE_DB_PING: &str = "db_ping_err";

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)),
        }
    }
}

impl PoolSettings {
    /// Reject sizes the pool cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::validation(
                "max_connections",
                "max_connections must be greater than 0",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::validation(
                "min_connections",
                format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
            ));
        }
        Ok(())
    }
}

/// Open a PostgreSQL pool and make sure the database answers.
pub async fn connect_postgres(dsn: &PostgresDsn, settings: &PoolSettings) -> Result<PgPool> {
    settings.validate()?;

    info!(
        host = %dsn.host,
        port = dsn.port,
        db_name = %dsn.db_name,
        user = %dsn.user,
        max_connections = settings.max_connections,
        "Opening database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect_with(dsn.connect_options())
        .await
        .map_err(|e| {
            warn!(code = CODE_DB_OPEN, error = %e, "Failed to open database");
            Error::new(ErrorKind::Database, "failed to open database")
                .with_code(CODE_DB_OPEN)
                .with_cause(e)
        })?;

    if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
        warn!(code = CODE_DB_PING, error = %e, "Database did not answer ping");
        pool.close().await;
        return Err(Error::new(ErrorKind::Database, "failed to ping database")
            .with_code(CODE_DB_PING)
            .with_cause(e));
    }

    match sqlx::query_scalar::<_, String>("SELECT version()")
        .fetch_one(&pool)
        .await
    {
        Ok(version) => debug!(version = %version, "Got server version"),
        Err(e) => warn!(error = %e, "Failed to get server version"),
    }

    info!(db_name = %dsn.db_name, "Database opened");
    Ok(pool)
}
