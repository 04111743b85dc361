//! Configuration handling.
//!
//! Values come from CLI arguments with environment variable fallbacks.

use crate::db::{PoolSettings, PostgresDsn};
use crate::error::{Error, Result};
use clap::Parser;
use std::time::Duration;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Parser)]
#[command(name = "api-basic", version, about = "API service backend")]
pub struct Config {
    /// Database host
    #[arg(long, env = "DB_HOST", default_value = DEFAULT_DB_HOST)]
    pub db_host: String,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = DEFAULT_DB_PORT)]
    pub db_port: u16,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: String,

    /// Database password (sensitive - not logged)
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    /// Maximum pooled connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "DB_CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub db_connect_timeout: u64,

    /// HTTP bind host
    #[arg(long, env = "HTTP_HOST", default_value = DEFAULT_HTTP_HOST)]
    pub http_host: String,

    /// HTTP bind port
    #[arg(long, env = "HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
}

impl Config {
    /// Check values clap cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.db_name.trim().is_empty() {
            return Err(Error::validation("db_name", "database name must not be empty"));
        }
        if self.db_user.trim().is_empty() {
            return Err(Error::validation("db_user", "database user must not be empty"));
        }
        if self.db_max_connections == 0 {
            return Err(Error::validation(
                "db_max_connections",
                "db_max_connections must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn dsn(&self) -> PostgresDsn {
        PostgresDsn::new(
            &self.db_host,
            &self.db_name,
            &self.db_user,
            &self.db_password,
            self.db_port,
        )
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            min_connections: self.db_max_connections.min(crate::db::pool::DEFAULT_MIN_CONNECTIONS),
            acquire_timeout: Duration::from_secs(self.db_connect_timeout),
            ..PoolSettings::default()
        }
    }

    /// Address the HTTP server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
