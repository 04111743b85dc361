//! PostgreSQL connection parameters.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;

/// Connection parameters for a PostgreSQL database.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresDsn {
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub user: String,
    pub password: String,
}

impl PostgresDsn {
    pub fn new(
        host: impl Into<String>,
        db_name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            db_name: db_name.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    /// Driver connection options. SSL is disabled, matching the key/value form.
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.db_name)
            .username(&self.user)
            .ssl_mode(PgSslMode::Disable);
        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// libpq key/value form. The password pair is omitted when empty.
impl fmt::Display for PostgresDsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host={} port={} dbname={} user={} ",
            self.host, self.port, self.db_name, self.user
        )?;
        if !self.password.is_empty() {
            write!(f, "password={} ", self.password)?;
        }
        write!(f, "sslmode=disable")
    }
}

impl fmt::Debug for PostgresDsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDsn")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let got = PostgresDsn::new("localhost", "go_api_basic", "postgres", "", 5432);
        let want = PostgresDsn {
            host: "localhost".to_string(),
            port: 5432,
            db_name: "go_api_basic".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
        };
        assert_eq!(got, want);
    }

    #[test]
    fn test_display_with_password() {
        let dsn = PostgresDsn::new("localhost", "go_api_basic", "postgres", "supahsecret", 8080);
        assert_eq!(
            dsn.to_string(),
            "host=localhost port=8080 dbname=go_api_basic user=postgres password=supahsecret sslmode=disable"
        );
    }

    #[test]
    fn test_display_without_password() {
        let dsn = PostgresDsn::new("localhost", "go_api_basic", "postgres", "", 8080);
        assert_eq!(
            dsn.to_string(),
            "host=localhost port=8080 dbname=go_api_basic user=postgres sslmode=disable"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let dsn = PostgresDsn::new("localhost", "db", "u", "supahsecret", 5432);
        let debug = format!("{:?}", dsn);
        assert!(!debug.contains("supahsecret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_connect_options() {
        let dsn = PostgresDsn::new("db.internal", "movies", "app", "pw", 6543);
        let options = dsn.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("movies"));
        assert_eq!(options.get_username(), "app");
    }
}
