//! API service backend core.
//!
//! This library provides a transaction-lifecycle wrapper around sqlx
//! connection pools and a structured error model whose kinds map to HTTP
//! status codes at the transport boundary.

pub mod config;
pub mod db;
pub mod error;
pub mod server;

pub use config::Config;
pub use db::{Datastore, PgDatastore, Tx};
pub use error::{Error, ErrorKind, Result};
