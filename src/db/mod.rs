//! Storage layer.
//!
//! This module provides:
//! - The transactional datastore and its transaction handles
//! - Nullable column adapters
//! - PostgreSQL connection parameters and pool opening

pub mod datastore;
pub mod dsn;
pub mod nullable;
pub mod pool;

pub use datastore::{
    Datastore, PgDatastore, RollbackError, RollbackFailure, Tx, TxState, TxStateError,
};
pub use dsn::PostgresDsn;
pub use nullable::{from_nullable, null_i32, null_i64, null_string, to_nullable};
pub use pool::{PoolSettings, connect_postgres};
