//! Transaction lifecycle over a shared connection pool.
//!
//! A [`Datastore`] issues independent [`Tx`] handles; it keeps no transaction
//! state of its own. Each handle moves `Open -> Committed | RolledBack` exactly
//! once. Resolving a handle twice, or passing no handle at all, yields an
//! `Internal` [`Error`] with a stable code instead of a raw driver error.
//!
//! Dropping a handle that is still open rolls it back, so early returns never
//! leak a pooled connection.

use crate::error::{Error, Result};
use futures_util::future::BoxFuture;
use sqlx::{Database, Pool, Postgres, Transaction};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

/// `begin_tx` could not start a transaction.
pub const CODE_BEGIN_TX: &str = "begin_tx_err";
/// `commit_tx` failed or the handle was already resolved.
pub const CODE_COMMIT: &str = "commit_err";
/// No transaction handle was supplied.
pub const CODE_NIL_TX: &str = "nil_tx";
/// `rollback_tx` failed or the handle was already resolved.
pub const CODE_ROLLBACK: &str = "rollback_err";
/// A query was attempted on a resolved handle.
pub const CODE_TX_CLOSED: &str = "tx_closed";

/// Datastore over PostgreSQL, the production backend.
pub type PgDatastore = Datastore<Postgres>;

/// Lifecycle state of a [`Tx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Why a handle could not be resolved again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TxStateError {
    #[error("transaction has already been committed")]
    AlreadyCommitted,

    #[error("transaction has already been rolled back")]
    AlreadyRolledBack,
}

/// What went wrong when rolling back.
#[derive(Debug, thiserror::Error)]
pub enum RollbackFailure {
    #[error(transparent)]
    Driver(#[from] sqlx::Error),

    #[error(transparent)]
    State(#[from] TxStateError),
}

/// A failed rollback together with the error that triggered it.
///
/// Sits between a `rollback_err` error and the caller's error in the chain,
/// so both stay reachable with `downcast_ref`.
#[derive(Debug, thiserror::Error)]
#[error("{failure}: {cause}")]
pub struct RollbackError {
    pub failure: RollbackFailure,
    #[source]
    pub cause: Error,
}

/// A transaction handle.
///
/// Not shareable between flows of control: it is resolved by the operation
/// that began it.
pub struct Tx<DB: Database> {
    inner: Option<Transaction<'static, DB>>,
    state: TxState,
}

impl<DB: Database> Tx<DB> {
    fn new(inner: Transaction<'static, DB>) -> Self {
        Self {
            inner: Some(inner),
            state: TxState::Open,
        }
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    /// Connection to run queries on while the transaction is open.
    ///
    /// ```ignore
    /// sqlx::query("UPDATE movie SET title = $1").bind(title).execute(tx.conn()?).await?;
    /// ```
    pub fn conn(&mut self) -> Result<&mut DB::Connection> {
        let resolved = self.resolved_error();
        match self.inner.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(
                Error::internal(CODE_TX_CLOSED, "transaction is no longer open").with_cause(resolved),
            ),
        }
    }

    fn resolved_error(&self) -> TxStateError {
        match self.state {
            TxState::Committed => TxStateError::AlreadyCommitted,
            TxState::Open | TxState::RolledBack => TxStateError::AlreadyRolledBack,
        }
    }

    fn take(&mut self) -> std::result::Result<Transaction<'static, DB>, TxStateError> {
        let resolved = self.resolved_error();
        self.inner.take().ok_or(resolved)
    }
}

impl<DB: Database> fmt::Debug for Tx<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx").field("state", &self.state).finish()
    }
}

/// Owns a handle to the connection pool and mediates every transaction on it.
///
/// The pool belongs to the caller; the datastore never closes it.
pub struct Datastore<DB: Database> {
    pool: Pool<DB>,
}

impl<DB: Database> Datastore<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool }
    }

    /// The underlying pool, for queries that need no transaction.
    pub fn db(&self) -> &Pool<DB> {
        &self.pool
    }

    /// Start a transaction.
    ///
    /// Fails with `begin_tx_err` when the pool is closed or the driver cannot
    /// start one. Dropping the returned future abandons the attempt.
    pub async fn begin_tx(&self) -> Result<Tx<DB>> {
        match self.pool.begin().await {
            Ok(tx) => {
                debug!("Transaction started");
                Ok(Tx::new(tx))
            }
            Err(e) => {
                warn!(code = CODE_BEGIN_TX, error = %e, "Failed to begin transaction");
                Err(Error::internal(CODE_BEGIN_TX, "failed to begin transaction").with_cause(e))
            }
        }
    }

    /// Start a transaction, giving up after `timeout`.
    pub async fn begin_tx_within(&self, timeout: Duration) -> Result<Tx<DB>> {
        match tokio::time::timeout(timeout, self.begin_tx()).await {
            Ok(result) => result,
            Err(elapsed) => {
                warn!(
                    code = CODE_BEGIN_TX,
                    timeout = ?timeout,
                    "Timed out beginning transaction"
                );
                Err(
                    Error::internal(CODE_BEGIN_TX, "timed out beginning transaction")
                        .with_cause(elapsed),
                )
            }
        }
    }

    /// Commit `tx`.
    ///
    /// A missing handle yields `nil_tx`; an already resolved handle or a driver
    /// failure yields `commit_err` with the underlying failure as cause.
    pub async fn commit_tx(&self, tx: Option<&mut Tx<DB>>) -> Result<()> {
        let Some(tx) = tx else {
            error!(code = CODE_NIL_TX, "commit_tx called without a transaction");
            return Err(Error::internal(CODE_NIL_TX, "transaction cannot be nil"));
        };

        let inner = match tx.take() {
            Ok(inner) => inner,
            Err(state_err) => {
                warn!(code = CODE_COMMIT, state = %tx.state, "Commit on resolved transaction");
                return Err(
                    Error::internal(CODE_COMMIT, "failed to commit transaction")
                        .with_cause(state_err),
                );
            }
        };

        match inner.commit().await {
            Ok(()) => {
                tx.state = TxState::Committed;
                debug!("Transaction committed");
                Ok(())
            }
            Err(e) => {
                // The driver discards a transaction whose commit failed.
                tx.state = TxState::RolledBack;
                warn!(code = CODE_COMMIT, error = %e, "Failed to commit transaction");
                Err(Error::internal(CODE_COMMIT, "failed to commit transaction").with_cause(e))
            }
        }
    }

    /// Roll back `tx` because of `cause` and return the error the caller should
    /// propagate.
    ///
    /// On success that is `cause` itself. A missing handle yields `nil_tx`; a
    /// failed rollback yields `rollback_err`. Both keep `cause` in the chain.
    pub async fn rollback_tx(&self, tx: Option<&mut Tx<DB>>, cause: impl Into<Error>) -> Error {
        let cause = cause.into();

        let Some(tx) = tx else {
            error!(code = CODE_NIL_TX, cause = %cause, "rollback_tx called without a transaction");
            return Error::internal(CODE_NIL_TX, "transaction cannot be nil").with_cause(cause);
        };

        let outcome: std::result::Result<(), RollbackFailure> = match tx.take() {
            Ok(inner) => {
                let result = inner.rollback().await;
                tx.state = TxState::RolledBack;
                result.map_err(RollbackFailure::from)
            }
            Err(state_err) => Err(state_err.into()),
        };

        match outcome {
            Ok(()) => {
                debug!(cause = %cause, "Transaction rolled back");
                cause
            }
            Err(failure) => {
                warn!(code = CODE_ROLLBACK, failure = %failure, cause = %cause, "Failed to roll back transaction");
                Error::internal(CODE_ROLLBACK, "failed to roll back transaction")
                    .with_cause(RollbackError { failure, cause })
            }
        }
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// ```ignore
    /// let n = datastore
    ///     .in_tx(|tx| Box::pin(async move {
    ///         let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(tx.conn()?).await?;
    ///         Ok::<_, Error>(row.0)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn in_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Tx<DB>) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        let mut tx = self.begin_tx().await?;
        match f(&mut tx).await {
            Ok(value) => {
                self.commit_tx(Some(&mut tx)).await?;
                Ok(value)
            }
            Err(err) => Err(self.rollback_tx(Some(&mut tx), err).await),
        }
    }
}

impl<DB: Database> Clone for Datastore<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<DB: Database> fmt::Debug for Datastore<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datastore")
            .field("pool_size", &self.pool.size())
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use sqlx::Sqlite;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_datastore() -> Datastore<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE movie (id INTEGER PRIMARY KEY, title TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        Datastore::new(pool)
    }

    async fn movie_count(ds: &Datastore<Sqlite>) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movie")
            .fetch_one(ds.db())
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_begin_and_commit_without_work() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        assert!(tx.is_open());
        ds.commit_tx(Some(&mut tx)).await.unwrap();
        assert_eq!(tx.state(), TxState::Committed);
    }

    #[tokio::test]
    async fn test_begin_on_closed_pool_is_internal() {
        let ds = memory_datastore().await;
        ds.db().close().await;

        let err = ds.begin_tx().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code().unwrap(), CODE_BEGIN_TX);
        assert!(err.cause().is_some());
    }

    #[tokio::test]
    async fn test_begin_within_timeout() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx_within(Duration::from_secs(5)).await.unwrap();
        ds.commit_tx(Some(&mut tx)).await.unwrap();
    }

    #[tokio::test]
    async fn test_begin_within_times_out_when_pool_exhausted() {
        let ds = memory_datastore().await;
        let mut held = ds.begin_tx().await.unwrap();

        let err = ds
            .begin_tx_within(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.code().unwrap(), CODE_BEGIN_TX);

        ds.commit_tx(Some(&mut held)).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_persists_work() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        sqlx::query("INSERT INTO movie (title) VALUES ('Repo Man')")
            .execute(tx.conn().unwrap())
            .await
            .unwrap();
        ds.commit_tx(Some(&mut tx)).await.unwrap();
        assert_eq!(movie_count(&ds).await, 1);
    }

    #[tokio::test]
    async fn test_commit_nil_tx() {
        let ds = memory_datastore().await;
        let err = ds.commit_tx(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code().unwrap(), CODE_NIL_TX);
    }

    #[tokio::test]
    async fn test_commit_already_committed() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        ds.commit_tx(Some(&mut tx)).await.unwrap();

        let err = ds.commit_tx(Some(&mut tx)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code().unwrap(), CODE_COMMIT);
        let cause = err.cause().unwrap().downcast_ref::<TxStateError>();
        assert_eq!(cause, Some(&TxStateError::AlreadyCommitted));
    }

    #[tokio::test]
    async fn test_commit_already_rolled_back() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        let _ = ds.rollback_tx(Some(&mut tx), Error::msg("abandon")).await;
        assert_eq!(tx.state(), TxState::RolledBack);

        let err = ds.commit_tx(Some(&mut tx)).await.unwrap_err();
        assert_eq!(err.code().unwrap(), CODE_COMMIT);
        let cause = err.cause().unwrap().downcast_ref::<TxStateError>();
        assert_eq!(cause, Some(&TxStateError::AlreadyRolledBack));
    }

    #[tokio::test]
    async fn test_rollback_returns_original_cause() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        sqlx::query("INSERT INTO movie (title) VALUES ('Sid and Nancy')")
            .execute(tx.conn().unwrap())
            .await
            .unwrap();

        let original = Error::validation("title", "title already taken");
        let returned = ds.rollback_tx(Some(&mut tx), original.clone()).await;

        assert_eq!(returned, original);
        assert_eq!(returned.kind(), ErrorKind::Validation);
        assert!(returned.chain_contains(&original));
        assert_eq!(movie_count(&ds).await, 0);
    }

    #[tokio::test]
    async fn test_rollback_classifies_driver_cause() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        let returned = ds.rollback_tx(Some(&mut tx), sqlx::Error::RowNotFound).await;
        assert_eq!(returned.kind(), ErrorKind::NotExist);
    }

    #[tokio::test]
    async fn test_rollback_nil_tx() {
        let ds = memory_datastore().await;
        let original = Error::msg("some error");
        let err = ds.rollback_tx(None, original.clone()).await;
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code().unwrap(), CODE_NIL_TX);
        assert!(err.chain_contains(&original));
    }

    #[tokio::test]
    async fn test_rollback_already_committed() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        ds.commit_tx(Some(&mut tx)).await.unwrap();

        let original = Error::new(ErrorKind::NotExist, "movie not found");
        let err = ds.rollback_tx(Some(&mut tx), original.clone()).await;
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code().unwrap(), CODE_ROLLBACK);
        assert!(err.chain_contains(&original));
        assert!(err.to_string().contains("already been committed"));

        let rollback = err
            .chain()
            .find_map(|e| e.downcast_ref::<RollbackError>())
            .unwrap();
        assert!(matches!(
            rollback.failure,
            RollbackFailure::State(TxStateError::AlreadyCommitted)
        ));
        assert_eq!(rollback.cause, original);
    }

    #[tokio::test]
    async fn test_conn_on_resolved_tx() {
        let ds = memory_datastore().await;
        let mut tx = ds.begin_tx().await.unwrap();
        ds.commit_tx(Some(&mut tx)).await.unwrap();

        let err = tx.conn().unwrap_err();
        assert_eq!(err.code().unwrap(), CODE_TX_CLOSED);
    }

    #[tokio::test]
    async fn test_dropped_tx_rolls_back() {
        let ds = memory_datastore().await;
        {
            let mut tx = ds.begin_tx().await.unwrap();
            sqlx::query("INSERT INTO movie (title) VALUES ('Walker')")
                .execute(tx.conn().unwrap())
                .await
                .unwrap();
        }
        assert_eq!(movie_count(&ds).await, 0);
    }

    #[tokio::test]
    async fn test_in_tx_commits_on_ok() {
        let ds = memory_datastore().await;
        let id = ds
            .in_tx(|tx| {
                Box::pin(async move {
                    let result = sqlx::query("INSERT INTO movie (title) VALUES ('Straight to Hell')")
                        .execute(tx.conn()?)
                        .await?;
                    Ok::<_, Error>(result.last_insert_rowid())
                })
            })
            .await
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(movie_count(&ds).await, 1);
    }

    #[tokio::test]
    async fn test_in_tx_rolls_back_on_err() {
        let ds = memory_datastore().await;
        let err = ds
            .in_tx(|tx| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO movie (title) VALUES ('Highway Patrolman')")
                        .execute(tx.conn()?)
                        .await?;
                    Err::<(), _>(Error::new(ErrorKind::Permission, "read-only user"))
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(movie_count(&ds).await, 0);
    }

    #[tokio::test]
    async fn test_in_tx_surfaces_constraint_violation() {
        let ds = memory_datastore().await;
        let err = ds
            .in_tx(|tx| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO movie (title) VALUES (NULL)")
                        .execute(tx.conn()?)
                        .await?;
                    Ok::<_, Error>(())
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code().unwrap(), "not_null_violation");
    }

    #[tokio::test]
    async fn test_clone_shares_pool() {
        let ds = memory_datastore().await;
        let other = ds.clone();
        sqlx::query("INSERT INTO movie (title) VALUES ('Revengers Tragedy')")
            .execute(other.db())
            .await
            .unwrap();
        assert_eq!(movie_count(&ds).await, 1);
    }
}
