//! HTTP glue around the datastore.
//!
//! Routes:
//! - `GET /api/v1/ping` - checks the database inside a transaction

pub mod decode;

pub use decode::decode_json;

use crate::db::Datastore;
use crate::error::{Error, ErrorKind, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, Database};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Graceful shutdown budget once a signal arrives.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AppState<DB: Database> {
    pub datastore: Datastore<DB>,
}

impl<DB: Database> Clone for AppState<DB> {
    fn clone(&self) -> Self {
        Self {
            datastore: self.datastore.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub db_up: bool,
}

/// Build the application router.
pub fn router<DB: Database>(datastore: Datastore<DB>) -> Router {
    Router::new()
        .route("/api/v1/ping", get(ping::<DB>))
        .with_state(AppState { datastore })
}

async fn ping<DB: Database>(State(state): State<AppState<DB>>) -> Json<PingResponse> {
    let result = state
        .datastore
        .in_tx(|tx| {
            Box::pin(async move {
                tx.conn()?.ping().await?;
                Ok::<_, Error>(())
            })
        })
        .await;

    if let Err(e) = &result {
        error!(kind = %e.kind(), error = %e, "Database ping failed");
    }

    Json(PingResponse {
        db_up: result.is_ok(),
    })
}

/// Serve `app` on `bind_addr` until SIGINT or SIGTERM.
pub async fn serve(app: Router, bind_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
        Error::new(ErrorKind::Io, format!("failed to bind to {}", bind_addr)).with_cause(e)
    })?;

    info!(addr = %bind_addr, "HTTP server listening");

    let shutdown_notify = std::sync::Arc::new(tokio::sync::Notify::new());
    let shutdown_notify_clone = shutdown_notify.clone();
    let shutdown_signal = async move {
        wait_for_signal().await;
        shutdown_notify_clone.notify_one();
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

    tokio::select! {
        result = server => {
            match result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => {
                    error!(error = %e, "HTTP server error");
                    return Err(Error::new(ErrorKind::Io, "HTTP server error").with_cause(e));
                }
            }
        }
        _ = async {
            shutdown_notify.notified().await;
            info!(
                timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                "Waiting for connections to close (send signal again to force exit)..."
            );
            tokio::select! {
                _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                    warn!("Graceful shutdown timeout, forcing exit");
                }
                _ = wait_for_signal() => {
                    warn!("Received second signal, forcing immediate exit");
                }
            }
        } => {}
    }

    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
