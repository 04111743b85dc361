//! API service entry point.

use api_basic::config::Config;
use api_basic::db::{PgDatastore, connect_postgres};
use api_basic::server;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    config.validate()?;

    info!(
        addr = %config.bind_addr(),
        "Starting api-basic v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = connect_postgres(&config.dsn(), &config.pool_settings()).await?;
    let datastore = PgDatastore::new(pool.clone());

    let result = server::serve(server::router(datastore), &config.bind_addr()).await;

    info!("Closing database connections");
    pool.close().await;

    if let Err(e) = result {
        error!(kind = %e.kind(), error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
