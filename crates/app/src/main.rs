mod config;

use config::Config;
use nearlens_db::Database;
use nearlens_indexer::{start_indexing, CausalityCache};
use tokio::{signal, sync::watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Anything that escapes the driver is unrecoverable: log it and exit
    // non-zero so the supervisor restarts into a checkpoint-rolled-back run.
    if let Err(err) = run().await {
        error!(error = ?err, "indexer aborted");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;
    let cache = CausalityCache::new(config.cache_ttl, config.cache_capacity);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested, finishing the current block");
        let _ = stop_tx.send(true);
    });

    start_indexing(config.backend, db, cache, config.driver, stop_rx).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
