mod bootstrap;
mod bot;
mod health;

use std::time::Duration;

use anyhow::Result;
use threadmind_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bootstrap::Application;
use crate::health::HealthState;

fn init_logging(config: &AppConfig) {
    use threadmind_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let Application { config, db_pool, queue, worker, socket } =
        bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &config.server.bind_address,
        config.server.health_check_port,
        HealthState { db_pool: db_pool.clone(), queue: queue.clone() },
    )
    .await?;

    let worker = worker.spawn();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut socket = tokio::spawn(async move { socket.start(shutdown_rx).await });
    info!(assistant = config.slack.assistant, "threadmind-server started");

    tokio::select! {
        _ = wait_for_shutdown() => {}
        result = &mut socket => {
            warn!(result = ?result, "socket mode runner stopped on its own");
        }
    }

    // close the socket first so no new events arrive while draining
    let _ = shutdown_tx.send(true);
    if !socket.is_finished() {
        if let Err(error) = socket.await {
            warn!(error = %error, "socket mode runner task failed");
        }
    }

    queue.close();
    let grace = Duration::from_secs(config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, queue.join()).await {
        Ok(()) => {
            info!("all queued events processed");
            if let Err(error) = worker.await {
                warn!(error = %error, "event worker task failed");
            }
        }
        Err(_) => {
            warn!(pending = queue.pending(), "graceful shutdown timed out; abandoning queued events");
            worker.abort();
        }
    }

    if let Some(pool) = db_pool {
        pool.close().await;
    }
    info!("threadmind-server stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(error = %error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
