mod bootstrap;
mod health;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use slotbook_core::config::{AppConfig, LoadOptions};
use slotbook_core::DialogueEngine;
use tracing_subscriber::EnvFilter;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn init_logging(config: &AppConfig) {
    use slotbook_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
        app.engine.clone(),
    )
    .await?;
    spawn_session_sweeper(app.engine.clone());

    tracing::info!(event_name = "system.server.started", "slotbook-server started");
    tokio::select! {
        result = app.runner.start() => {
            result?;
            tracing::warn!(
                event_name = "system.server.polling_stopped",
                "update polling stopped; health endpoint stays up until shutdown"
            );
            wait_for_shutdown().await?;
        }
        signal = wait_for_shutdown() => signal?,
    }
    tracing::info!(event_name = "system.server.stopping", "slotbook-server stopping");

    app.db_pool.close().await;
    Ok(())
}

fn spawn_session_sweeper(engine: Arc<DialogueEngine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let evicted = engine.sweep_sessions();
            if evicted > 0 {
                tracing::debug!(event_name = "session.swept", evicted, "idle sessions evicted");
            }
        }
    });
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
