mod api;
mod bootstrap;
mod health;
mod routes;
mod viewers;

use std::time::Duration;

use anyhow::Result;
use vitrina_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use vitrina_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging comes up before anything that might want to log.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "vitrina-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let server = axum::serve(listener, api::router(app.state.clone()))
        .with_graceful_shutdown(wait_for_shutdown());

    // Open websockets keep the server alive; stop waiting for them after the grace period.
    let served = tokio::spawn(async move { server.await });
    let outcome = tokio::select! {
        joined = served => Some(joined),
        _ = async {
            wait_for_shutdown().await;
            tokio::time::sleep(grace).await;
        } => None,
    };

    tracing::info!(event_name = "system.server.stopping", "vitrina-server stopping");
    app.db_pool.close().await;

    match outcome {
        Some(joined) => joined??,
        None => tracing::warn!(
            event_name = "system.server.forced_shutdown",
            grace_secs = grace.as_secs(),
            "connections still open after grace period"
        ),
    }
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(event_name = "system.server.signal_error", error = %error, "signal handler failed");
        std::future::pending::<()>().await;
    }
}
