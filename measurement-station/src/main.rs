use std::sync::Arc;

use measurement_station::api::{ApiServer, ApiServerConfig};
use measurement_station::database;
use measurement_station::logging::{
    DEFAULT_LOG_RETENTION_DAYS, init_logging, parse_retention_days,
};
use measurement_station::services::{ServiceContainer, ServiceContainerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let retention = std::env::var("LOG_RETENTION_DAYS")
        .ok()
        .map(|raw| parse_retention_days(&raw));
    let retention_days = match &retention {
        Some(Ok(days)) => *days,
        _ => DEFAULT_LOG_RETENTION_DAYS,
    };
    let (logging_config, _log_guard) = init_logging(&log_dir, retention_days)?;
    if let Some(Err(reason)) = retention {
        tracing::warn!(
            default = DEFAULT_LOG_RETENTION_DAYS,
            "{}, using default",
            reason
        );
    }

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:measurement-station.db?mode=rwc".to_string());

    let pool = database::init_pool(&database_url).await?;

    // Run migrations
    database::run_migrations(&pool).await?;

    let container = Arc::new(ServiceContainer::with_config(
        pool,
        ServiceContainerConfig::from_env_or_default(),
    ));
    container.start().await?;

    let cancel_token = container.cancellation_token();
    logging_config.start_retention_cleanup(cancel_token.clone());

    let server = ApiServer::with_state(
        ApiServerConfig::from_env_or_default(),
        container.app_state(Some(logging_config)),
    )
    .with_cancel_token(cancel_token.clone());

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    tracing::info!("measurement-station initialized successfully");

    let served = server.run().await;

    container.shutdown().await?;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            tracing::warn!(error = %e, "Failed to listen for ctrl_c");
        }
    }
}
