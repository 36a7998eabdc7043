use std::sync::Arc;

use adapter::database::{connect_database_with, migrate};
use anyhow::{Context, Result};
use kernel::service::circulation::CirculationService;
use registry::AppRegistry;
use shared::{
    config::AppConfig,
    env::{which, Environment},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    bootstrap().await
}

fn init_logger() -> Result<()> {
    let log_level = match which() {
        Environment::Development => "debug",
        Environment::Production => "info",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());

    let subscriber = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    match which() {
        Environment::Production => tracing_subscriber::registry()
            .with(subscriber.json())
            .with(env_filter)
            .try_init()?,
        Environment::Development => tracing_subscriber::registry()
            .with(subscriber)
            .with(env_filter)
            .try_init()?,
    }
    Ok(())
}

async fn bootstrap() -> Result<()> {
    let app_config = AppConfig::new().context("failed to load configuration")?;
    let pool = connect_database_with(&app_config.database);
    migrate(&pool).await.context("failed to run migrations")?;

    let registry = AppRegistry::new(pool, app_config.circulation.clone());
    let service = registry.circulation_service();

    let Some(period) = app_config.circulation.expiry_sweep_interval else {
        tracing::info!("expiry sweeper disabled; waiting for shutdown");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    };

    tracing::info!(?period, "circulation worker started");
    tokio::select! {
        _ = sweep_forever(service, period) => {}
        res = tokio::signal::ctrl_c() => res.context("failed to listen for shutdown")?,
    }
    tracing::info!("shutting down");
    Ok(())
}

async fn sweep_forever(service: Arc<CirculationService>, period: std::time::Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(e) = service.sweep_expired_reservations().await {
            tracing::error!(error.cause_chain = ?e, error.message = %e, "expiry sweep failed");
        }
    }
}
