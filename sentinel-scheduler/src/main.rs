use anyhow::Context;
use sentinel_core::{
    config::Config,
    db::{create_pool, run_migrations},
    logging,
    repository::PgStore,
};
use sentinel_scheduler::{CheckScheduler, HttpProber};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let config = Config::from_env().context("loading configuration")?;
    info!(
        "Starting Sentinel scheduler with scheduler={:?} probe={:?} stats={:?}",
        config.scheduler, config.probe, config.stats
    );

    let db_pool = create_pool(&config.database)
        .await
        .context("connecting to database")?;
    info!("Database connection established");

    run_migrations(&db_pool).await.context("running migrations")?;
    info!("Database migrations completed");

    let store = Arc::new(PgStore::new(db_pool));
    let prober = Arc::new(HttpProber::new(&config.probe).context("building HTTP client")?);

    let scheduler = Arc::new(CheckScheduler::new(
        store.clone(),
        store,
        prober,
        config.scheduler.clone(),
    ));
    scheduler.start().await?;

    info!("Sentinel scheduler is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received");
    scheduler.stop().await?;

    Ok(())
}
