use std::sync::Arc;

use dotenvy::dotenv;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use oil_stock_etl::config::EtlConfig;
use oil_stock_etl::{db, logger, pipeline};

/// Every 30 minutes; missed runs are not backfilled.
const PIPELINE_SCHEDULE: &str = "0 */30 * * * *";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup();
    dotenv().ok();
    info!("System starting up...");

    let config = Arc::new(EtlConfig::from_env()?);
    let pool = db::init_pool(&config.db).await?;

    let mut scheduler = JobScheduler::new().await?;
    let job_config = config.clone();
    let job_pool = pool.clone();
    let job = Job::new_async(PIPELINE_SCHEDULE, move |_id, _scheduler| {
        let config = job_config.clone();
        let pool = job_pool.clone();
        Box::pin(async move {
            pipeline::run_once(&config, &pool).await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(
        "pipeline scheduled every 30 minutes for {} tickers",
        config.tickers.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.shutdown().await?;
    Ok(())
}
