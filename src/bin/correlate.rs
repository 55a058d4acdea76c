use dotenvy::dotenv;
use tracing::info;

use oil_stock_etl::config::AnalysisConfig;
use oil_stock_etl::{analysis, db, logger};

/// Usage: correlate [TICKER] [OIL_TYPE]
/// Positional arguments override ANALYSIS_TICKER / ANALYSIS_OIL_TYPE.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup();
    dotenv().ok();

    let mut config = AnalysisConfig::from_env()?;
    let mut args = std::env::args().skip(1);
    if let Some(ticker) = args.next() {
        config.ticker = ticker;
    }
    if let Some(oil_type) = args.next() {
        config.oil_type = oil_type;
    }

    info!(
        "analyzing correlation between {} and {}",
        config.ticker, config.oil_type
    );
    let pool = db::init_pool(&config.db).await?;
    analysis::run(&pool, &config.ticker, &config.oil_type, &config.plot_dir).await
}
