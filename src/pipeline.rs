//! The fixed six-step chain and its runner.
//!
//! scrape-oil → transform-oil → load-oil → scrape-stock → transform-stock →
//! load-stock, each step reporting a [`StepOutcome`] instead of raising. A
//! failed step is retried once after a fixed delay; the chain then moves on
//! regardless, so a dead scrape shows up downstream as an empty batch, never
//! as a crashed run.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::EtlConfig;
use crate::error::StepOutcome;
use crate::handoff::{self, HandoffPaths};
use crate::load::{self, BatchSink, PgSink, OIL_TABLE, STOCK_TABLE};
use crate::models;
use crate::scrape::build_client;
use crate::scrape::oil::OilScraper;
use crate::scrape::stock::StockScraper;
use crate::transform;

/// Execute one full pipeline run. Never panics and never returns an error;
/// everything that can go wrong is logged per step.
pub async fn run_once(config: &EtlConfig, pool: &PgPool) {
    let run_id = Utc::now().format("%Y%m%d%H%M%S").to_string();
    info!("starting pipeline run {run_id}");

    if let Err(e) = std::fs::create_dir_all(&config.handoff_dir) {
        error!(
            "cannot create hand-off dir {}: {e}",
            config.handoff_dir.display()
        );
        return;
    }
    let client = match build_client() {
        Ok(client) => client,
        Err(e) => {
            error!("cannot build http client: {e}");
            return;
        }
    };

    let paths = HandoffPaths::new(config.handoff_dir.clone(), run_id.clone());
    let oil_scraper = OilScraper::new(client.clone(), config.oil_source_url.clone());
    let stock_scraper = StockScraper::new(
        client,
        config.stock_quote_base_url.clone(),
        config.tickers.clone(),
    );
    let sink = PgSink::new(pool.clone(), config.insert_chunk_size);
    let delay = config.retry_delay;

    let outcomes = [
        with_retry("scrape_oil", delay, || scrape_oil(&oil_scraper, &paths)).await,
        with_retry("transform_oil", delay, || transform_oil(&paths)).await,
        with_retry("load_oil", delay, || load_oil(&sink, &paths)).await,
        with_retry("scrape_stock", delay, || scrape_stock(&stock_scraper, &paths)).await,
        with_retry("transform_stock", delay, || transform_stock(&paths)).await,
        with_retry("load_stock", delay, || load_stock(&sink, &paths)).await,
    ];

    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, StepOutcome::SkippedEmpty))
        .count();
    let completed = outcomes.len() - failed - skipped;
    info!("pipeline run {run_id} finished: {completed} completed, {skipped} skipped, {failed} failed");

    paths.cleanup();
}

/// Run a step, and on failure run it exactly once more after `retry_delay`.
pub async fn with_retry<F, Fut>(name: &str, retry_delay: Duration, mut step: F) -> StepOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StepOutcome>,
{
    match step().await {
        StepOutcome::Failed(e) => {
            warn!(
                "step {name} failed: {e}; retrying in {}s",
                retry_delay.as_secs()
            );
            sleep(retry_delay).await;
            let outcome = step().await;
            if let StepOutcome::Failed(e) = &outcome {
                error!("step {name} failed after retry: {e}");
            }
            outcome
        }
        outcome => outcome,
    }
}

async fn scrape_oil(scraper: &OilScraper, paths: &HandoffPaths) -> StepOutcome {
    match scraper.fetch_batch().await {
        Ok(quotes) => {
            let mut frame = match models::oil_frame(&quotes) {
                Ok(frame) => frame,
                Err(e) => return StepOutcome::Failed(e.into()),
            };
            if let Err(e) = handoff::write_batch(&paths.raw_oil(), &mut frame) {
                return StepOutcome::Failed(e);
            }
            StepOutcome::Completed {
                rows: frame.height(),
            }
        }
        Err(e) => StepOutcome::Failed(e),
    }
}

async fn scrape_stock(scraper: &StockScraper, paths: &HandoffPaths) -> StepOutcome {
    match scraper.fetch_batch().await {
        Ok(quotes) => {
            let mut frame = match models::stock_frame(&quotes) {
                Ok(frame) => frame,
                Err(e) => return StepOutcome::Failed(e.into()),
            };
            if let Err(e) = handoff::write_batch(&paths.raw_stock(), &mut frame) {
                return StepOutcome::Failed(e);
            }
            StepOutcome::Completed {
                rows: frame.height(),
            }
        }
        Err(e) => StepOutcome::Failed(e),
    }
}

async fn transform_oil(paths: &HandoffPaths) -> StepOutcome {
    let raw = match handoff::read_batch(&paths.raw_oil(), handoff::raw_oil_schema()) {
        Ok(frame) => frame,
        Err(e) => return StepOutcome::Failed(e),
    };
    if raw.height() == 0 {
        info!("oil batch is empty; nothing to transform");
        return StepOutcome::SkippedEmpty;
    }
    match transform::oil::transform(raw) {
        Ok(mut out) => match handoff::write_batch(&paths.transformed_oil(), &mut out) {
            Ok(()) => StepOutcome::Completed { rows: out.height() },
            Err(e) => StepOutcome::Failed(e),
        },
        Err(e) => StepOutcome::Failed(e.into()),
    }
}

async fn transform_stock(paths: &HandoffPaths) -> StepOutcome {
    let raw = match handoff::read_batch(&paths.raw_stock(), handoff::raw_stock_schema()) {
        Ok(frame) => frame,
        Err(e) => return StepOutcome::Failed(e),
    };
    if raw.height() == 0 {
        info!("stock batch is empty; nothing to transform");
        return StepOutcome::SkippedEmpty;
    }
    match transform::stock::transform(raw) {
        Ok(mut out) => match handoff::write_batch(&paths.transformed_stock(), &mut out) {
            Ok(()) => StepOutcome::Completed { rows: out.height() },
            Err(e) => StepOutcome::Failed(e),
        },
        Err(e) => StepOutcome::Failed(e.into()),
    }
}

async fn load_oil(sink: &dyn BatchSink, paths: &HandoffPaths) -> StepOutcome {
    match handoff::read_batch(&paths.transformed_oil(), handoff::transformed_oil_schema()) {
        Ok(frame) => load::load_step(sink, OIL_TABLE, &frame).await,
        Err(e) => StepOutcome::Failed(e),
    }
}

async fn load_stock(sink: &dyn BatchSink, paths: &HandoffPaths) -> StepOutcome {
    match handoff::read_batch(&paths.transformed_stock(), handoff::transformed_stock_schema()) {
        Ok(frame) => load::load_step(sink, STOCK_TABLE, &frame).await,
        Err(e) => StepOutcome::Failed(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::StepError;
    use crate::load::MockBatchSink;
    use crate::models::OilQuote;

    fn scratch_paths(test: &str) -> HandoffPaths {
        HandoffPaths::new(
            std::env::temp_dir(),
            format!("test_{}_{}", std::process::id(), test),
        )
    }

    fn flaky_error() -> StepError {
        StepError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY)
    }

    #[tokio::test]
    async fn retry_runs_a_failed_step_exactly_once_more() {
        let calls = AtomicUsize::new(0);
        let outcome = with_retry("flaky", Duration::ZERO, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    StepOutcome::Failed(flaky_error())
                } else {
                    StepOutcome::Completed { rows: 1 }
                }
            }
        })
        .await;

        assert!(matches!(outcome, StepOutcome::Completed { rows: 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_the_second_failure() {
        let calls = AtomicUsize::new(0);
        let outcome = with_retry("dead", Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { StepOutcome::Failed(flaky_error()) }
        })
        .await;

        assert!(outcome.is_failed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn healthy_step_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let outcome = with_retry("fine", Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { StepOutcome::SkippedEmpty }
        })
        .await;

        assert!(matches!(outcome, StepOutcome::SkippedEmpty));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transform_skips_when_the_scrape_never_wrote() {
        let paths = scratch_paths("transform_missing_handoff");
        let outcome = transform_oil(&paths).await;
        assert!(matches!(outcome, StepOutcome::SkippedEmpty));
    }

    #[tokio::test]
    async fn oil_chain_flows_from_raw_handoff_to_sink() {
        let paths = scratch_paths("oil_chain");
        let quotes = vec![
            OilQuote {
                grade: "Crude Oil Brent".into(),
                price: 80.0,
                captured_at: "2024-11-20 10:00:00".into(),
            },
            OilQuote {
                grade: "Crude Oil Brent".into(),
                price: 82.0,
                captured_at: "2024-11-20 10:30:00".into(),
            },
        ];
        let mut raw = models::oil_frame(&quotes).unwrap();
        handoff::write_batch(&paths.raw_oil(), &mut raw).unwrap();

        let transformed = transform_oil(&paths).await;
        assert!(matches!(transformed, StepOutcome::Completed { rows: 2 }));

        let mut sink = MockBatchSink::new();
        sink.expect_append()
            .withf(|table, frame| {
                table == OIL_TABLE
                    && frame.height() == 2
                    && frame.column("price_change").is_ok()
                    && frame.column("normalized_price").is_ok()
            })
            .times(1)
            .returning(|_, frame| Ok(frame.height() as u64));

        let loaded = load_oil(&sink, &paths).await;
        assert!(matches!(loaded, StepOutcome::Completed { rows: 2 }));

        paths.cleanup();
    }
}
