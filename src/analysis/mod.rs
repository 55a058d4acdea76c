//! Standalone correlation analysis over previously loaded history.
//!
//! The two series are aligned by ordinal position: each side is ranked by
//! its own capture time and joined on row number, not on timestamp equality.
//! Two series scraped at different cadences will drift apart after enough
//! ticks; that alignment is the documented contract, so it is kept as-is.

pub mod plot;
pub mod stats;

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use sqlx::PgPool;
use tracing::{info, warn};

use plot::TrendSeries;

const JOINED_SERIES_QUERY: &str = r#"
WITH stock_filtered AS (
    SELECT stock_change,
           datetime AS stock_datetime,
           ROW_NUMBER() OVER (ORDER BY datetime) AS rn
    FROM company_stocks
    WHERE ticker = $1
),
oil_filtered AS (
    SELECT price_change,
           datetime AS oil_datetime,
           ROW_NUMBER() OVER (ORDER BY datetime) AS rn
    FROM oil_prices
    WHERE type = $2
)
SELECT sf.stock_change,
       sf.stock_datetime,
       ofl.price_change,
       ofl.oil_datetime
FROM stock_filtered sf
JOIN oil_filtered ofl ON sf.rn = ofl.rn
ORDER BY sf.rn
"#;

#[derive(Debug, sqlx::FromRow)]
pub struct JoinedChangeRow {
    pub stock_change: Option<f64>,
    pub stock_datetime: NaiveDateTime,
    pub price_change: Option<f64>,
    pub oil_datetime: NaiveDateTime,
}

pub async fn fetch_joined_series(
    pool: &PgPool,
    ticker: &str,
    oil_type: &str,
) -> Result<Vec<JoinedChangeRow>, sqlx::Error> {
    sqlx::query_as::<_, JoinedChangeRow>(JOINED_SERIES_QUERY)
        .bind(ticker)
        .bind(oil_type)
        .fetch_all(pool)
        .await
}

/// Fetch, correlate, and render. Read-only against the store.
pub async fn run(
    pool: &PgPool,
    ticker: &str,
    oil_type: &str,
    plot_dir: &Path,
) -> anyhow::Result<()> {
    let rows = fetch_joined_series(pool, ticker, oil_type).await?;
    if rows.is_empty() {
        info!("no joined history for {ticker} / {oil_type}; nothing to analyze");
        return Ok(());
    }

    let mut stock = Vec::with_capacity(rows.len());
    let mut oil = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in &rows {
        match (row.stock_change, row.price_change) {
            (Some(s), Some(o)) => {
                stock.push(s);
                oil.push(o);
            }
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!("dropped {dropped} joined rows with missing change values");
    }
    if stock.is_empty() {
        info!("no usable joined rows for {ticker} / {oil_type}");
        return Ok(());
    }
    info!("analyzing {} joined observations", stock.len());

    fs::create_dir_all(plot_dir)?;
    plot::trend_chart(
        &plot_dir.join("original_trend.png"),
        "Original Price Trend: Stock vs Oil",
        "Price Change",
        &[
            TrendSeries {
                label: "Stock Change",
                color: plot::BLUE,
                values: &stock,
            },
            TrendSeries {
                label: "Oil Price Change",
                color: plot::ORANGE,
                values: &oil,
            },
        ],
    )?;

    match stats::pearson(&oil, &stock) {
        Some(correlation) => info!(
            "correlation before normalization between {ticker} and {oil_type}: {correlation:.6}"
        ),
        None => warn!("raw correlation is undefined: too few rows or zero variance"),
    }

    match (stats::zscore(&oil), stats::zscore(&stock)) {
        (Some(oil_z), Some(stock_z)) => {
            plot::trend_chart(
                &plot_dir.join("normalized_trend.png"),
                "Normalized Price Trend: Stock vs Oil",
                "Normalized Price Change (Z-Score)",
                &[
                    TrendSeries {
                        label: "Stock Change Normalized",
                        color: plot::GREEN,
                        values: &stock_z,
                    },
                    TrendSeries {
                        label: "Oil Price Change Normalized",
                        color: plot::RED,
                        values: &oil_z,
                    },
                ],
            )?;
            plot::scatter_chart(
                &plot_dir.join("normalized_scatter.png"),
                &format!("Normalized correlation: {ticker} vs {oil_type}"),
                "Oil Price Change (normalized)",
                "Stock Change (normalized)",
                &oil_z,
                &stock_z,
            )?;

            match stats::pearson(&oil_z, &stock_z) {
                Some(correlation) => info!(
                    "correlation after normalization between {ticker} and {oil_type}: {correlation:.6}"
                ),
                None => warn!("normalized correlation is undefined"),
            }
        }
        _ => warn!(
            "z-score normalization is undefined for {ticker} / {oil_type}: a series has zero variance"
        ),
    }

    info!("charts written to {}", plot_dir.display());
    Ok(())
}
