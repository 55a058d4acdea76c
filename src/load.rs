//! Appends transformed batches into the destination tables.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use polars::prelude::*;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;

use crate::error::{StepError, StepOutcome};
use crate::models::TIMESTAMP_FORMAT;

pub const OIL_TABLE: &str = "oil_prices";
pub const STOCK_TABLE: &str = "company_stocks";

/// Destination seam for the load step. The production sink appends to
/// PostgreSQL; tests substitute a mock to observe call counts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn append(&self, table: &str, frame: &DataFrame) -> Result<u64, StepError>;
}

/// Guard first: an empty batch never reaches the sink, so no connection is
/// acquired for it.
pub async fn load_step(sink: &dyn BatchSink, table: &str, frame: &DataFrame) -> StepOutcome {
    if frame.height() == 0 {
        info!("no rows for {table}; skipping load");
        return StepOutcome::SkippedEmpty;
    }

    match sink.append(table, frame).await {
        Ok(rows) => {
            info!("appended {rows} rows into {table}");
            StepOutcome::Completed { rows: rows as usize }
        }
        Err(e) => StepOutcome::Failed(e),
    }
}

pub struct PgSink {
    pool: PgPool,
    chunk_size: usize,
}

impl PgSink {
    pub fn new(pool: PgPool, chunk_size: usize) -> Self {
        Self { pool, chunk_size }
    }
}

#[async_trait]
impl BatchSink for PgSink {
    async fn append(&self, table: &str, frame: &DataFrame) -> Result<u64, StepError> {
        let (names, rows) = dataframe_rows(frame)?;

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for chunk in rows.chunks(self.chunk_size.max(1)) {
            let mut builder: QueryBuilder<'_, Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, names.join(", ")));
            builder.push_values(chunk, |mut row_builder, row| {
                for value in row {
                    match value {
                        SqlValue::Text(v) => {
                            row_builder.push_bind(v.clone());
                        }
                        SqlValue::Float(v) => {
                            row_builder.push_bind(*v);
                        }
                        SqlValue::Timestamp(v) => {
                            row_builder.push_bind(*v);
                        }
                    }
                }
            });
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }
}

enum SqlValue {
    Text(Option<String>),
    Float(Option<f64>),
    Timestamp(NaiveDateTime),
}

enum TypedColumn<'a> {
    Text(&'a StringChunked),
    Float(&'a Float64Chunked),
    Timestamp(&'a StringChunked),
}

/// Flatten a hand-off frame into bindable rows. Only the column shapes the
/// transformers produce are supported: Float64, String, and the String
/// `datetime` column, which is parsed into a real timestamp here.
fn dataframe_rows(frame: &DataFrame) -> Result<(Vec<String>, Vec<Vec<SqlValue>>), StepError> {
    let mut names = Vec::new();
    let mut columns = Vec::new();

    for column in frame.get_columns() {
        let name = column.name().to_string();
        let series = column.as_materialized_series();
        let typed = match series.dtype() {
            DataType::Float64 => TypedColumn::Float(series.f64()?),
            DataType::String if name == "datetime" => TypedColumn::Timestamp(series.str()?),
            DataType::String => TypedColumn::Text(series.str()?),
            other => {
                return Err(StepError::UnsupportedColumn(name, other.clone()));
            }
        };
        names.push(name);
        columns.push(typed);
    }

    let mut rows = Vec::with_capacity(frame.height());
    for i in 0..frame.height() {
        let mut row = Vec::with_capacity(columns.len());
        for column in &columns {
            row.push(match column {
                TypedColumn::Float(values) => SqlValue::Float(values.get(i)),
                TypedColumn::Text(values) => SqlValue::Text(values.get(i).map(str::to_string)),
                TypedColumn::Timestamp(values) => {
                    let raw = values.get(i).ok_or(StepError::MissingTimestamp(i))?;
                    SqlValue::Timestamp(NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)?)
                }
            });
        }
        rows.push(row);
    }

    Ok((names, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn oil_batch() -> DataFrame {
        df!(
            "type" => ["Crude Oil Brent", "WTI Crude"],
            "price" => [80.0, 76.5],
            "datetime" => ["2024-11-20 10:00:00", "2024-11-20 10:00:00"],
            "price_change" => [0.0, -4.375],
            "normalized_price" => [1.0, 0.0],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_batch_never_touches_the_sink() {
        let mut sink = MockBatchSink::new();
        sink.expect_append().times(0);

        let frame = DataFrame::empty_with_schema(&crate::handoff::transformed_oil_schema());
        let outcome = load_step(&sink, OIL_TABLE, &frame).await;

        assert!(matches!(outcome, StepOutcome::SkippedEmpty));
    }

    #[tokio::test]
    async fn full_batch_reaches_the_sink_once() {
        let mut sink = MockBatchSink::new();
        sink.expect_append()
            .withf(|table, frame| table == OIL_TABLE && frame.height() == 2)
            .times(1)
            .returning(|_, frame| Ok(frame.height() as u64));

        let outcome = load_step(&sink, OIL_TABLE, &oil_batch()).await;

        assert!(matches!(outcome, StepOutcome::Completed { rows: 2 }));
    }

    #[tokio::test]
    async fn sink_failure_becomes_a_failed_outcome() {
        let mut sink = MockBatchSink::new();
        sink.expect_append()
            .times(1)
            .returning(|_, _| Err(StepError::MissingTimestamp(0)));

        let outcome = load_step(&sink, OIL_TABLE, &oil_batch()).await;

        assert!(outcome.is_failed());
    }

    #[test]
    fn rows_flatten_with_parsed_timestamps() {
        let (names, rows) = dataframe_rows(&oil_batch()).unwrap();

        assert_eq!(
            names,
            ["type", "price", "datetime", "price_change", "normalized_price"]
        );
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[0][2], SqlValue::Timestamp(_)));
        assert!(matches!(rows[0][0], SqlValue::Text(Some(_))));
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let frame = df!(
            "type" => ["Brent"],
            "price" => [80.0],
            "datetime" => ["yesterday-ish"],
        )
        .unwrap();

        assert!(dataframe_rows(&frame).is_err());
    }
}
