use polars::prelude::*;

/// Clean and enrich one stock batch.
///
/// `open` and `price` were coerced to Float64 when the hand-off was read
/// (unparseable text is already null here); each column is mean-filled
/// independently, rows sort by capture time, and two derived columns are
/// added: `average_stock_price` and `stock_change`.
pub fn transform(frame: DataFrame) -> PolarsResult<DataFrame> {
    frame
        .lazy()
        .with_columns([
            col("open").fill_null(col("open").mean()),
            col("price").fill_null(col("price").mean()),
        ])
        .sort(["datetime"], SortMultipleOptions::default())
        .with_columns([
            ((col("open") + col("price")) / lit(2.0)).alias("average_stock_price"),
            (col("price") - col("open")).alias("stock_change"),
        ])
        .collect()
}
