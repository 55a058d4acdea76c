use polars::prelude::*;

/// Clean and enrich one oil batch.
///
/// Nulls in `price` are filled with the batch mean, rows are sorted by
/// capture time so "previous row" is well-defined, then two derived columns
/// are added: `price_change` (row-over-row percent change, first row 0) and
/// `normalized_price` (min-max scaled into [0, 1]). A constant batch has no
/// spread to scale over; its normalized price is defined as 0.0.
pub fn transform(frame: DataFrame) -> PolarsResult<DataFrame> {
    let spread = col("price").max() - col("price").min();

    frame
        .lazy()
        .with_column(col("price").fill_null(col("price").mean()))
        .sort(["datetime"], SortMultipleOptions::default())
        .with_column(
            (col("price").pct_change(lit(1)).fill_null(lit(0.0)) * lit(100.0))
                .alias("price_change"),
        )
        .with_column(
            when(spread.clone().gt(lit(0.0)))
                .then((col("price") - col("price").min()) / spread)
                .otherwise(lit(0.0))
                .alias("normalized_price"),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn series(frame: &DataFrame, name: &str) -> Vec<Option<f64>> {
        frame
            .column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn close(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|v| (v - expected).abs() < 1e-9)
    }

    #[test]
    fn brent_scenario_produces_expected_derived_columns() {
        let frame = df!(
            "type" => ["Crude Oil Brent", "Crude Oil Brent"],
            "price" => [80.0, 82.0],
            "datetime" => ["2024-11-20 10:00:00", "2024-11-20 10:30:00"],
        )
        .unwrap();

        let out = transform(frame).unwrap();
        let change = series(&out, "price_change");
        let normalized = series(&out, "normalized_price");

        assert!(close(change[0], 0.0));
        assert!(close(change[1], 2.5));
        assert!(close(normalized[0], 0.0));
        assert!(close(normalized[1], 1.0));
    }

    #[test]
    fn mean_fill_removes_nulls_without_moving_the_mean() {
        let frame = df!(
            "type" => ["A", "B", "C"],
            "price" => [Some(10.0), None, Some(20.0)],
            "datetime" => ["2024-11-20 10:00:00", "2024-11-20 10:00:00", "2024-11-20 10:00:00"],
        )
        .unwrap();

        let out = transform(frame).unwrap();
        let price = series(&out, "price");

        assert!(price.iter().all(Option::is_some));
        let mean = price.iter().flatten().sum::<f64>() / price.len() as f64;
        assert!((mean - 15.0).abs() < 1e-9);
    }

    #[test]
    fn normalized_price_stays_in_unit_interval() {
        let frame = df!(
            "type" => ["A", "B", "C", "D"],
            "price" => [70.0, 85.0, 77.5, 91.0],
            "datetime" => ["2024-11-20 10:00:00"; 4],
        )
        .unwrap();

        let out = transform(frame).unwrap();
        let normalized = series(&out, "normalized_price");

        assert!(normalized
            .iter()
            .flatten()
            .all(|v| (0.0..=1.0).contains(v)));
        assert!(normalized.iter().any(|v| close(*v, 0.0)));
        assert!(normalized.iter().any(|v| close(*v, 1.0)));
    }

    #[test]
    fn constant_batch_normalizes_to_zero() {
        let frame = df!(
            "type" => ["A", "B"],
            "price" => [50.0, 50.0],
            "datetime" => ["2024-11-20 10:00:00", "2024-11-20 10:00:00"],
        )
        .unwrap();

        let out = transform(frame).unwrap();
        let normalized = series(&out, "normalized_price");
        assert!(normalized.iter().all(|v| close(*v, 0.0)));
    }

    #[test]
    fn rows_sort_by_datetime_before_percent_change() {
        let frame = df!(
            "type" => ["late", "early"],
            "price" => [82.0, 80.0],
            "datetime" => ["2024-11-20 11:00:00", "2024-11-20 10:00:00"],
        )
        .unwrap();

        let out = transform(frame).unwrap();
        let first_type = out
            .column("type")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(0)
            .unwrap()
            .to_string();
        let change = series(&out, "price_change");

        assert_eq!(first_type, "early");
        assert!(close(change[0], 0.0));
        assert!(close(change[1], 2.5));
    }
}
