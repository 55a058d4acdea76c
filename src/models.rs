//! Record shapes shared between scrape, transform and load.

use chrono::Utc;
use polars::df;
use polars::prelude::*;

/// Wire format for the `datetime` column, in hand-off files and logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamp per scrape; every record in the batch shares it.
pub fn capture_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One oil grade/spread as seen on the price listing page.
#[derive(Debug, Clone)]
pub struct OilQuote {
    pub grade: String,
    pub price: f64,
    pub captured_at: String,
}

/// One ticker quote. `open` and `price` stay raw page text until the
/// transform step coerces them.
#[derive(Debug, Clone)]
pub struct StockQuote {
    pub ticker: String,
    pub open: String,
    pub price: String,
    pub captured_at: String,
}

pub fn oil_frame(quotes: &[OilQuote]) -> PolarsResult<DataFrame> {
    df!(
        "type" => quotes.iter().map(|q| q.grade.clone()).collect::<Vec<_>>(),
        "price" => quotes.iter().map(|q| q.price).collect::<Vec<_>>(),
        "datetime" => quotes.iter().map(|q| q.captured_at.clone()).collect::<Vec<_>>(),
    )
}

pub fn stock_frame(quotes: &[StockQuote]) -> PolarsResult<DataFrame> {
    df!(
        "ticker" => quotes.iter().map(|q| q.ticker.clone()).collect::<Vec<_>>(),
        "open" => quotes.iter().map(|q| q.open.clone()).collect::<Vec<_>>(),
        "price" => quotes.iter().map(|q| q.price.clone()).collect::<Vec<_>>(),
        "datetime" => quotes.iter().map(|q| q.captured_at.clone()).collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn capture_timestamp_round_trips_through_wire_format() {
        let stamp = capture_timestamp();
        assert!(NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn oil_frame_keeps_column_order() {
        let quotes = vec![OilQuote {
            grade: "Crude Oil Brent".into(),
            price: 80.0,
            captured_at: "2024-11-20 10:00:00".into(),
        }];
        let frame = oil_frame(&quotes).unwrap();
        let names: Vec<&str> = frame.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, ["type", "price", "datetime"]);
        assert_eq!(frame.height(), 1);
    }

    #[test]
    fn empty_batches_build_zero_row_frames() {
        assert_eq!(oil_frame(&[]).unwrap().height(), 0);
        assert_eq!(stock_frame(&[]).unwrap().height(), 0);
    }
}
