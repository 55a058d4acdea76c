//! Page scrapers for the two upstream sources.

pub mod oil;
pub mod stock;

use std::time::Duration;

use reqwest::Client;

use crate::error::StepError;

/// The stock source rejects obvious bot clients, so its requests carry a
/// desktop browser identity instead of the crate default.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

pub fn build_client() -> Result<Client, StepError> {
    Client::builder()
        .user_agent(concat!("oil-stock-etl/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(StepError::from)
}

/// Collapse an element's text nodes into one trimmed string.
pub(crate) fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a price cell, stripping thousands separators.
pub(crate) fn parse_price(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_price_strips_thousands_separators() {
        assert_eq!(parse_price("1,234.56"), Some(1234.56));
        assert_eq!(parse_price(" 80.02 "), Some(80.02));
    }

    #[test]
    fn parse_price_rejects_garbage() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("n/a"), None);
    }
}
