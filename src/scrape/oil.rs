//! Scraper for the oil price listing page.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use super::{element_text, parse_price};
use crate::error::StepError;
use crate::models::{capture_timestamp, OilQuote};

pub struct OilScraper {
    client: Client,
    url: String,
}

impl OilScraper {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }

    /// Fetch the listing page and extract one record per price row. All
    /// records share a single capture timestamp.
    pub async fn fetch_batch(&self) -> Result<Vec<OilQuote>, StepError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(StepError::HttpStatus(response.status()));
        }
        let body = response.text().await?;

        let quotes = Self::parse_rows(&body, &capture_timestamp());
        info!("scraped {} oil price rows from {}", quotes.len(), self.url);
        Ok(quotes)
    }

    /// Rows are `tr.link_oilprice_row`; the grade sits in the row's
    /// `data-spread` attribute and the price in its `td.value` cell. Rows
    /// missing either field are skipped.
    fn parse_rows(html: &str, captured_at: &str) -> Vec<OilQuote> {
        let document = Html::parse_document(html);
        let row_selector = Selector::parse("tr.link_oilprice_row").unwrap();
        let price_selector = Selector::parse("td.value").unwrap();

        let mut quotes = Vec::new();
        for row in document.select(&row_selector) {
            let Some(grade) = row.value().attr("data-spread") else {
                debug!("skipping oil row without a data-spread attribute");
                continue;
            };
            let Some(price) = row
                .select(&price_selector)
                .next()
                .map(|cell| element_text(&cell))
                .and_then(|text| parse_price(&text))
            else {
                debug!("skipping oil row {grade}: no parseable price cell");
                continue;
            };

            quotes.push(OilQuote {
                grade: grade.to_string(),
                price,
                captured_at: captured_at.to_string(),
            });
        }
        quotes
    }
}
