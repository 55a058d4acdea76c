//! Scraper for per-ticker stock quote pages.

use reqwest::header::USER_AGENT;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{info, warn};

use super::{element_text, BROWSER_USER_AGENT};
use crate::error::StepError;
use crate::models::{capture_timestamp, StockQuote};

pub struct StockScraper {
    client: Client,
    base_url: String,
    tickers: Vec<String>,
}

impl StockScraper {
    pub fn new(client: Client, base_url: String, tickers: Vec<String>) -> Self {
        Self {
            client,
            base_url,
            tickers,
        }
    }

    /// One request per ticker; a ticker that fails to fetch or whose quote
    /// fields are absent is skipped, not fatal. Every surviving record
    /// shares one capture timestamp.
    pub async fn fetch_batch(&self) -> Result<Vec<StockQuote>, StepError> {
        let captured_at = capture_timestamp();
        let mut quotes = Vec::with_capacity(self.tickers.len());

        for ticker in &self.tickers {
            match self.fetch_one(ticker).await {
                Ok(Some((price, open))) => quotes.push(StockQuote {
                    ticker: ticker.clone(),
                    open,
                    price,
                    captured_at: captured_at.clone(),
                }),
                Ok(None) => warn!("quote fields not found for {ticker}; skipping"),
                Err(e) => warn!("failed to fetch {ticker}: {e}"),
            }
        }

        info!(
            "scraped {} of {} tickers",
            quotes.len(),
            self.tickers.len()
        );
        Ok(quotes)
    }

    async fn fetch_one(&self, ticker: &str) -> Result<Option<(String, String)>, StepError> {
        let url = format!("{}/quote/{}/", self.base_url.trim_end_matches('/'), ticker);
        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StepError::HttpStatus(response.status()));
        }
        let body = response.text().await?;
        Ok(Self::extract_quote(&body))
    }

    /// The live price is the `span` inside `fin-streamer.livePrice.yf-1tejb6`;
    /// the reference value is the text of `fin-streamer.yf-11uk5vd`. The
    /// markup is brittle by nature; a layout change just yields no records.
    fn extract_quote(html: &str) -> Option<(String, String)> {
        let document = Html::parse_document(html);
        let live_selector = Selector::parse(r#"fin-streamer.livePrice.yf-1tejb6 span"#).unwrap();
        let reference_selector = Selector::parse(r#"fin-streamer.yf-11uk5vd"#).unwrap();

        let price = document
            .select(&live_selector)
            .next()
            .map(|el| element_text(&el))?;
        let open = document
            .select(&reference_selector)
            .next()
            .map(|el| element_text(&el))?;

        if price.is_empty() || open.is_empty() {
            return None;
        }
        Some((price, open))
    }
}
