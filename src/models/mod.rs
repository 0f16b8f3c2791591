use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ScraperConfig;

// ── Request ───────────────────────────────────────────────────────────────────

/// Fixed header set sent with every request. Built once per request value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders(BTreeMap<String, String>);

impl RequestHeaders {
    pub fn from_config(config: &ScraperConfig) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("user-agent".to_string(), config.user_agent.clone());
        headers.insert("accept-language".to_string(), config.accept_language.clone());
        Self(headers)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Everything needed to scrape one company. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct CompanyRequest {
    pub ticker: String,
    pub base_url: String,
    pub company_path: String,
    pub consolidated: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub headers: RequestHeaders,
    pub debug: bool,
}

impl CompanyRequest {
    pub fn new(ticker: impl Into<String>, config: &ScraperConfig) -> Self {
        Self {
            ticker: ticker.into().trim().to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            company_path: config.company_path.trim_matches('/').to_string(),
            consolidated: config.consolidated,
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            headers: RequestHeaders::from_config(config),
            debug: config.debug,
        }
    }
}

// ── Datasets ──────────────────────────────────────────────────────────────────

/// One cell of a financial statement in long format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementRecord {
    pub indicator: String,
    pub period: String,
    /// NaN when the source cell was blank.
    pub value: f64,
    pub symbol: String,
}

/// A labelled text value: basic info entries and pros/cons lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueRecord {
    pub indicator: String,
    pub value: String,
    pub symbol: String,
}

impl KeyValueRecord {
    pub fn new(indicator: impl Into<String>, value: impl Into<String>, symbol: &str) -> Self {
        Self {
            indicator: indicator.into(),
            value: value.into(),
            symbol: symbol.to_string(),
        }
    }
}

/// Site-internal company identifier, harvested from the company page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub String);

// ── Daily quote ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotePoint {
    pub date: NaiveDate,
    pub price: f64,
    pub volume: f64,
    #[serde(rename = "DMA50")]
    pub dma50: f64,
    #[serde(rename = "DMA200")]
    pub dma200: f64,
}

/// Date-ordered as delivered by the chart API.
pub type QuoteSeries = Vec<QuotePoint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_normalises_urls_and_ticker() {
        let config = ScraperConfig {
            base_url: "https://example.test/".into(),
            company_path: "/company/".into(),
            ..Default::default()
        };
        let req = CompanyRequest::new(" TCS ", &config);

        assert_eq!(req.ticker, "TCS");
        assert_eq!(req.base_url, "https://example.test");
        assert_eq!(req.company_path, "company");
        assert_eq!(req.timeout, Duration::from_secs(2));
        assert_eq!(req.max_retries, 2);
    }

    #[test]
    fn test_headers_from_config() {
        let headers = RequestHeaders::from_config(&ScraperConfig::default());
        let pairs: Vec<(&str, &str)> = headers.iter().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("accept-language", "en,gu;q=0.9,hi;q=0.8"));
        assert_eq!(pairs[1].0, "user-agent");
        assert!(pairs[1].1.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_quote_point_serialises_dma_names() {
        let point = QuotePoint {
            date: NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
            price: 10.5,
            volume: 1200.0,
            dma50: 9.0,
            dma200: 8.0,
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["DMA50"], 9.0);
        assert_eq!(json["DMA200"], 8.0);
        assert_eq!(json["date"], "2024-03-28");
    }
}
