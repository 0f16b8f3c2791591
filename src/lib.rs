//! Company financials from screener.in, normalized into long-format records.

pub mod config;
pub mod models;
pub mod output;
pub mod scraper;

pub use crate::config::AppConfig;
pub use crate::models::{CompanyId, CompanyRequest, KeyValueRecord, QuotePoint, QuoteSeries, StatementRecord};
pub use crate::scraper::{Company, Dataset, ScreenerScraper};
