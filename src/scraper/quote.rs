//! Daily price / volume / moving-average series from the chart API.
//!
//! The payload carries one dataset per metric, each a list of
//! `[date, value, ...]` points:
//!
//! ```json
//! {"datasets": [
//!   {"metric": "Price",  "values": [["2024-03-28", "2512.35"], ...]},
//!   {"metric": "Volume", "values": [["2024-03-28", 1830021, {"delivery": 52}], ...]},
//!   {"metric": "DMA50",  "values": [["2024-03-28", 2480.1], ...]},
//!   {"metric": "DMA200", "values": [["2024-03-28", 2301.7], ...]}
//! ]}
//! ```
//!
//! Datasets are matched by their `metric` label when every dataset has one,
//! otherwise by position (price, volume, DMA50, DMA200).

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::models::{CompanyId, CompanyRequest, QuotePoint, QuoteSeries};

use super::http_client::{FetchError, HttpClient};

const CHART_QUERY: &str = "Price-DMA50-DMA200-Volume";

/// Metric labels in positional order.
const METRICS: [&str; 4] = ["Price", "Volume", "DMA50", "DMA200"];

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("no company id was harvested from the company page")]
    NoCompanyId,

    #[error("invalid chart URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("malformed chart payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("chart payload has no `{0}` dataset")]
    MissingDataset(&'static str),

    #[error("`{metric}` has {found} points, price has {expected}")]
    LengthMismatch {
        metric: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("bad `{metric}` point #{index}: {point}")]
    BadPoint {
        metric: &'static str,
        index: usize,
        point: String,
    },
}

#[derive(Debug, Deserialize)]
struct ChartPayload {
    #[serde(default)]
    datasets: Vec<Dataset>,
}

#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// `{base}/api/company/{id}/chart/?q=Price-DMA50-DMA200-Volume&days={n}&consolidated=true`
pub fn chart_url(base_url: &str, company_id: &CompanyId, days: u32) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(["api", "company", company_id.0.as_str(), "chart", ""]);
    url.query_pairs_mut()
        .append_pair("q", CHART_QUERY)
        .append_pair("days", &days.to_string())
        .append_pair("consolidated", "true");
    Ok(url)
}

/// Fetch and decode the series, with the same 404/429 handling as the page fetch.
pub async fn fetch_daily_quote(
    client: &HttpClient,
    request: &CompanyRequest,
    company_id: &CompanyId,
    days: u32,
    max_retries: u32,
) -> Result<QuoteSeries, QuoteError> {
    let url = chart_url(&request.base_url, company_id, days)?;
    let body = client
        .fetch_text(&url, &request.headers, request.timeout, max_retries)
        .await?;
    let series = decode_quote(&body)?;
    debug!("{}: {} daily quote points", request.ticker, series.len());
    Ok(series)
}

pub fn decode_quote(body: &str) -> Result<QuoteSeries, QuoteError> {
    let payload: ChartPayload = serde_json::from_str(body)?;
    let [price, volume, dma50, dma200] = select_datasets(&payload.datasets)?;

    let dates = price
        .values
        .iter()
        .enumerate()
        .map(|(index, point)| point_date(point, index))
        .collect::<Result<Vec<_>, _>>()?;

    let price = point_values(price, METRICS[0], dates.len())?;
    let volume = point_values(volume, METRICS[1], dates.len())?;
    let dma50 = point_values(dma50, METRICS[2], dates.len())?;
    let dma200 = point_values(dma200, METRICS[3], dates.len())?;

    Ok(dates
        .into_iter()
        .enumerate()
        .map(|(i, date)| QuotePoint {
            date,
            price: price[i],
            volume: volume[i],
            dma50: dma50[i],
            dma200: dma200[i],
        })
        .collect())
}

fn select_datasets(datasets: &[Dataset]) -> Result<[&Dataset; 4], QuoteError> {
    let labelled = !datasets.is_empty() && datasets.iter().all(|d| d.metric.is_some());
    Ok([
        pick_dataset(datasets, labelled, 0)?,
        pick_dataset(datasets, labelled, 1)?,
        pick_dataset(datasets, labelled, 2)?,
        pick_dataset(datasets, labelled, 3)?,
    ])
}

fn pick_dataset(datasets: &[Dataset], labelled: bool, position: usize) -> Result<&Dataset, QuoteError> {
    let metric = METRICS[position];
    let found = if labelled {
        datasets
            .iter()
            .find(|d| d.metric.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(metric)))
    } else {
        datasets.get(position)
    };
    found.ok_or(QuoteError::MissingDataset(metric))
}

fn point_date(point: &[Value], index: usize) -> Result<NaiveDate, QuoteError> {
    point
        .first()
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| bad_point(METRICS[0], index, point))
}

fn point_values(dataset: &Dataset, metric: &'static str, expected: usize) -> Result<Vec<f64>, QuoteError> {
    if dataset.values.len() != expected {
        return Err(QuoteError::LengthMismatch {
            metric,
            expected,
            found: dataset.values.len(),
        });
    }

    dataset
        .values
        .iter()
        .enumerate()
        .map(|(index, point)| {
            point
                .get(1)
                .and_then(number)
                .ok_or_else(|| bad_point(metric, index, point))
        })
        .collect()
}

/// Values arrive as JSON numbers or numeric strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn bad_point(metric: &'static str, index: usize, point: &[Value]) -> QuoteError {
    QuoteError::BadPoint {
        metric,
        index,
        point: Value::Array(point.to_vec()).to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::scraper::http_client::testing::ScriptedTransport;
    use crate::scraper::http_client::RawResponse;

    fn positional_payload() -> String {
        r#"{"datasets": [
            {"values": [["2024-03-26", "100.5"], ["2024-03-27", "101.0"], ["2024-03-28", 99.25]]},
            {"values": [["2024-03-26", 1000, {"delivery": 40}], ["2024-03-27", 1500], ["2024-03-28", 900]]},
            {"values": [["2024-03-26", 95.0], ["2024-03-27", 95.5], ["2024-03-28", 96.0]]},
            {"values": [["2024-03-26", 90.0], ["2024-03-27", 90.1], ["2024-03-28", 90.2]]}
        ]}"#
        .to_string()
    }

    #[test]
    fn test_positional_datasets_zip_by_index() {
        let series = decode_quote(&positional_payload()).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(
            series[0],
            QuotePoint {
                date: NaiveDate::from_ymd_opt(2024, 3, 26).unwrap(),
                price: 100.5,
                volume: 1000.0,
                dma50: 95.0,
                dma200: 90.0,
            }
        );
        assert_eq!(series[2].price, 99.25);
        assert_eq!(series[2].volume, 900.0);
        assert_eq!(series[2].dma200, 90.2);
    }

    #[test]
    fn test_alignment_is_positional_not_by_date() {
        // DMA200 dates disagree with price; values still align by index.
        let body = r#"{"datasets": [
            {"values": [["2024-01-01", 1], ["2024-01-02", 2]]},
            {"values": [["2024-01-01", 10], ["2024-01-02", 20]]},
            {"values": [["2024-01-01", 5], ["2024-01-02", 6]]},
            {"values": [["2023-06-01", 7], ["2023-06-02", 8]]}
        ]}"#;
        let series = decode_quote(body).unwrap();
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(series[0].dma200, 7.0);
        assert_eq!(series[1].dma200, 8.0);
    }

    #[test]
    fn test_labelled_datasets_are_matched_by_metric() {
        let body = r#"{"datasets": [
            {"metric": "Volume", "values": [["2024-01-01", 10]]},
            {"metric": "DMA200", "values": [["2024-01-01", 7]]},
            {"metric": "Price", "values": [["2024-01-01", 1]]},
            {"metric": "DMA50", "values": [["2024-01-01", 5]]}
        ]}"#;
        let series = decode_quote(body).unwrap();
        assert_eq!(series[0].price, 1.0);
        assert_eq!(series[0].volume, 10.0);
        assert_eq!(series[0].dma50, 5.0);
        assert_eq!(series[0].dma200, 7.0);
    }

    #[test]
    fn test_missing_dataset() {
        let body = r#"{"datasets": [{"values": []}, {"values": []}]}"#;
        assert!(matches!(
            decode_quote(body),
            Err(QuoteError::MissingDataset("DMA50"))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let body = r#"{"datasets": [
            {"values": [["2024-01-01", 1], ["2024-01-02", 2]]},
            {"values": [["2024-01-01", 10]]},
            {"values": [["2024-01-01", 5], ["2024-01-02", 6]]},
            {"values": [["2024-01-01", 7], ["2024-01-02", 8]]}
        ]}"#;
        assert!(matches!(
            decode_quote(body),
            Err(QuoteError::LengthMismatch {
                metric: "Volume",
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_bad_point_and_bad_json() {
        let body = r#"{"datasets": [
            {"values": [["not a date", 1]]},
            {"values": [["2024-01-01", 10]]},
            {"values": [["2024-01-01", 5]]},
            {"values": [["2024-01-01", 7]]}
        ]}"#;
        assert!(matches!(decode_quote(body), Err(QuoteError::BadPoint { index: 0, .. })));
        assert!(matches!(decode_quote("<html>"), Err(QuoteError::Decode(_))));
    }

    #[test]
    fn test_chart_url() {
        let url = chart_url("https://www.screener.in", &CompanyId("6596".into()), 365).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.screener.in/api/company/6596/chart/?q=Price-DMA50-DMA200-Volume&days=365&consolidated=true"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_daily_quote_retries_429() {
        let transport = ScriptedTransport::new(vec![
            Ok(RawResponse {
                status: 429,
                body: String::new(),
            }),
            Ok(RawResponse {
                status: 200,
                body: positional_payload(),
            }),
        ]);
        let client = HttpClient::new(transport.clone());
        let request = CompanyRequest::new("ACME", &ScraperConfig::default());

        let series = fetch_daily_quote(&client, &request, &CompanyId("42".into()), 30, 2)
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(transport.calls(), 2);
        assert!(transport.requested()[0].contains("/api/company/42/chart/"));
        assert!(transport.requested()[0].contains("days=30"));
    }

    #[tokio::test]
    async fn test_fetch_daily_quote_404() {
        let transport = ScriptedTransport::statuses(&[404], "");
        let client = HttpClient::new(transport);
        let request = CompanyRequest::new("ACME", &ScraperConfig::default());

        let err = fetch_daily_quote(&client, &request, &CompanyId("42".into()), 30, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Fetch(FetchError::NotFound { .. })));
    }
}
