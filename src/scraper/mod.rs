pub mod cleaner;
pub mod http_client;
pub mod page;
pub mod parsers;
pub mod quote;

use std::sync::Arc;

use tracing::{debug, info, warn, Level};
use url::Url;

use crate::config::{AppConfig, ScraperConfig};
use crate::models::{CompanyId, CompanyRequest, KeyValueRecord, QuoteSeries, StatementRecord};

use self::http_client::{FetchError, HttpClient, TransportError};
use self::page::{LocatorError, Page, SectionMap};
use self::parsers::{
    parse_basic_info, parse_company_id, parse_pros_cons, parse_statement, ExtractError, Statement,
};
use self::quote::{fetch_daily_quote, QuoteError};

// ── Datasets ──────────────────────────────────────────────────────────────────

/// Every dataset a company page yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    BasicInfo,
    ProsCons,
    CompanyId,
    Statement(Statement),
}

impl Dataset {
    pub fn name(self) -> &'static str {
        match self {
            Dataset::BasicInfo => "basic_info",
            Dataset::ProsCons => "pros_cons",
            Dataset::CompanyId => "company_id",
            Dataset::Statement(Statement::QuarterlyResults) => "quarterly_results",
            Dataset::Statement(Statement::ProfitLoss) => "profit_loss",
            Dataset::Statement(Statement::BalanceSheet) => "balance_sheet",
            Dataset::Statement(Statement::CashFlow) => "cash_flow",
            Dataset::Statement(Statement::Ratios) => "ratios",
            Dataset::Statement(Statement::Shareholding) => "shareholding",
        }
    }
}

type Extracted<T> = Result<T, ExtractError>;

/// Outcome of each extractor, kept separately so one failure never hides another.
#[derive(Debug, Clone)]
struct Datasets {
    basic_info: Extracted<Vec<KeyValueRecord>>,
    pros_cons: Extracted<Vec<KeyValueRecord>>,
    company_id: Extracted<CompanyId>,
    // Indexed like Statement::ALL
    statements: [Extracted<Vec<StatementRecord>>; 6],
}

impl Datasets {
    fn extract(page: &Page<'_>, symbol: &str) -> Self {
        Self {
            basic_info: parse_basic_info(page, symbol),
            pros_cons: parse_pros_cons(page, symbol),
            company_id: parse_company_id(page),
            statements: Statement::ALL.map(|statement| parse_statement(page, statement, symbol)),
        }
    }

    fn statement(&self, statement: Statement) -> &Extracted<Vec<StatementRecord>> {
        &self.statements[statement as usize]
    }

    fn failures(&self) -> Vec<(Dataset, &ExtractError)> {
        let mut out = Vec::new();
        if let Err(e) = &self.basic_info {
            out.push((Dataset::BasicInfo, e));
        }
        if let Err(e) = &self.pros_cons {
            out.push((Dataset::ProsCons, e));
        }
        for (statement, result) in Statement::ALL.iter().zip(&self.statements) {
            if let Err(e) = result {
                out.push((Dataset::Statement(*statement), e));
            }
        }
        if let Err(e) = &self.company_id {
            out.push((Dataset::CompanyId, e));
        }
        out
    }
}

// ── Company ───────────────────────────────────────────────────────────────────

/// One company's scraped page. Either every extractor ran (each with its own
/// outcome) or the page fetch failed and nothing is available.
pub struct Company {
    request: CompanyRequest,
    client: HttpClient,
    state: Result<Datasets, FetchError>,
}

impl Company {
    /// Fetch the company page and run every extractor over it.
    pub async fn load(request: CompanyRequest, client: HttpClient, sections: &SectionMap) -> Self {
        let state = match company_url(&request) {
            Ok(url) => client
                .fetch_text(&url, &request.headers, request.timeout, request.max_retries)
                .await
                .map(|body| extract(&body, sections, &request)),
            Err(e) => Err(FetchError::Transport {
                url: request.base_url.clone(),
                source: TransportError(format!("invalid company URL: {e}")),
            }),
        };

        if let Err(e) = &state {
            report(request.debug, &request.ticker, "page", &e.to_string());
        }

        Self {
            request,
            client,
            state,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.request.ticker
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_ok()
    }

    /// Why the page itself could not be fetched.
    pub fn load_error(&self) -> Option<&FetchError> {
        self.state.as_ref().err()
    }

    pub fn basic_info(&self) -> Option<&[KeyValueRecord]> {
        self.datasets()?.basic_info.as_deref().ok()
    }

    pub fn pros_cons(&self) -> Option<&[KeyValueRecord]> {
        self.datasets()?.pros_cons.as_deref().ok()
    }

    pub fn quarterly_results(&self) -> Option<&[StatementRecord]> {
        self.statement(Statement::QuarterlyResults)
    }

    pub fn profit_loss(&self) -> Option<&[StatementRecord]> {
        self.statement(Statement::ProfitLoss)
    }

    pub fn balance_sheet(&self) -> Option<&[StatementRecord]> {
        self.statement(Statement::BalanceSheet)
    }

    pub fn cash_flow(&self) -> Option<&[StatementRecord]> {
        self.statement(Statement::CashFlow)
    }

    pub fn ratios(&self) -> Option<&[StatementRecord]> {
        self.statement(Statement::Ratios)
    }

    pub fn shareholding(&self) -> Option<&[StatementRecord]> {
        self.statement(Statement::Shareholding)
    }

    pub fn statement(&self, statement: Statement) -> Option<&[StatementRecord]> {
        self.datasets()?.statement(statement).as_deref().ok()
    }

    pub fn company_id(&self) -> Option<&CompanyId> {
        self.datasets()?.company_id.as_ref().ok()
    }

    /// Datasets that failed to extract, with the reason. Empty when the page
    /// was not loaded at all; see [`Company::load_error`] for that.
    pub fn failures(&self) -> Vec<(Dataset, &ExtractError)> {
        self.datasets().map(Datasets::failures).unwrap_or_default()
    }

    /// Daily price, volume and moving averages for the last `days` days.
    pub async fn daily_quote(&self, days: u32, max_retries: u32) -> Result<QuoteSeries, QuoteError> {
        let company_id = self.company_id().ok_or(QuoteError::NoCompanyId)?;
        let result =
            fetch_daily_quote(&self.client, &self.request, company_id, days, max_retries).await;
        if let Err(e) = &result {
            report(self.request.debug, &self.request.ticker, "daily quote", &e.to_string());
        }
        result
    }

    fn datasets(&self) -> Option<&Datasets> {
        self.state.as_ref().ok()
    }
}

/// `{base}/{company_path}/{ticker}/consolidated/`, or without the last
/// segment for standalone statements.
pub fn company_url(request: &CompanyRequest) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&request.base_url)?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        segments.pop_if_empty();
        segments.extend(request.company_path.split('/').filter(|s| !s.is_empty()));
        segments.push(&request.ticker);
        if request.consolidated {
            segments.push("consolidated");
        }
        segments.push("");
    }
    Ok(url)
}

fn extract(body: &str, sections: &SectionMap, request: &CompanyRequest) -> Datasets {
    let page = Page::parse(body, sections);
    let datasets = Datasets::extract(&page, &request.ticker);

    for (dataset, err) in datasets.failures() {
        report(
            request.debug,
            &request.ticker,
            dataset.name(),
            &format!("{} ({:?})", err, err.kind()),
        );
    }
    debug!("(success) extracted {}", request.ticker);
    datasets
}

/// Failures surface at `warn` only when the request asked for debugging.
fn failure_level(debug_on: bool) -> Level {
    if debug_on { Level::WARN } else { Level::DEBUG }
}

fn report(debug_on: bool, ticker: &str, what: &str, reason: &str) {
    match failure_level(debug_on) {
        Level::WARN => warn!("(err) {} {}: {}", ticker, what, reason),
        _ => debug!("(err) {} {}: {}", ticker, what, reason),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Shared client + validated locators; hands out one [`Company`] per ticker.
pub struct ScreenerScraper {
    client: HttpClient,
    sections: Arc<SectionMap>,
    config: ScraperConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Locator(#[from] LocatorError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ScreenerScraper {
    pub fn new(config: &AppConfig) -> Result<Self, SetupError> {
        Self::with_client(config, HttpClient::reqwest()?)
    }

    pub fn with_client(config: &AppConfig, client: HttpClient) -> Result<Self, SetupError> {
        Ok(Self {
            client,
            sections: Arc::new(SectionMap::compile(&config.sections)?),
            config: config.scraper.clone(),
        })
    }

    pub fn request(&self, ticker: &str) -> CompanyRequest {
        CompanyRequest::new(ticker, &self.config)
    }

    pub async fn company(&self, ticker: &str) -> Company {
        self.load(self.request(ticker)).await
    }

    pub async fn load(&self, request: CompanyRequest) -> Company {
        info!("Scraping {}", request.ticker);
        Company::load(request, self.client.clone(), &self.sections).await
    }

    pub fn sections(&self) -> &SectionMap {
        &self.sections
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
