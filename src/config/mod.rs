use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub quote: QuoteConfig,
    pub sections: SectionConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_company_path")]
    pub company_path: String,

    /// `true` requests the consolidated statements view.
    #[serde(default = "default_true")]
    pub consolidated: bool,

    /// Read timeout, and the cooldown applied after a 429.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_true")]
    pub debug: bool,
}

/// Daily quote configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteConfig {
    #[serde(default = "default_days")]
    pub days: u32,
}

/// CSS locators for each logical page section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectionConfig {
    #[serde(default = "default_company_header")]
    pub company_header: String,
    #[serde(default = "default_company_links")]
    pub company_links: String,
    #[serde(default = "default_top_ratios")]
    pub top_ratios: String,
    #[serde(default = "default_pros")]
    pub pros: String,
    #[serde(default = "default_cons")]
    pub cons: String,
    #[serde(default = "default_company_info")]
    pub company_info: String,
    #[serde(default = "default_company_id_attr")]
    pub company_id_attr: String,
    #[serde(default = "default_quarters")]
    pub quarters: String,
    #[serde(default = "default_profit_loss")]
    pub profit_loss: String,
    #[serde(default = "default_balance_sheet")]
    pub balance_sheet: String,
    #[serde(default = "default_cash_flow")]
    pub cash_flow: String,
    #[serde(default = "default_ratios")]
    pub ratios: String,
    #[serde(default = "default_shareholding")]
    pub shareholding: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.screener.in".to_string()
}
fn default_company_path() -> String {
    "company".to_string()
}
fn default_timeout_secs() -> u64 {
    2
}
fn default_max_retries() -> u32 {
    2
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/80.0.3987.149 Safari/537.36"
        .to_string()
}
fn default_accept_language() -> String {
    "en,gu;q=0.9,hi;q=0.8".to_string()
}
fn default_true() -> bool {
    true
}
fn default_days() -> u32 {
    365
}

const STATEMENT_TABLE: &str = "table.data-table.responsive-text-nowrap";

fn default_company_header() -> String {
    "div.flex-row.flex-wrap.flex-align-center.flex-grow".to_string()
}
fn default_company_links() -> String {
    "div.company-links.show-from-tablet-landscape".to_string()
}
fn default_top_ratios() -> String {
    "#top-ratios".to_string()
}
fn default_pros() -> String {
    "div.pros".to_string()
}
fn default_cons() -> String {
    "div.cons".to_string()
}
fn default_company_info() -> String {
    "div#company-info".to_string()
}
fn default_company_id_attr() -> String {
    "data-company-id".to_string()
}
fn default_quarters() -> String {
    format!("section#quarters {STATEMENT_TABLE}")
}
fn default_profit_loss() -> String {
    format!("section#profit-loss {STATEMENT_TABLE}")
}
fn default_balance_sheet() -> String {
    format!("section#balance-sheet {STATEMENT_TABLE}")
}
fn default_cash_flow() -> String {
    format!("section#cash-flow {STATEMENT_TABLE}")
}
fn default_ratios() -> String {
    format!("section#ratios {STATEMENT_TABLE}")
}
fn default_shareholding() -> String {
    "section#shareholding table.data-table".to_string()
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SCREENER").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            company_path: default_company_path(),
            consolidated: true,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            debug: true,
        }
    }
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self { days: default_days() }
    }
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            company_header: default_company_header(),
            company_links: default_company_links(),
            top_ratios: default_top_ratios(),
            pros: default_pros(),
            cons: default_cons(),
            company_info: default_company_info(),
            company_id_attr: default_company_id_attr(),
            quarters: default_quarters(),
            profit_loss: default_profit_loss(),
            balance_sheet: default_balance_sheet(),
            cash_flow: default_cash_flow(),
            ratios: default_ratios(),
            shareholding: default_shareholding(),
        }
    }
}
