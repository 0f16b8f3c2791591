use std::sync::LazyLock;

use scraper::Selector;
use thiserror::Error;

use crate::models::{CompanyId, KeyValueRecord, StatementRecord};

use super::cleaner::{normalise_table, TableError};
use super::page::{text_of, Page, Section, SectionNotFound};

/// Spurious link row the site injects into the quarterly results table.
pub const RAW_PDF_ROW: &str = "Raw PDF";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why one dataset could not be extracted. Sibling datasets are unaffected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    MissingSection(#[from] SectionNotFound),

    #[error("section `{section}` has no {what}")]
    MissingElement { section: Section, what: &'static str },

    #[error("section `{section}` has no `{attr}` attribute")]
    MissingAttribute { section: Section, attr: String },

    #[error("section `{section}`: {source}")]
    Table {
        section: Section,
        #[source]
        source: TableError,
    },
}

/// Coarse failure class, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingElement,
    Parse,
}

impl ExtractError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractError::MissingSection(_)
            | ExtractError::MissingElement { .. }
            | ExtractError::MissingAttribute { .. } => FailureKind::MissingElement,
            ExtractError::Table { source, .. } => match source {
                TableError::MissingHeader => FailureKind::MissingElement,
                TableError::RaggedRow { .. } | TableError::NonNumeric { .. } => FailureKind::Parse,
            },
        }
    }
}

// ── Item selectors ────────────────────────────────────────────────────────────

static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("h1 selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));
static LI: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").expect("li selector"));
static RATIO_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.name").expect("ratio name selector"));
static RATIO_NUMBER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.number").expect("ratio number selector"));

// ── Basic info ────────────────────────────────────────────────────────────────

/// Company name, the three outbound links (website, BSE, NSE) and every
/// entry of the top-ratios panel.
pub fn parse_basic_info(page: &Page<'_>, symbol: &str) -> Result<Vec<KeyValueRecord>, ExtractError> {
    let header = page.find_section(Section::CompanyHeader)?;
    let name = header
        .select(&H1)
        .next()
        .map(text_of)
        .ok_or(ExtractError::MissingElement {
            section: Section::CompanyHeader,
            what: "h1 company name",
        })?;

    let links: Vec<&str> = page
        .find_section(Section::CompanyLinks)?
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .collect();
    let [company_link, bse_link, nse_link, ..] = links.as_slice() else {
        return Err(ExtractError::MissingElement {
            section: Section::CompanyLinks,
            what: "company, BSE and NSE links",
        });
    };

    let mut records = vec![
        KeyValueRecord::new("company_name", name, symbol),
        KeyValueRecord::new("company_link", *company_link, symbol),
        KeyValueRecord::new("bse_link", *bse_link, symbol),
        KeyValueRecord::new("nse_link", *nse_link, symbol),
    ];

    for li in page.find_section(Section::TopRatios)?.select(&LI) {
        let missing = |what| ExtractError::MissingElement {
            section: Section::TopRatios,
            what,
        };
        let name = li.select(&RATIO_NAME).next().ok_or_else(|| missing("ratio name"))?;
        let number = li
            .select(&RATIO_NUMBER)
            .next()
            .ok_or_else(|| missing("ratio value"))?;

        let name = text_of(name).replace('\n', "");
        records.push(KeyValueRecord::new(name.trim(), text_of(number), symbol));
    }

    Ok(records)
}

// ── Pros / cons ───────────────────────────────────────────────────────────────

/// Both bullet lists, pros first. Each line is trimmed.
pub fn parse_pros_cons(page: &Page<'_>, symbol: &str) -> Result<Vec<KeyValueRecord>, ExtractError> {
    let pros = page.find_section(Section::Pros)?;
    let cons = page.find_section(Section::Cons)?;

    let lines = |el: scraper::ElementRef<'_>, label: &'static str| -> Vec<KeyValueRecord> {
        el.select(&LI)
            .map(|li| KeyValueRecord::new(label, text_of(li), symbol))
            .collect()
    };

    let mut records = lines(pros, "pros");
    records.extend(lines(cons, "cons"));
    Ok(records)
}

// ── Company id ────────────────────────────────────────────────────────────────

pub fn parse_company_id(page: &Page<'_>) -> Result<CompanyId, ExtractError> {
    let attr = page.sections().company_id_attr();
    page.find_section(Section::CompanyInfo)?
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| CompanyId(id.to_string()))
        .ok_or_else(|| ExtractError::MissingAttribute {
            section: Section::CompanyInfo,
            attr: attr.to_string(),
        })
}

// ── Statement tables ──────────────────────────────────────────────────────────

/// The six wide tables that share the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    QuarterlyResults,
    ProfitLoss,
    BalanceSheet,
    CashFlow,
    Ratios,
    Shareholding,
}

impl Statement {
    pub const ALL: [Statement; 6] = [
        Statement::QuarterlyResults,
        Statement::ProfitLoss,
        Statement::BalanceSheet,
        Statement::CashFlow,
        Statement::Ratios,
        Statement::Shareholding,
    ];

    pub fn section(self) -> Section {
        match self {
            Statement::QuarterlyResults => Section::Quarters,
            Statement::ProfitLoss => Section::ProfitLoss,
            Statement::BalanceSheet => Section::BalanceSheet,
            Statement::CashFlow => Section::CashFlow,
            Statement::Ratios => Section::Ratios,
            Statement::Shareholding => Section::Shareholding,
        }
    }

    /// Indicator rows dropped before cleaning. Dropping them first keeps
    /// their link-only cells from failing the numeric pass.
    fn skipped_rows(self) -> &'static [&'static str] {
        match self {
            Statement::QuarterlyResults => &[RAW_PDF_ROW],
            _ => &[],
        }
    }
}

pub fn parse_statement(
    page: &Page<'_>,
    statement: Statement,
    symbol: &str,
) -> Result<Vec<StatementRecord>, ExtractError> {
    let section = statement.section();
    let table = page.find_section(section)?;
    normalise_table(table, symbol, statement.skipped_rows())
        .map_err(|source| ExtractError::Table { section, source })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
