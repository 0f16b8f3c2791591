//! Parsed company page and the locator table used to find its sections.

use std::collections::HashMap;
use std::fmt;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::SectionConfig;

/// Logical regions of a company page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    CompanyHeader,
    CompanyLinks,
    TopRatios,
    Pros,
    Cons,
    CompanyInfo,
    Quarters,
    ProfitLoss,
    BalanceSheet,
    CashFlow,
    Ratios,
    Shareholding,
}

impl Section {
    pub const ALL: [Section; 12] = [
        Section::CompanyHeader,
        Section::CompanyLinks,
        Section::TopRatios,
        Section::Pros,
        Section::Cons,
        Section::CompanyInfo,
        Section::Quarters,
        Section::ProfitLoss,
        Section::BalanceSheet,
        Section::CashFlow,
        Section::Ratios,
        Section::Shareholding,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::CompanyHeader => "company_header",
            Section::CompanyLinks => "company_links",
            Section::TopRatios => "top_ratios",
            Section::Pros => "pros",
            Section::Cons => "cons",
            Section::CompanyInfo => "company_info",
            Section::Quarters => "quarters",
            Section::ProfitLoss => "profit_loss",
            Section::BalanceSheet => "balance_sheet",
            Section::CashFlow => "cash_flow",
            Section::Ratios => "ratios",
            Section::Shareholding => "shareholding",
        }
    }

    fn locator(self, config: &SectionConfig) -> &str {
        match self {
            Section::CompanyHeader => &config.company_header,
            Section::CompanyLinks => &config.company_links,
            Section::TopRatios => &config.top_ratios,
            Section::Pros => &config.pros,
            Section::Cons => &config.cons,
            Section::CompanyInfo => &config.company_info,
            Section::Quarters => &config.quarters,
            Section::ProfitLoss => &config.profit_loss,
            Section::BalanceSheet => &config.balance_sheet,
            Section::CashFlow => &config.cash_flow,
            Section::Ratios => &config.ratios,
            Section::Shareholding => &config.shareholding,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("invalid selector for section `{section}`: {selector:?} ({reason})")]
    InvalidSelector {
        section: Section,
        selector: String,
        reason: String,
    },

    #[error("empty attribute name for the company id")]
    EmptyAttribute,
}

/// Compiled locator table. Built once at startup; every selector in it is valid.
#[derive(Debug)]
pub struct SectionMap {
    locators: HashMap<Section, (String, Selector)>,
    company_id_attr: String,
}

impl SectionMap {
    pub fn compile(config: &SectionConfig) -> Result<Self, LocatorError> {
        let mut locators = HashMap::with_capacity(Section::ALL.len());

        for section in Section::ALL {
            let raw = section.locator(config).trim();
            let selector = Selector::parse(raw).map_err(|e| LocatorError::InvalidSelector {
                section,
                selector: raw.to_string(),
                reason: format!("{e:?}"),
            })?;
            locators.insert(section, (raw.to_string(), selector));
        }

        let company_id_attr = config.company_id_attr.trim().to_string();
        if company_id_attr.is_empty() {
            return Err(LocatorError::EmptyAttribute);
        }

        Ok(Self {
            locators,
            company_id_attr,
        })
    }

    pub fn selector(&self, section: Section) -> &Selector {
        // compile() inserts every variant of Section::ALL
        &self.locators[&section].1
    }

    pub fn locator(&self, section: Section) -> &str {
        &self.locators[&section].0
    }

    pub fn company_id_attr(&self) -> &str {
        &self.company_id_attr
    }
}

// ── Page ──────────────────────────────────────────────────────────────────────

/// The section's locator matched nothing on the page.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("section `{0}` not found")]
pub struct SectionNotFound(pub Section);

/// A parsed company page. Read-only once built.
pub struct Page<'m> {
    doc: Html,
    sections: &'m SectionMap,
}

impl<'m> Page<'m> {
    pub fn parse(html: &str, sections: &'m SectionMap) -> Self {
        Self {
            doc: Html::parse_document(html),
            sections,
        }
    }

    /// First element matching the section's locator.
    pub fn find_section(&self, section: Section) -> Result<ElementRef<'_>, SectionNotFound> {
        self.doc
            .select(self.sections.selector(section))
            .next()
            .ok_or(SectionNotFound(section))
    }

    pub fn sections(&self) -> &'m SectionMap {
        self.sections
    }
}

/// Whitespace-trimmed text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
