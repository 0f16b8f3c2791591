use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use screener_scraper::output::{Format, write_records};
use screener_scraper::scraper::page::Section;
use screener_scraper::scraper::parsers::Statement;
use screener_scraper::{AppConfig, Company, CompanyRequest, ScreenerScraper};

#[derive(Parser)]
#[command(name = "screener-scraper", about = "Company financials from screener.in", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv", global = true)]
    format: Format,
}

#[derive(clap::Args)]
struct RequestArgs {
    /// Read timeout in seconds (also the cooldown after a 429)
    #[arg(long)]
    timeout: Option<u64>,

    /// How many times to retry after a 429
    #[arg(long)]
    retries: Option<u32>,

    /// Fetch standalone instead of consolidated statements
    #[arg(long)]
    standalone: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape company pages and print their datasets
    Company {
        /// Ticker symbols, e.g. TCS INFY
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Only print this dataset
        #[arg(short, long, value_enum, default_value = "all")]
        dataset: DatasetArg,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Print the daily price / volume / DMA series for a company
    Quote {
        ticker: String,

        /// Window in days (default from config)
        #[arg(short, long)]
        days: Option<u32>,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Show the configured section locators
    Sections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DatasetArg {
    All,
    BasicInfo,
    ProsCons,
    QuarterlyResults,
    ProfitLoss,
    BalanceSheet,
    CashFlow,
    Ratios,
    Shareholding,
}

impl DatasetArg {
    fn statement(self) -> Option<Statement> {
        match self {
            DatasetArg::QuarterlyResults => Some(Statement::QuarterlyResults),
            DatasetArg::ProfitLoss => Some(Statement::ProfitLoss),
            DatasetArg::BalanceSheet => Some(Statement::BalanceSheet),
            DatasetArg::CashFlow => Some(Statement::CashFlow),
            DatasetArg::Ratios => Some(Statement::Ratios),
            DatasetArg::Shareholding => Some(Statement::Shareholding),
            DatasetArg::All | DatasetArg::BasicInfo | DatasetArg::ProsCons => None,
        }
    }
}

impl RequestArgs {
    fn apply(&self, mut request: CompanyRequest) -> CompanyRequest {
        if let Some(secs) = self.timeout {
            request.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            request.max_retries = retries;
        }
        if self.standalone {
            request.consolidated = false;
        }
        request
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "screener_scraper=info,warn",
        1 => "screener_scraper=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    let scraper = ScreenerScraper::new(&config).context("Failed to build scraper")?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Company {
            tickers,
            dataset,
            request,
        } => {
            let mut failed = 0usize;
            for ticker in &tickers {
                let company = scraper.load(request.apply(scraper.request(ticker))).await;
                if !company.is_loaded() {
                    failed += 1;
                    continue;
                }
                print_company(&mut out, &company, dataset, cli.format)?;
            }
            info!("Done: {} companies, {} failed", tickers.len(), failed);
            if failed == tickers.len() {
                bail!("no company page could be fetched");
            }
        }

        Command::Quote {
            ticker,
            days,
            request,
        } => {
            let req = request.apply(scraper.request(&ticker));
            let retries = req.max_retries;
            let company = scraper.load(req).await;
            if let Some(e) = company.load_error() {
                bail!("{}: {}", ticker, e);
            }

            let days = days.unwrap_or(config.quote.days);
            let series = company
                .daily_quote(days, retries)
                .await
                .with_context(|| format!("daily quote for {}", ticker))?;
            write_records(&mut out, cli.format, "daily_quote", &series)?;
        }

        Command::Sections => {
            let sections = scraper.sections();
            for section in Section::ALL {
                writeln!(out, "{:<16} {}", section.name(), sections.locator(section))?;
            }
            writeln!(out, "{:<16} [{}]", "company_id", sections.company_id_attr())?;
        }
    }

    Ok(())
}

fn print_company<W: Write>(
    out: &mut W,
    company: &Company,
    dataset: DatasetArg,
    format: Format,
) -> Result<()> {
    let wanted = |d: DatasetArg| dataset == DatasetArg::All || dataset == d;

    if wanted(DatasetArg::BasicInfo) {
        match company.basic_info() {
            Some(records) => write_records(out, format, "basic_info", records)?,
            None => warn!("{}: basic_info unavailable", company.ticker()),
        }
    }
    if wanted(DatasetArg::ProsCons) {
        match company.pros_cons() {
            Some(records) => write_records(out, format, "pros_cons", records)?,
            None => warn!("{}: pros_cons unavailable", company.ticker()),
        }
    }

    for statement in Statement::ALL {
        let arg = match dataset {
            DatasetArg::All => statement,
            other => match other.statement() {
                Some(s) if s == statement => s,
                _ => continue,
            },
        };
        let title = screener_scraper::Dataset::Statement(arg).name();
        match company.statement(arg) {
            Some(records) => write_records(out, format, title, records)?,
            None => warn!("{}: {} unavailable", company.ticker(), title),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_timeout_flag_has_no_env_fallback() {
        let cli = Cli::command();
        for name in ["company", "quote"] {
            let sub = cli.find_subcommand(name).unwrap();
            let timeout = sub
                .get_arguments()
                .find(|a| a.get_id() == "timeout")
                .unwrap();
            assert!(timeout.get_env().is_none(), "{name} --timeout");
        }
    }

    #[test]
    fn test_timeout_flag_overrides_request() {
        let cli = Cli::try_parse_from(["screener-scraper", "quote", "TCS", "--timeout", "7"]).unwrap();
        let Command::Quote { request, .. } = cli.command else {
            panic!("expected quote subcommand");
        };
        let req = request.apply(CompanyRequest::new("TCS", &Default::default()));
        assert_eq!(req.timeout, Duration::from_secs(7));
        assert_eq!(req.max_retries, 2);
    }
}
