//! Table normalizer: wide statement tables → long-format records.
//!
//! Statement tables put indicators down the first column and periods across
//! the header row:
//!
//! ```text
//!               Mar 2023   Mar 2024
//!   Sales +      1,234.5    1,400.0
//!   OPM %            12%        14%
//! ```
//!
//! Every (indicator, period) cell becomes one [`StatementRecord`].

use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use thiserror::Error;

use crate::models::StatementRecord;

use super::page::text_of;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table has no header row")]
    MissingHeader,

    #[error("row {row} has {found} cells, header has only {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("non-numeric value {raw:?} for {indicator:?} / {period:?}")]
    NonNumeric {
        indicator: String,
        period: String,
        raw: String,
    },
}

/// Rows × columns of trimmed cell text. `header[0]` labels the indicator column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Unpivoted but not yet cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell {
    pub indicator: String,
    pub period: String,
    pub raw: String,
}

// ── Parse ─────────────────────────────────────────────────────────────────────

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("tr selector"));
static THEAD_TR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("thead tr").expect("thead selector"));
static TBODY_TR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody tr").expect("tbody selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("cell selector"));

/// Widest `colspan` honoured; anything larger is markup noise.
const MAX_COLSPAN: usize = 64;

/// Cell texts of a row, with `colspan` cells repeated across their span.
fn cells(tr: ElementRef<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for cell in tr.select(&CELL) {
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1)
            .min(MAX_COLSPAN);
        let text = text_of(cell);
        out.extend(std::iter::repeat_n(text, span));
    }
    out
}

/// Read a `<table>` into a grid. Header is the first row of `thead`, or the
/// first row of the table when there is no `thead`.
pub fn parse_grid(table: ElementRef<'_>) -> Result<Grid, TableError> {
    let header_tr = table
        .select(&THEAD_TR)
        .next()
        .or_else(|| table.select(&TR).next())
        .ok_or(TableError::MissingHeader)?;

    let header = cells(header_tr);
    if header.is_empty() {
        return Err(TableError::MissingHeader);
    }

    // The HTML parser puts every non-header row under an implied <tbody>.
    let mut rows = Vec::new();
    for tr in table.select(&TBODY_TR) {
        if tr.id() == header_tr.id() {
            continue;
        }
        let mut row = cells(tr);
        if row.is_empty() {
            continue;
        }
        // Short rows are padded with blanks, which clean to NaN.
        if row.len() < header.len() {
            row.resize(header.len(), String::new());
        }
        if row.len() > header.len() {
            return Err(TableError::RaggedRow {
                row: rows.len(),
                expected: header.len(),
                found: row.len(),
            });
        }
        rows.push(row);
    }

    Ok(Grid { header, rows })
}

// ── Unpivot ───────────────────────────────────────────────────────────────────

/// Melt the grid: one cell per (row, period column), row-major.
/// An `R × C` grid yields `R × (C - 1)` cells.
pub fn unpivot(grid: &Grid) -> Vec<RawCell> {
    let periods = &grid.header[1..];
    let mut out = Vec::with_capacity(grid.rows.len() * periods.len());

    for row in &grid.rows {
        let indicator = row[0].trim();
        for (period, raw) in periods.iter().zip(&row[1..]) {
            out.push(RawCell {
                indicator: indicator.to_string(),
                period: period.clone(),
                raw: raw.clone(),
            });
        }
    }

    out
}

// ── Clean ─────────────────────────────────────────────────────────────────────

/// Strip `%` and `,` then parse. A blank cell is missing data and maps to NaN.
/// "1,234.5%" → 1234.5 | "" → NaN | "-" → None
pub fn clean_value(raw: &str) -> Option<f64> {
    if raw.trim().is_empty() {
        return Some(f64::NAN);
    }
    let cleaned: String = raw.chars().filter(|c| *c != '%' && *c != ',').collect();
    cleaned.trim().parse().ok()
}

/// Clean every cell and tag it with `symbol`. One bad value fails the lot.
pub fn clean_cells(cells: Vec<RawCell>, symbol: &str) -> Result<Vec<StatementRecord>, TableError> {
    cells
        .into_iter()
        .map(|cell| match clean_value(&cell.raw) {
            Some(value) => Ok(StatementRecord {
                indicator: cell.indicator,
                period: cell.period,
                value,
                symbol: symbol.to_string(),
            }),
            None => Err(TableError::NonNumeric {
                indicator: cell.indicator,
                period: cell.period,
                raw: cell.raw,
            }),
        })
        .collect()
}

/// Parse, unpivot and clean a statement table, dropping any indicator rows
/// listed in `skip` before cleaning.
pub fn normalise_table(
    table: ElementRef<'_>,
    symbol: &str,
    skip: &[&str],
) -> Result<Vec<StatementRecord>, TableError> {
    let grid = parse_grid(table)?;
    let cells = unpivot(&grid)
        .into_iter()
        .filter(|cell| !skip.contains(&cell.indicator.as_str()))
        .collect();
    clean_cells(cells, symbol)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn table(doc: &Html) -> ElementRef<'_> {
        doc.select(&Selector::parse("table").unwrap()).next().unwrap()
    }

    fn html_table(header: &[&str], rows: &[&[&str]]) -> String {
        let mut s = String::from("<table><thead><tr>");
        for h in header {
            s.push_str(&format!("<th>{h}</th>"));
        }
        s.push_str("</tr></thead><tbody>");
        for row in rows {
            s.push_str("<tr>");
            for (i, cell) in row.iter().enumerate() {
                if i == 0 {
                    s.push_str(&format!("<td class=\"text\">{cell}</td>"));
                } else {
                    s.push_str(&format!("<td>{cell}</td>"));
                }
            }
            s.push_str("</tr>");
        }
        s.push_str("</tbody></table>");
        s
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("1,234.5%"), Some(1234.5));
        assert_eq!(clean_value(" -12 "), Some(-12.0));
        assert_eq!(clean_value("14%"), Some(14.0));
        assert_eq!(clean_value("-"), None);
        assert_eq!(clean_value("n/a"), None);
        assert!(clean_value("").unwrap().is_nan());
        assert!(clean_value("   ").unwrap().is_nan());
    }

    #[test]
    fn test_record_count_is_rows_times_periods() {
        for (r, c) in [(1, 2), (3, 2), (4, 5), (10, 13)] {
            let header: Vec<String> = std::iter::once(String::new())
                .chain((1..c).map(|i| format!("Mar {}", 2000 + i)))
                .collect();
            let rows: Vec<Vec<String>> = (0..r)
                .map(|i| {
                    std::iter::once(format!("Metric {i}"))
                        .chain((1..c).map(|j| format!("{},{}0", i, j)))
                        .collect()
                })
                .collect();
            let header_refs: Vec<&str> = header.iter().map(String::as_str).collect();
            let row_refs: Vec<Vec<&str>> = rows
                .iter()
                .map(|row| row.iter().map(String::as_str).collect())
                .collect();
            let row_slices: Vec<&[&str]> = row_refs.iter().map(Vec::as_slice).collect();

            let doc = Html::parse_fragment(&html_table(&header_refs, &row_slices));
            let records = normalise_table(table(&doc), "ACME", &[]).unwrap();

            assert_eq!(records.len(), r * (c - 1), "R={r} C={c}");
            assert!(records.iter().all(|rec| rec.value.is_finite()));
            assert!(records.iter().all(|rec| rec.symbol == "ACME"));
        }
    }

    #[test]
    fn test_unpivot_is_row_major_and_trims_indicators() {
        let doc = Html::parse_fragment(&html_table(
            &["", "Mar 2023", "Mar 2024"],
            &[&["  Sales +  ", "1,000", "1,200"], &["OPM %", "12%", "14%"]],
        ));
        let records = normalise_table(table(&doc), "ACME", &[]).unwrap();

        let flat: Vec<(&str, &str, f64)> = records
            .iter()
            .map(|r| (r.indicator.as_str(), r.period.as_str(), r.value))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("Sales +", "Mar 2023", 1000.0),
                ("Sales +", "Mar 2024", 1200.0),
                ("OPM %", "Mar 2023", 12.0),
                ("OPM %", "Mar 2024", 14.0),
            ]
        );
    }

    #[test]
    fn test_one_bad_value_fails_whole_table() {
        let doc = Html::parse_fragment(&html_table(
            &["", "Mar 2023", "Mar 2024"],
            &[&["Sales", "1,000", "1,200"], &["EPS", "-", "3.1"]],
        ));
        let err = normalise_table(table(&doc), "ACME", &[]).unwrap_err();
        assert_eq!(
            err,
            TableError::NonNumeric {
                indicator: "EPS".into(),
                period: "Mar 2023".into(),
                raw: "-".into(),
            }
        );
    }

    #[test]
    fn test_skipped_rows_are_not_cleaned() {
        let doc = Html::parse_fragment(&html_table(
            &["", "Jun 2024", "Sep 2024"],
            &[
                &["Sales", "10", "11"],
                &["Raw PDF", "<a href=\"/a.pdf\">PDF</a>", "<a href=\"/b.pdf\">PDF</a>"],
            ],
        ));
        let records = normalise_table(table(&doc), "ACME", &["Raw PDF"]).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.indicator != "Raw PDF"));
    }

    #[test]
    fn test_header_without_thead() {
        let doc = Html::parse_fragment(
            "<table><tr><td></td><td>FY24</td></tr><tr><td>Cash</td><td>5</td></tr></table>",
        );
        let grid = parse_grid(table(&doc)).unwrap();
        assert_eq!(grid.header, vec!["", "FY24"]);
        assert_eq!(grid.rows, vec![vec!["Cash".to_string(), "5".to_string()]]);
    }

    #[test]
    fn test_overlong_row_is_rejected() {
        let doc = Html::parse_fragment(&html_table(
            &["", "Mar 2023", "Mar 2024"],
            &[&["Sales", "1", "2", "3"]],
        ));
        assert_eq!(
            parse_grid(table(&doc)).unwrap_err(),
            TableError::RaggedRow {
                row: 0,
                expected: 3,
                found: 4
            }
        );
    }

    #[test]
    fn test_short_row_is_padded_with_nan() {
        let doc = Html::parse_fragment(&html_table(
            &["", "Mar 2023", "Mar 2024"],
            &[&["Sales", "1,000", "1,200"], &["Dividend Payout %", "12%"]],
        ));
        let records = normalise_table(table(&doc), "ACME", &[]).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(records[2].indicator, "Dividend Payout %");
        assert_eq!(records[2].value, 12.0);
        assert_eq!(records[3].period, "Mar 2024");
        assert!(records[3].value.is_nan());
    }

    #[test]
    fn test_colspan_cell_repeats_across_periods() {
        let doc = Html::parse_fragment(
            "<table><thead><tr><th></th><th>Mar 2023</th><th>Mar 2024</th></tr></thead>\
             <tbody><tr><td>Sales</td><td colspan=\"2\">1,000</td></tr></tbody></table>",
        );
        let records = normalise_table(table(&doc), "ACME", &[]).unwrap();

        let flat: Vec<(&str, f64)> = records.iter().map(|r| (r.period.as_str(), r.value)).collect();
        assert_eq!(flat, vec![("Mar 2023", 1000.0), ("Mar 2024", 1000.0)]);
    }

    #[test]
    fn test_colspan_in_header_is_expanded() {
        let doc = Html::parse_fragment(
            "<table><tr><td></td><td colspan=\"2\">FY24</td></tr>\
             <tr><td>Cash</td><td>5</td><td>6</td></tr></table>",
        );
        let grid = parse_grid(table(&doc)).unwrap();
        assert_eq!(grid.header, vec!["", "FY24", "FY24"]);
        assert_eq!(grid.rows[0], vec!["Cash", "5", "6"]);
    }

    #[test]
    fn test_empty_table_has_no_header() {
        let doc = Html::parse_fragment("<table></table>");
        assert_eq!(parse_grid(table(&doc)).unwrap_err(), TableError::MissingHeader);
    }
}
