//! Dataset rendering for the CLI. Everything goes to the given writer.

use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

/// Write `records` as CSV (with header row) or as a JSON array.
/// `title` is printed as a comment line above CSV output.
pub fn write_records<W: Write, T: Serialize>(
    out: &mut W,
    format: Format,
    title: &str,
    records: &[T],
) -> Result<()> {
    match format {
        Format::Csv => {
            writeln!(out, "# {title}")?;
            let mut writer = csv::Writer::from_writer(&mut *out);
            for record in records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
    }
    Ok(())
}
