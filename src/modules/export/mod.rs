//! Export of list results as CSV or JSON
//!
//! Writers take any `io::Write`, so the CLI can target stdout or a file
//! under the data directory (`<data dir>/exports/`).

mod csv_export;
mod json_export;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;

pub use csv_export::{write_events, write_relay_attempts, write_transactions};
pub use json_export::write_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }
}

/// Get the export directory path, creating it if needed
pub fn export_dir() -> Result<PathBuf> {
    let dir = crate::config::data_dir()
        .map(|dir| dir.join("exports"))
        .unwrap_or_else(|| PathBuf::from(".chainlens").join("exports"));
    fs::create_dir_all(&dir).with_context(|| format!("create dir {}", dir.display()))?;
    Ok(dir)
}

/// Timestamped file name, e.g. `transfer-events-2024-05-01-120000.csv`
pub fn generate_filename(prefix: &str, format: Format) -> String {
    let timestamp = Local::now().format("%Y-%m-%d-%H%M%S");
    format!("{}-{}.{}", prefix, timestamp, format.extension())
}
