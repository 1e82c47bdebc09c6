//! Export of comparison table data as CSV or JSON files.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::payload::{TablePayload, TYPE_COMPARISON_DATA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{other}' (expected csv or json)")),
        }
    }
}

#[derive(Debug)]
pub enum ExportError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(serde_json::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Io { path, source } => {
                write!(f, "Failed to write export to {}: {}", path.display(), source)
            }
            ExportError::Serialize(source) => write!(f, "Failed to serialize export: {source}"),
        }
    }
}

impl StdError for ExportError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExportError::Io { source, .. } => Some(source),
            ExportError::Serialize(source) => Some(source),
        }
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| escape_csv(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Header line followed by one line per row, joined with `\n`.
pub fn to_csv(table: &TablePayload) -> String {
    std::iter::once(csv_line(&table.headers))
        .chain(table.rows.iter().map(|row| csv_line(row)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct TaggedTable<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    table: &'a TablePayload,
}

/// Pretty JSON document carrying the `comparison_data` tag.
pub fn to_json(table: &TablePayload) -> Result<String, ExportError> {
    serde_json::to_string_pretty(&TaggedTable {
        kind: TYPE_COMPARISON_DATA,
        table,
    })
    .map_err(ExportError::Serialize)
}

pub fn render(table: &TablePayload, format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => Ok(to_csv(table)),
        ExportFormat::Json => to_json(table),
    }
}

pub fn export_file_name(format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "sweetscout_comparison_{}.{}",
        at.timestamp_millis(),
        format.extension()
    )
}

/// Writes the table into `dir` under a timestamped name and returns the
/// path. The file only appears once fully written.
pub fn write_export(
    table: &TablePayload,
    format: ExportFormat,
    dir: &Path,
    at: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let contents = render(table, format)?;
    let path = dir.join(export_file_name(format, at));
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut temp_file = NamedTempFile::new_in(dir).map_err(io_err)?;
    temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
    temp_file.as_file_mut().sync_all().map_err(io_err)?;
    temp_file
        .persist(&path)
        .map_err(|err| io_err(err.error))?;
    Ok(path)
}
