//! CSV and JSON renderings of the log collection.

use std::fmt::Display;
use std::str::FromStr;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use super::entry::LogEntry;
use crate::error::{DecodingError, Result};

pub const CSV_HEADER: &str = "Date,Time,Project,Description,Time Spent (minutes)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Quote a field if it contains a comma, quote, or line break.
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render entries as CSV, with dates shown in `tz`.
pub fn to_csv<Tz>(entries: &[LogEntry], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let local = entry.date.with_timezone(tz);
        let row = [
            local.format("%Y-%m-%d").to_string(),
            local.format("%H:%M").to_string(),
            csv_escape(&entry.project),
            csv_escape(&entry.description),
            entry
                .time_spent_minutes()
                .map(|m| m.to_string())
                .unwrap_or_default(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

/// Pretty-printed JSON array with sorted keys.
pub fn to_json(entries: &[LogEntry]) -> Result<String> {
    // serde_json::Value objects are BTreeMap-backed, which sorts the keys.
    let value = serde_json::to_value(entries)?;
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn from_json(text: &str) -> std::result::Result<Vec<LogEntry>, DecodingError> {
    serde_json::from_str(text).map_err(|source| DecodingError {
        what: "log entries".into(),
        source,
    })
}
