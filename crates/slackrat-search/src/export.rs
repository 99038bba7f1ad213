//! CSV and JSON export of search results.

use std::str::FromStr;

use serde::Serialize;

use crate::outcome::{SearchMatch, SearchOutcome, UNKNOWN_USER};

const CSV_HEADER: &str = "Timestamp,Author,Message,Channel,Link";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown format '{other}' (expected text, json or csv)")),
        }
    }
}

/// Every field double-quoted, inner quotes doubled, line breaks flattened.
fn csv_field(value: &str) -> String {
    let flat = value.replace("\r\n", " ").replace(['\n', '\r'], " ");
    format!("\"{}\"", flat.replace('"', "\"\""))
}

fn csv_author(m: &SearchMatch) -> &str {
    match (&m.author, m.message.user.as_deref()) {
        (Some(_), _) => &m.author_name,
        (None, Some(id)) => id,
        (None, None) => UNKNOWN_USER,
    }
}

/// One row per match; the timestamp is RFC 3339 UTC.
pub fn to_csv(outcome: &SearchOutcome) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for m in &outcome.results {
        let row = [
            m.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
            csv_author(m).to_string(),
            m.text().to_string(),
            outcome.channel_id.clone(),
            m.permalink.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
