//! Utility helpers: path resolution, date formatting, string manipulation.

use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;

/// Get the SlackRat data directory (e.g. `~/.slackrat/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".slackrat")
}

/// REPL history file (e.g. `~/.slackrat/repl_history`).
pub fn get_repl_history_path() -> PathBuf {
    get_data_path().join("repl_history")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Render a UTC instant in local time as `dd/mm/YYYY HH:MM:SS`.
pub fn format_local(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string()
}

/// Render a UTC instant in local time as `dd/mm/YYYY`.
pub fn format_local_date(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%d/%m/%Y").to_string()
}

/// Keep the first `max_chars` characters, appending `...` when anything was cut.
/// Unicode-safe.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...", &s[..idx]),
    }
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(rest)
    } else if path == "~" {
        home_dir().unwrap_or_else(|| PathBuf::from("."))
    } else {
        PathBuf::from(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}
