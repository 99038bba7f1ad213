//! Per-user search history, in memory only.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use slackrat_core::utils::format_local;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub keyword: String,
    pub result_count: usize,
}

/// Last `capacity` searches per user; the oldest entry is dropped first.
pub struct SearchHistory {
    capacity: usize,
    entries: Mutex<HashMap<String, VecDeque<HistoryEntry>>>,
}

impl SearchHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, user: &str, entry: HistoryEntry) {
        let mut map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let list = map.entry(user.to_string()).or_default();
        list.push_back(entry);
        while list.len() > self.capacity {
            list.pop_front();
        }
    }

    /// Oldest first. Unknown users get an empty list.
    pub fn entries(&self, user: &str) -> Vec<HistoryEntry> {
        let map = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        map.get(user)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Chat reply for the `history` command.
    pub fn render(&self, user: &str) -> String {
        let entries = self.entries(user);
        if entries.is_empty() {
            return ":memo: You haven't searched anything yet.".to_string();
        }

        let mut out = String::from(":memo: Your latest searches:\n\n");
        for (i, e) in entries.iter().enumerate() {
            out.push_str(&format!(
                "{}. `{}` in #{} ({}) - {} results\n",
                i + 1,
                e.keyword,
                e.channel,
                format_local(e.timestamp),
                e.result_count
            ));
        }
        out
    }
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
