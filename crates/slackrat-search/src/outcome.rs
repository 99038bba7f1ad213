//! Search options and result types shared by the engine, renderers and exporters.
//!
//! Everything here serializes with camelCase keys; the HTTP API returns these
//! structs as-is.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slackrat_api::traits::MAX_HISTORY_LIMIT;
use slackrat_core::config::SearchConfig;
use slackrat_core::types::{SlackMessage, SlackUser};

use crate::resolver::ResolvedChannel;

/// Label used when a message's author can't be looked up.
pub const UNKNOWN_USER: &str = "Unknown user";

// ─────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// History page size, 1..=1000.
    pub limit: u32,
    pub include_context: bool,
    /// Neighbours on each side of a match.
    pub context_size: usize,
    #[serde(alias = "searchInThreads")]
    pub search_threads: bool,
    /// Unix seconds; only newer messages are fetched.
    pub oldest: Option<f64>,
    /// Unix seconds; only older messages are fetched.
    pub latest: Option<f64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: MAX_HISTORY_LIMIT,
            include_context: true,
            context_size: 2,
            search_threads: true,
            oldest: None,
            latest: None,
        }
    }
}

impl SearchOptions {
    /// Options for API and CLI searches.
    pub fn from_config(cfg: &SearchConfig) -> Self {
        Self {
            limit: cfg.api_history_limit,
            include_context: cfg.include_context,
            context_size: cfg.context_size,
            search_threads: cfg.search_threads,
            ..Self::default()
        }
    }

    /// Lighter options for chat-triggered searches: smaller page, no
    /// context, no thread crawl.
    pub fn for_chat(cfg: &SearchConfig) -> Self {
        Self {
            limit: cfg.bot_history_limit,
            include_context: false,
            context_size: 0,
            search_threads: false,
            ..Self::default()
        }
    }

    /// Clamp `limit` to 1..=1000 and `context_size` to one page.
    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_HISTORY_LIMIT);
        self.context_size = self.context_size.min(MAX_HISTORY_LIMIT as usize);
        self
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.limit,
            self.include_context,
            self.context_size,
            self.search_threads,
            self.oldest.map(|v| format!("{v:.6}")).unwrap_or_default(),
            self.latest.map(|v| format!("{v:.6}")).unwrap_or_default(),
        )
    }
}

// ─────────────────────────────────────────────
// Matches
// ─────────────────────────────────────────────

/// A neighbouring message shown around a match.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMessage {
    pub message: SlackMessage,
    pub author_name: String,
    /// Whether it precedes the match in the history page order.
    pub is_before: bool,
}

/// A thread reply that matches the query too.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadReply {
    pub message: SlackMessage,
    pub author_name: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub message: SlackMessage,
    pub author: Option<SlackUser>,
    pub author_name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub permalink: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub thread_matches: Vec<ThreadReply>,
}

impl SearchMatch {
    pub fn text(&self) -> &str {
        self.message.text_or_empty()
    }
}

// ─────────────────────────────────────────────
// Summary
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub top_contributors: Vec<Tally>,
    pub top_words: Vec<Tally>,
    /// Local hour of day → matches.
    pub time_distribution: BTreeMap<u32, usize>,
    pub total_authors: usize,
}

// ─────────────────────────────────────────────
// Outcomes
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub channel_id: String,
    pub query: String,
    pub total_messages_searched: usize,
    pub matches_found: usize,
    pub results: Vec<SearchMatch>,
    pub summary: SearchSummary,
    pub options: SearchOptions,
    pub searched_at: DateTime<Utc>,
    pub from_cache: bool,
}

/// Result of one channel inside a multi-channel search.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChannelResult {
    Ok {
        channel: ResolvedChannel,
        outcome: SearchOutcome,
    },
    Failed {
        channel: String,
        error: String,
    },
}

/// A match tagged with the channel it came from.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcedMatch {
    pub source_channel: String,
    #[serde(flatten)]
    pub found: SearchMatch,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedOutcome {
    pub query: String,
    pub total_channels: usize,
    pub successful_channels: usize,
    pub failed_channels: usize,
    pub total_matches: usize,
    pub total_messages_searched: usize,
    /// All matches, newest first.
    pub matches: Vec<SourcedMatch>,
    pub channels: Vec<ChannelResult>,
}
