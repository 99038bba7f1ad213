//! Text analytics and channel activity.
//!
//! The sentiment scorer is a fixed-wordlist counter: +1 per positive word,
//! −1 per negative word, neutral words only add to the word count. Word lists
//! cover Portuguese and English.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use slackrat_api::traits::MAX_HISTORY_LIMIT;
use slackrat_api::{HistoryQuery, SlackApi};

use crate::error::SearchError;
use crate::outcome::Tally;
use crate::summary::tally;

const POSITIVE: &[&str] = &[
    "ótimo", "otimo", "bom", "excelente", "perfeito", "sucesso", "parabéns", "parabens", "legal",
    "incrível", "incrivel", "fantástico", "fantastico", "great", "good", "excellent", "perfect",
    "success", "congrats", "congratulations", "awesome", "amazing", "fantastic", "nice",
];

const NEGATIVE: &[&str] = &[
    "problema", "erro", "falha", "bug", "quebrou", "ruim", "terrível", "terrivel", "horrível",
    "horrivel", "péssimo", "pessimo", "problem", "error", "failure", "failed", "broken", "broke",
    "bad", "terrible", "horrible", "awful",
];

const NEUTRAL: &[&str] = &[
    "ok", "certo", "entendi", "claro", "sim", "não", "nao", "okay", "sure", "right", "yes", "no",
    "understood",
];

const STOP_WORDS: &[&str] = &[
    "de", "da", "do", "em", "na", "no", "para", "com", "por", "que", "uma", "um", "é", "são",
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were", "have", "has",
    "but", "not", "you", "your",
];

const TOP_FREQUENT_WORDS: usize = 20;

// ─────────────────────────────────────────────
// Sentiment
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub score: i64,
    pub sentiment: SentimentLabel,
    /// |score| / word_count, 0 when no listed word occurs.
    pub confidence: f64,
    /// Listed words (positive, negative or neutral) found.
    pub word_count: usize,
}

/// Lowercase runs of Unicode alphanumerics.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

pub fn analyze_sentiment(text: &str) -> Sentiment {
    let mut score = 0i64;
    let mut word_count = 0usize;

    for token in tokens(text) {
        let t = token.as_str();
        if POSITIVE.contains(&t) {
            score += 1;
            word_count += 1;
        } else if NEGATIVE.contains(&t) {
            score -= 1;
            word_count += 1;
        } else if NEUTRAL.contains(&t) {
            word_count += 1;
        }
    }

    let sentiment = match score {
        s if s > 0 => SentimentLabel::Positive,
        s if s < 0 => SentimentLabel::Negative,
        _ => SentimentLabel::Neutral,
    };

    Sentiment {
        score,
        sentiment,
        confidence: if word_count > 0 {
            score.unsigned_abs() as f64 / word_count as f64
        } else {
            0.0
        },
        word_count,
    }
}

// ─────────────────────────────────────────────
// Word frequency
// ─────────────────────────────────────────────

/// Top 20 words longer than two characters, skipping stop words and `exclude`.
pub fn word_frequency(text: &str, exclude: &[&str]) -> Vec<Tally> {
    let exclude: HashSet<String> = exclude.iter().map(|w| w.to_lowercase()).collect();
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();

    let words = cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .filter(|w| !STOP_WORDS.contains(w) && !exclude.contains(*w))
        .map(String::from)
        .collect::<Vec<_>>();

    let mut top = tally(words);
    top.truncate(TOP_FREQUENT_WORDS);
    top
}

// ─────────────────────────────────────────────
// Channel activity
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub is_bot: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelActivity {
    pub channel_id: String,
    pub days: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_messages: usize,
    pub unique_users: usize,
    /// Rounded to one decimal.
    pub average_messages_per_day: f64,
}

fn window_query(
    channel: &str,
    days: u32,
    now: DateTime<Utc>,
) -> Result<(HistoryQuery, DateTime<Utc>), SearchError> {
    if days == 0 {
        return Err(SearchError::InvalidWindow("days must be at least 1".into()));
    }
    let start = now - Duration::days(i64::from(days));
    let query = HistoryQuery::new(channel, MAX_HISTORY_LIMIT)
        .oldest(Some(start.timestamp() as f64))
        .latest(Some(now.timestamp() as f64));
    Ok((query, start))
}

/// Message counts and averages over the last `days` days (one history page).
pub async fn channel_activity(
    api: &Arc<dyn SlackApi>,
    channel: &str,
    days: u32,
    now: DateTime<Utc>,
) -> Result<ChannelActivity, SearchError> {
    let (query, start) = window_query(channel, days, now)?;
    let messages = api.conversation_history(&query).await?;

    let unique_users = messages
        .iter()
        .filter_map(|m| m.user.as_deref())
        .collect::<HashSet<_>>()
        .len();
    let average = (messages.len() as f64 / f64::from(days) * 10.0).round() / 10.0;

    debug!(channel, days, total = messages.len(), "Computed channel activity");

    Ok(ChannelActivity {
        channel_id: channel.to_string(),
        days,
        start,
        end: now,
        total_messages: messages.len(),
        unique_users,
        average_messages_per_day: average,
    })
}

/// Posters over the last `days` days, most active first.
///
/// Users whose `users.info` lookup fails are left out.
pub async fn active_users(
    api: &Arc<dyn SlackApi>,
    channel: &str,
    days: u32,
    now: DateTime<Utc>,
) -> Result<Vec<ActiveUser>, SearchError> {
    let (query, _) = window_query(channel, days, now)?;
    let messages = api.conversation_history(&query).await?;

    let counts = tally(messages.iter().filter_map(|m| m.user.clone()));

    let mut users = Vec::with_capacity(counts.len());
    for Tally { label: user_id, count } in counts {
        match api.user_info(&user_id).await {
            Ok(u) => users.push(ActiveUser {
                name: u.display_name().to_string(),
                id: user_id,
                message_count: count,
                is_bot: u.is_bot,
            }),
            Err(e) => warn!(user = %user_id, error = %e, "Skipping user, lookup failed"),
        }
    }

    Ok(users)
}
