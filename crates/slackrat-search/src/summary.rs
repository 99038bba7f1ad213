//! Match statistics and the Slack-formatted replies the bot sends.

use std::collections::{BTreeMap, HashMap};

use chrono::{Local, Timelike};

use slackrat_core::types::ChannelInfo;
use slackrat_core::utils::{format_local, format_local_date, truncate_chars};

use crate::outcome::{SearchMatch, SearchSummary, Tally};

const TOP_CONTRIBUTORS: usize = 5;
const TOP_WORDS: usize = 10;
const TOP_CHAT_USERS: usize = 3;

/// Count occurrences, highest first; ties keep first-seen order.
pub fn tally<I>(items: I) -> Vec<Tally>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut order: Vec<Tally> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let label = item.into();
        match index.get(&label) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(label.clone(), order.len());
                order.push(Tally { label, count: 1 });
            }
        }
    }

    // sort_by is stable
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order
}

/// Contributors, frequent words and hour-of-day spread over a set of matches.
///
/// Only matches with a resolved author count as contributors. Words are
/// whitespace-separated, lowercased, longer than three characters, and never
/// the keyword itself.
pub fn summarize(matches: &[SearchMatch], keyword_lower: Option<&str>) -> SearchSummary {
    let authors: Vec<String> = matches
        .iter()
        .filter(|m| m.author.is_some())
        .map(|m| m.author_name.clone())
        .collect();
    let contributors = tally(authors);

    let words = matches.iter().flat_map(|m| {
        m.text()
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() > 3 && Some(*w) != keyword_lower)
            .map(String::from)
            .collect::<Vec<_>>()
    });
    let mut top_words = tally(words);
    top_words.truncate(TOP_WORDS);

    let mut time_distribution = BTreeMap::new();
    for ts in matches.iter().filter_map(|m| m.timestamp) {
        *time_distribution
            .entry(ts.with_timezone(&Local).hour())
            .or_insert(0) += 1;
    }

    SearchSummary {
        total_authors: contributors.len(),
        top_contributors: contributors.into_iter().take(TOP_CONTRIBUTORS).collect(),
        top_words,
        time_distribution,
    }
}

// ─────────────────────────────────────────────
// Chat rendering
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub struct RenderLimits {
    pub max_displayed: usize,
    pub snippet_length: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_displayed: 5,
            snippet_length: 100,
        }
    }
}

/// Reply posted after a chat-triggered search.
pub fn render_chat_summary(
    query: &str,
    channel_name: &str,
    matches: &[SearchMatch],
    limits: RenderLimits,
) -> String {
    let header = format!(":mag: *Search for \"{query}\" in #{channel_name}*\n");
    if matches.is_empty() {
        return format!("{header}\n:x: No messages found.");
    }

    let mut out = header;
    out.push_str(&format!(":bar_chart: *{} messages found*\n\n", matches.len()));

    out.push_str(":busts_in_silhouette: *Top users:*\n");
    for t in tally(matches.iter().map(|m| m.author_name.clone()))
        .into_iter()
        .take(TOP_CHAT_USERS)
    {
        out.push_str(&format!("• {}: {} messages\n", t.label, t.count));
    }

    out.push_str("\n:memo: *Latest messages:*\n");
    for (i, m) in matches.iter().take(limits.max_displayed).enumerate() {
        let when = m.timestamp.map(format_local).unwrap_or_default();
        let snippet = truncate_chars(m.text(), limits.snippet_length);
        out.push_str(&format!("{}. *{}* ({}): {}\n", i + 1, m.author_name, when, snippet));
        if let Some(link) = &m.permalink {
            out.push_str(&format!("   :link: <{link}|View message>\n"));
        }
        out.push('\n');
    }

    if matches.len() > limits.max_displayed {
        out.push_str(&format!(
            "... and {} more messages.\n",
            matches.len() - limits.max_displayed
        ));
    }

    out
}

/// Reply to the `stats #channel` chat command.
pub fn render_channel_stats(info: &ChannelInfo) -> String {
    let members = info
        .num_members
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());
    let created = info
        .created_at()
        .map(format_local_date)
        .unwrap_or_else(|| "unknown".to_string());
    let topic = info.topic_text().unwrap_or("No topic set");

    format!(
        ":bar_chart: *Statistics for #{}*\n\n:busts_in_silhouette: Members: {}\n:date: Created: {}\n:memo: Topic: {}",
        info.name, members, created, topic
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::UNKNOWN_USER;
    use crate::testing::{msg, user};
    use chrono::{TimeZone, Utc};
    use slackrat_core::types::ChannelTopic;

    fn found(author: Option<&str>, text: &str, secs: i64) -> SearchMatch {
        let author = author.map(|n| user(&format!("U_{n}"), n));
        SearchMatch {
            message: msg(&format!("{secs}.000100"), "U", text),
            author_name: author
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| UNKNOWN_USER.to_string()),
            author,
            timestamp: Utc.timestamp_opt(secs, 0).single(),
            permalink: None,
            context: Vec::new(),
            thread_matches: Vec::new(),
        }
    }

    #[test]
    fn test_tally_ties_keep_first_seen_order() {
        let t = tally(["b", "a", "a", "c", "b", "d"]);
        let labels: Vec<&str> = t.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", "c", "d"]);
        assert_eq!(t[0].count, 2);
    }

    #[test]
    fn test_summarize_contributors_skip_unknown() {
        let matches = vec![
            found(Some("Ana"), "deploy ok", 1_700_000_000),
            found(None, "deploy failed", 1_700_000_100),
            found(Some("Ana"), "deploy again", 1_700_000_200),
            found(Some("Bruno"), "deploy reverted", 1_700_000_300),
        ];
        let s = summarize(&matches, Some("deploy"));
        assert_eq!(s.total_authors, 2);
        assert_eq!(s.top_contributors[0], Tally { label: "Ana".into(), count: 2 });
        assert_eq!(s.top_contributors[1].label, "Bruno");
        assert_eq!(s.time_distribution.values().sum::<usize>(), 4);
    }

    #[test]
    fn test_summarize_words() {
        let matches = vec![
            found(Some("Ana"), "Deploy the Release tonight", 1_700_000_000),
            found(Some("Ana"), "release deploy done", 1_700_000_000),
        ];
        let s = summarize(&matches, Some("deploy"));
        assert_eq!(s.top_words[0], Tally { label: "release".into(), count: 2 });
        assert!(s.top_words.iter().all(|t| t.label != "deploy" && t.label != "the"));
        assert!(s.top_words.iter().any(|t| t.label == "tonight"));
        assert!(s.top_words.iter().any(|t| t.label == "done"));
    }

    #[test]
    fn test_summarize_top_words_capped() {
        let text = (0..30).map(|i| format!("word{i:02}")).collect::<Vec<_>>().join(" ");
        let s = summarize(&[found(Some("Ana"), &text, 0)], None);
        assert_eq!(s.top_words.len(), 10);
        assert_eq!(s.top_words[0].label, "word00");
    }

    #[test]
    fn test_render_no_matches() {
        let out = render_chat_summary("deploy", "general", &[], RenderLimits::default());
        assert_eq!(
            out,
            ":mag: *Search for \"deploy\" in #general*\n\n:x: No messages found."
        );
    }

    #[test]
    fn test_render_lists_and_truncates() {
        let long = "x".repeat(150);
        let mut matches: Vec<SearchMatch> = (0..7)
            .map(|i| found(Some(if i % 2 == 0 { "Ana" } else { "Bruno" }), "deploy ok", 1_700_000_000 + i))
            .collect();
        matches[0].message.text = Some(long);
        matches[0].permalink = Some("https://acme.slack.com/archives/C1/p1".into());

        let out = render_chat_summary("deploy", "general", &matches, RenderLimits::default());

        assert!(out.starts_with(":mag: *Search for \"deploy\" in #general*\n:bar_chart: *7 messages found*"));
        assert!(out.contains("• Ana: 4 messages\n• Bruno: 3 messages\n"));
        assert!(out.contains("1. *Ana* ("));
        assert!(out.contains(&format!("{}...", "x".repeat(100))));
        assert!(!out.contains(&"x".repeat(101)));
        assert!(out.contains("   :link: <https://acme.slack.com/archives/C1/p1|View message>\n"));
        assert!(out.contains("5. *Ana*"));
        assert!(!out.contains("6. "));
        assert!(out.ends_with("... and 2 more messages.\n"));
    }

    #[test]
    fn test_render_exactly_max_has_no_tail() {
        let matches: Vec<SearchMatch> = (0..5).map(|i| found(Some("Ana"), "hit", i)).collect();
        let out = render_chat_summary("hit", "general", &matches, RenderLimits::default());
        assert!(!out.contains("more messages"));
    }

    #[test]
    fn test_render_channel_stats() {
        let info = ChannelInfo {
            id: "C1".into(),
            name: "general".into(),
            num_members: Some(42),
            created: Some(1_600_000_000),
            topic: Some(ChannelTopic { value: "Company news".into() }),
            ..Default::default()
        };
        let out = render_channel_stats(&info);
        assert!(out.starts_with(":bar_chart: *Statistics for #general*"));
        assert!(out.contains("Members: 42"));
        assert!(out.contains("Topic: Company news"));

        let bare = ChannelInfo {
            name: "empty".into(),
            ..Default::default()
        };
        let out = render_channel_stats(&bare);
        assert!(out.contains("Topic: No topic set"));
        assert!(out.contains("Created: unknown"));
    }
}
