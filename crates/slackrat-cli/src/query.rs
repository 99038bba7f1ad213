//! One-shot queries: `search`, `channels`, `stats` and `active-users`.
//!
//! These talk to Slack directly through the search engine; no bot, bus or
//! gateway is started.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Args;
use colored::Colorize;

use slackrat_core::config::load_config;
use slackrat_core::utils::{format_local, format_local_date, truncate_chars};
use slackrat_search::analysis::{active_users as load_active_users, analyze_sentiment, channel_activity, word_frequency};
use slackrat_search::export::{to_csv, to_json, ExportFormat};
use slackrat_search::outcome::ChannelResult;
use slackrat_search::{ChannelRef, CombinedOutcome, Matcher, SearchEngine, SearchOptions, SearchOutcome};

use crate::helpers;

/// Characters of message text shown per match in text output.
const TEXT_SNIPPET: usize = 200;

// ─────────────────────────────────────────────
// search
// ─────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Keywords (or patterns with --regex); each is searched separately
    #[arg(required = true)]
    pub keywords: Vec<String>,

    /// Channel to search (name, #name or ID); repeat for several
    #[arg(short, long = "channel", required = true)]
    pub channels: Vec<String>,

    /// Treat keywords as regular expressions
    #[arg(long, default_value_t = false)]
    pub regex: bool,

    /// Case-sensitive regex matching
    #[arg(long, default_value_t = false)]
    pub case_sensitive: bool,

    /// History messages fetched per channel (1-1000)
    #[arg(long)]
    pub limit: Option<u32>,

    /// Neighbouring messages shown on each side of a match (0 disables)
    #[arg(long)]
    pub context: Option<usize>,

    /// Skip thread replies
    #[arg(long, default_value_t = false)]
    pub no_threads: bool,

    /// Only messages from the last N days
    #[arg(long)]
    pub since: Option<u32>,

    /// Output format: text, json or csv
    #[arg(short, long, default_value = "text")]
    pub format: ExportFormat,

    /// Add sentiment and word frequency of the matched messages
    #[arg(long, default_value_t = false)]
    pub analyze: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub logs: bool,
}

impl SearchArgs {
    fn matchers(&self) -> Result<Vec<Matcher>> {
        self.keywords
            .iter()
            .map(|k| {
                if self.regex {
                    Matcher::pattern(k, self.case_sensitive).map_err(anyhow::Error::from)
                } else {
                    Ok(Matcher::keyword(k))
                }
            })
            .collect()
    }

    fn options(&self, base: SearchOptions) -> SearchOptions {
        let mut opts = base;
        if let Some(limit) = self.limit {
            opts.limit = limit;
        }
        if let Some(context) = self.context {
            opts.context_size = context;
            opts.include_context = context > 0;
        }
        if self.no_threads {
            opts.search_threads = false;
        }
        opts
    }
}

pub async fn search(args: SearchArgs) -> Result<()> {
    let config = load_config(None);
    let client = helpers::build_client(&config)?;
    let engine = helpers::build_engine(&config, client);

    if args.since == Some(0) {
        bail!("--since must be at least 1 day");
    }
    let matchers = args.matchers()?;
    let options = args.options(SearchOptions::from_config(&config.search));

    let outcomes = if args.channels.len() == 1 {
        search_one_channel(&engine, &args, &matchers, options).await?
    } else {
        search_many_channels(&engine, &args, &matchers, options).await
    };

    let rendered = match args.format {
        ExportFormat::Json => render_json(&outcomes)?,
        ExportFormat::Csv => render_csv(&outcomes),
        ExportFormat::Text => render_text(&outcomes, args.analyze),
    };
    print!("{rendered}");
    Ok(())
}

/// What one keyword produced across the searched channels.
enum Found {
    Single(SearchOutcome),
    Combined(CombinedOutcome),
    Failed { query: String, error: String },
}

async fn search_one_channel(
    engine: &Arc<SearchEngine>,
    args: &SearchArgs,
    matchers: &[Matcher],
    options: SearchOptions,
) -> Result<Vec<Found>> {
    let channel = ChannelRef::parse(&args.channels[0]);
    let resolved = engine
        .resolver()
        .resolve(&channel)
        .await
        .with_context(|| format!("cannot search {channel}"))?;

    if let Some(days) = args.since {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));
        let mut found = Vec::with_capacity(matchers.len());
        for matcher in matchers {
            let result = engine
                .search_in_range(&resolved.id, matcher, start, end, options.clone())
                .await;
            found.push(match result {
                Ok(outcome) => Found::Single(outcome),
                Err(e) => Found::Failed {
                    query: matcher.describe(),
                    error: e.to_string(),
                },
            });
        }
        return Ok(found);
    }

    Ok(engine
        .search_keywords(&resolved.id, matchers, options)
        .await
        .into_iter()
        .map(|(query, result)| match result {
            Ok(outcome) => Found::Single(outcome),
            Err(e) => Found::Failed {
                query,
                error: e.to_string(),
            },
        })
        .collect())
}

async fn search_many_channels(
    engine: &Arc<SearchEngine>,
    args: &SearchArgs,
    matchers: &[Matcher],
    mut options: SearchOptions,
) -> Vec<Found> {
    if let Some(days) = args.since {
        let now = Utc::now();
        options.oldest = Some((now - Duration::days(i64::from(days))).timestamp() as f64);
        options.latest = Some(now.timestamp() as f64);
    }
    let channels: Vec<ChannelRef> = args.channels.iter().map(|c| ChannelRef::parse(c)).collect();

    let mut found = Vec::with_capacity(matchers.len());
    for matcher in matchers {
        let combined = engine
            .search_channels(&channels, matcher, options.clone())
            .await;
        found.push(Found::Combined(combined));
    }
    found
}

// ─────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────

fn render_json(found: &[Found]) -> Result<String> {
    let values: Vec<serde_json::Value> = found
        .iter()
        .map(|f| match f {
            Found::Single(o) => serde_json::to_value(o),
            Found::Combined(c) => serde_json::to_value(c),
            Found::Failed { query, error } => Ok(serde_json::json!({
                "query": query,
                "error": error,
            })),
        })
        .collect::<Result<_, _>>()?;

    let out = if values.len() == 1 {
        to_json(&values[0])?
    } else {
        to_json(&values)?
    };
    Ok(format!("{out}\n"))
}

/// All matches of every keyword as one CSV document, header once.
fn render_csv(found: &[Found]) -> String {
    let mut out = String::new();
    for f in found {
        let outcomes: Vec<&SearchOutcome> = match f {
            Found::Single(o) => vec![o],
            Found::Combined(c) => c
                .channels
                .iter()
                .filter_map(|r| match r {
                    ChannelResult::Ok { outcome, .. } => Some(outcome),
                    ChannelResult::Failed { .. } => None,
                })
                .collect(),
            Found::Failed { .. } => Vec::new(),
        };
        for outcome in outcomes {
            let csv = to_csv(outcome);
            // Rows are copied verbatim; only the first line is the header.
            let (header, rows) = csv.split_once('\n').unwrap_or((csv.as_str(), ""));
            if out.is_empty() {
                out.push_str(header);
                out.push('\n');
            }
            out.push_str(rows);
        }
    }
    out
}

fn render_text(found: &[Found], analyze: bool) -> String {
    let mut out = String::new();
    for f in found {
        match f {
            Found::Single(outcome) => render_outcome(&mut out, outcome, None, analyze),
            Found::Combined(combined) => render_combined(&mut out, combined, analyze),
            Found::Failed { query, error } => {
                out.push_str(&format!("\n{} {}: {}\n", "✗".red(), query.bold(), error));
            }
        }
    }
    out
}

fn render_outcome(out: &mut String, outcome: &SearchOutcome, channel: Option<&str>, analyze: bool) {
    let label = channel.unwrap_or(&outcome.channel_id);
    out.push_str(&format!(
        "\n{} \"{}\" in #{} — {} of {} messages{}\n",
        "🔍".bold(),
        outcome.query.bold(),
        label,
        outcome.matches_found.to_string().green(),
        outcome.total_messages_searched,
        if outcome.from_cache {
            " (cached)".dimmed().to_string()
        } else {
            String::new()
        }
    ));

    for m in &outcome.results {
        let when = m.timestamp.map(format_local).unwrap_or_default();
        out.push_str(&format!(
            "  {} {}  {}\n",
            when.dimmed(),
            m.author_name.cyan(),
            truncate_chars(&m.text().replace('\n', " "), TEXT_SNIPPET)
        ));
        for ctx in &m.context {
            out.push_str(&format!(
                "      {} {}\n",
                ctx.author_name.dimmed(),
                truncate_chars(ctx.message.text_or_empty(), TEXT_SNIPPET).dimmed()
            ));
        }
        for reply in &m.thread_matches {
            out.push_str(&format!(
                "    ↳ {}  {}\n",
                reply.author_name.cyan(),
                truncate_chars(reply.message.text_or_empty(), TEXT_SNIPPET)
            ));
        }
        if let Some(link) = &m.permalink {
            out.push_str(&format!("      {}\n", link.dimmed()));
        }
    }

    if !outcome.summary.top_contributors.is_empty() {
        let who: Vec<String> = outcome
            .summary
            .top_contributors
            .iter()
            .map(|t| format!("{} ({})", t.label, t.count))
            .collect();
        out.push_str(&format!("  {} {}\n", "Top:".bold(), who.join(", ")));
    }

    if analyze && !outcome.results.is_empty() {
        let texts: Vec<&str> = outcome.results.iter().map(|m| m.text()).collect();
        render_analysis(out, &texts.join("\n"), plain_keyword(&outcome.query));
    }
}

fn render_combined(out: &mut String, combined: &CombinedOutcome, analyze: bool) {
    out.push_str(&format!(
        "\n{} \"{}\" in {} channels — {} matches ({} ok, {} failed)\n",
        "🔍".bold(),
        combined.query.bold(),
        combined.total_channels,
        combined.total_matches.to_string().green(),
        combined.successful_channels,
        combined.failed_channels
    ));
    for result in &combined.channels {
        match result {
            ChannelResult::Ok { channel, outcome } => {
                render_outcome(out, outcome, Some(&channel.name), analyze)
            }
            ChannelResult::Failed { channel, error } => {
                out.push_str(&format!("  {} #{}: {}\n", "✗".red(), channel, error));
            }
        }
    }
}

fn render_analysis(out: &mut String, text: &str, keyword: Option<&str>) {
    let sentiment = analyze_sentiment(text);
    out.push_str(&format!(
        "  {} {:?} (score {}, confidence {:.2})\n",
        "Sentiment:".bold(),
        sentiment.sentiment,
        sentiment.score,
        sentiment.confidence
    ));

    let exclude: Vec<&str> = keyword.into_iter().collect();
    let words: Vec<String> = word_frequency(text, &exclude)
        .into_iter()
        .take(10)
        .map(|t| format!("{} ({})", t.label, t.count))
        .collect();
    if !words.is_empty() {
        out.push_str(&format!("  {} {}\n", "Words:".bold(), words.join(", ")));
    }
}

/// The plain keyword searched for, left out of word counts. Patterns have none.
fn plain_keyword(query: &str) -> Option<&str> {
    if query.len() > 1 && query.starts_with('/') && query.ends_with('/') {
        None
    } else {
        Some(query)
    }
}

// ─────────────────────────────────────────────
// channels / stats / active-users
// ─────────────────────────────────────────────

pub async fn channels() -> Result<()> {
    let config = load_config(None);
    let client = helpers::build_client(&config)?;
    let engine = helpers::build_engine(&config, client);

    let channels = engine.list_available().await;
    println!();
    println!("{} {} channels", "📋".bold(), channels.len());
    for ch in &channels {
        println!(
            "  {:<28} {:<12} {:>6} members  {}{}",
            format!("#{}", ch.name),
            ch.id.dimmed(),
            ch.member_count,
            if ch.is_private { "🔒 " } else { "" },
            if ch.is_member {
                "member".green().to_string()
            } else {
                "not a member".dimmed().to_string()
            }
        );
    }
    println!();
    Ok(())
}

pub async fn stats(channel: &str, days: u32) -> Result<()> {
    let config = load_config(None);
    let client = helpers::build_client(&config)?;
    let engine = helpers::build_engine(&config, client);

    let resolved = engine
        .resolver()
        .resolve(&ChannelRef::parse(channel))
        .await?;
    let activity = channel_activity(engine.api(), &resolved.id, days, Utc::now()).await?;

    println!();
    println!("{} #{}", "📊".bold(), resolved.name.bold());
    println!(
        "  {:<18} {} → {}",
        "Window:".bold(),
        format_local_date(activity.start),
        format_local_date(activity.end)
    );
    println!("  {:<18} {}", "Messages:".bold(), activity.total_messages);
    println!("  {:<18} {}", "Unique users:".bold(), activity.unique_users);
    println!(
        "  {:<18} {:.1}",
        "Per day:".bold(),
        activity.average_messages_per_day
    );
    println!();
    Ok(())
}

pub async fn active_users(channel: &str, days: u32) -> Result<()> {
    let config = load_config(None);
    let client = helpers::build_client(&config)?;
    let engine = helpers::build_engine(&config, client);

    let resolved = engine
        .resolver()
        .resolve(&ChannelRef::parse(channel))
        .await?;
    let users = load_active_users(engine.api(), &resolved.id, days, Utc::now()).await?;

    println!();
    println!(
        "{} #{} — last {} days",
        "👥".bold(),
        resolved.name.bold(),
        days
    );
    if users.is_empty() {
        println!("  {}", "(no messages)".dimmed());
    }
    for (n, u) in users.iter().enumerate() {
        println!(
            "  {:>2}. {:<28} {:>5} messages{}",
            n + 1,
            u.name,
            u.message_count,
            if u.is_bot { " 🤖" } else { "" }
        );
    }
    println!();
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrap {
        #[command(flatten)]
        args: SearchArgs,
    }

    fn parse(argv: &[&str]) -> SearchArgs {
        let mut full = vec!["test"];
        full.extend_from_slice(argv);
        Wrap::try_parse_from(full).unwrap().args
    }

    fn outcome(channel: &str, query: &str) -> SearchOutcome {
        SearchOutcome {
            channel_id: channel.into(),
            query: query.into(),
            total_messages_searched: 0,
            matches_found: 0,
            results: Vec::new(),
            summary: Default::default(),
            options: SearchOptions::default(),
            searched_at: Utc::now(),
            from_cache: false,
        }
    }

    #[test]
    fn test_options_override_defaults() {
        let args = parse(&["deploy", "-c", "general", "--limit", "50", "--context", "0", "--no-threads"]);
        let opts = args.options(SearchOptions::default());
        assert_eq!(opts.limit, 50);
        assert_eq!(opts.context_size, 0);
        assert!(!opts.include_context);
        assert!(!opts.search_threads);
    }

    #[test]
    fn test_options_keep_defaults() {
        let args = parse(&["deploy", "-c", "general"]);
        assert_eq!(args.options(SearchOptions::default()), SearchOptions::default());
    }

    #[test]
    fn test_matchers_keyword_and_regex() {
        let args = parse(&["Deploy", "-c", "general"]);
        let m = args.matchers().unwrap();
        assert_eq!(m[0].describe(), "Deploy");
        assert!(m[0].is_match("we DEPLOY today"));

        let args = parse(&["^dep", "-c", "general", "--regex", "--case-sensitive"]);
        let m = args.matchers().unwrap();
        assert!(m[0].is_match("deploy"));
        assert!(!m[0].is_match("Deploy"));

        let args = parse(&["(", "-c", "general", "--regex"]);
        assert!(args.matchers().is_err());
    }

    #[test]
    fn test_format_parses() {
        let args = parse(&["x", "-c", "g", "--format", "csv"]);
        assert_eq!(args.format, ExportFormat::Csv);
        assert!(Wrap::try_parse_from(["test", "x", "-c", "g", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_csv_header_written_once() {
        let found = vec![
            Found::Single(outcome("C1", "a")),
            Found::Single(outcome("C2", "b")),
            Found::Failed {
                query: "c".into(),
                error: "boom".into(),
            },
        ];
        let csv = render_csv(&found);
        assert_eq!(csv, "Timestamp,Author,Message,Channel,Link\n");
    }

    #[test]
    fn test_csv_rows_kept_verbatim() {
        use slackrat_core::types::SlackMessage;
        use slackrat_search::outcome::SearchMatch;

        let hit = |channel: &str, text: &str| {
            let mut o = outcome(channel, "deploy");
            o.results.push(SearchMatch {
                message: SlackMessage {
                    ts: "1700000000.000100".into(),
                    user: Some("U1".into()),
                    text: Some(text.into()),
                    ..Default::default()
                },
                author: None,
                author_name: "U1".into(),
                timestamp: None,
                permalink: None,
                context: Vec::new(),
                thread_matches: Vec::new(),
            });
            o.matches_found = 1;
            o
        };
        let first = hit("C1", "say \"deploy\", then\r\nwait");
        let second = hit("C2", "deploy, again");

        let expected = format!(
            "{}{}",
            to_csv(&first),
            to_csv(&second).split_once('\n').unwrap().1
        );
        let csv = render_csv(&[Found::Single(first), Found::Single(second)]);
        assert_eq!(csv, expected);
        assert_eq!(csv.matches("Timestamp,Author").count(), 1);
    }

    #[test]
    fn test_json_single_is_object() {
        let json = render_json(&[Found::Single(outcome("C1", "deploy"))]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["channelId"], "C1");

        let json = render_json(&[
            Found::Single(outcome("C1", "a")),
            Found::Failed {
                query: "b".into(),
                error: "nope".into(),
            },
        ])
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 2);
        assert_eq!(v[1]["error"], "nope");
    }

    #[test]
    fn test_text_reports_failures() {
        colored::control::set_override(false);
        let text = render_text(
            &[Found::Failed {
                query: "deploy".into(),
                error: "channel not found".into(),
            }],
            false,
        );
        assert!(text.contains("deploy: channel not found"));
    }

    #[test]
    fn test_summary_keyword_skips_patterns() {
        assert_eq!(plain_keyword("deploy"), Some("deploy"));
        assert_eq!(plain_keyword("/dep.*/"), None);
        assert_eq!(plain_keyword("/"), Some("/"));
    }
}
