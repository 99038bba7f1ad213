//! Search engine: fetch one history page, filter, enrich, summarize.
//!
//! A search makes exactly one `conversations.history` call. Matches are then
//! enriched with author profiles and permalinks (issued concurrently, one
//! lookup per distinct user), optional surrounding context, and matching
//! thread replies. Outcomes are cached by channel, matcher and options.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use slackrat_api::{HistoryQuery, SlackApi};
use slackrat_core::config::SearchConfig;
use slackrat_core::types::{SlackMessage, SlackUser};

use crate::cache::TtlCache;
use crate::error::SearchError;
use crate::matcher::Matcher;
use crate::outcome::{
    ChannelResult, CombinedOutcome, ContextMessage, SearchMatch, SearchOptions, SearchOutcome,
    SourcedMatch, ThreadReply, UNKNOWN_USER,
};
use crate::resolver::{ChannelRef, ChannelResolver, ChannelSummary, ResolvedChannel};
use crate::summary::summarize;

pub struct SearchEngine {
    api: Arc<dyn SlackApi>,
    resolver: ChannelResolver,
    cache: TtlCache<SearchOutcome>,
    multi_channel_delay: Duration,
}

impl SearchEngine {
    pub fn new(api: Arc<dyn SlackApi>, config: &SearchConfig, join_channels: bool) -> Self {
        let cache = TtlCache::new(Duration::from_secs(config.cache_ttl_secs));
        info!(
            cache_ttl_secs = config.cache_ttl_secs,
            join_channels, "search engine initialized"
        );
        Self {
            resolver: ChannelResolver::new(api.clone(), join_channels),
            api,
            cache,
            multi_channel_delay: Duration::from_millis(config.multi_channel_delay_ms),
        }
    }

    pub fn api(&self) -> &Arc<dyn SlackApi> {
        &self.api
    }

    pub fn resolver(&self) -> &ChannelResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &TtlCache<SearchOutcome> {
        &self.cache
    }

    pub async fn list_available(&self) -> Vec<ChannelSummary> {
        self.resolver.list_available().await
    }

    // ─────────────────────────────────────────────
    // Single channel
    // ─────────────────────────────────────────────

    pub async fn search_channel(
        &self,
        channel_id: &str,
        matcher: &Matcher,
        options: SearchOptions,
    ) -> Result<SearchOutcome, SearchError> {
        let options = options.normalized();
        let key = format!("{}|{}|{}", channel_id, matcher.cache_key(), options.cache_key());

        if let Some(hit) = self.cache.get(&key) {
            debug!(channel = %channel_id, query = %matcher.describe(), "cache hit");
            let mut outcome = (*hit).clone();
            outcome.from_cache = true;
            return Ok(outcome);
        }

        let query = HistoryQuery::new(channel_id, options.limit)
            .oldest(options.oldest)
            .latest(options.latest);
        let messages = self.api.conversation_history(&query).await?;
        let mut total_searched = messages.len();

        let hits: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| matcher.is_match(m.text_or_empty()))
            .map(|(i, _)| i)
            .collect();

        debug!(
            channel = %channel_id,
            query = %matcher.describe(),
            searched = messages.len(),
            hits = hits.len(),
            "filtered history"
        );

        let threads = if options.search_threads {
            self.fetch_thread_matches(channel_id, matcher, &messages, &hits)
                .await
        } else {
            HashMap::new()
        };
        total_searched += threads.values().map(|(extra, _)| *extra).sum::<usize>();

        let context_ranges: Vec<(usize, Vec<usize>)> = hits
            .iter()
            .map(|&i| {
                let around = if options.include_context && options.context_size > 0 {
                    context_indices(i, messages.len(), options.context_size)
                } else {
                    Vec::new()
                };
                (i, around)
            })
            .collect();

        let mut wanted: Vec<&str> = Vec::new();
        let mut seen = HashSet::new();
        let authors = context_ranges
            .iter()
            .flat_map(|(i, around)| std::iter::once(i).chain(around.iter()))
            .filter_map(|&j| messages[j].user.as_deref())
            .chain(
                threads
                    .values()
                    .flat_map(|(_, replies)| replies.iter().filter_map(|r| r.user.as_deref())),
            );
        for id in authors {
            if seen.insert(id) {
                wanted.push(id);
            }
        }
        let users = self.lookup_users(&wanted).await;
        let permalinks = self.lookup_permalinks(channel_id, &messages, &hits).await;

        let author_of = |m: &SlackMessage| -> (Option<SlackUser>, String) {
            let user = m.user.as_deref().and_then(|id| users.get(id)).cloned();
            let name = user
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| UNKNOWN_USER.to_string());
            (user, name)
        };

        let mut results = Vec::with_capacity(hits.len());
        for ((i, around), permalink) in context_ranges.into_iter().zip(permalinks) {
            let message = &messages[i];
            let (author, author_name) = author_of(message);

            let context = around
                .into_iter()
                .map(|j| ContextMessage {
                    message: messages[j].clone(),
                    author_name: author_of(&messages[j]).1,
                    is_before: j < i,
                })
                .collect();

            let thread_matches = threads
                .get(&i)
                .map(|(_, replies)| {
                    replies
                        .iter()
                        .map(|r| ThreadReply {
                            message: r.clone(),
                            author_name: author_of(r).1,
                            timestamp: r.timestamp(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            results.push(SearchMatch {
                message: message.clone(),
                author,
                author_name,
                timestamp: message.timestamp(),
                permalink,
                context,
                thread_matches,
            });
        }

        let outcome = SearchOutcome {
            channel_id: channel_id.to_string(),
            query: matcher.describe(),
            total_messages_searched: total_searched,
            matches_found: results.len(),
            summary: summarize(&results, matcher.keyword_lower()),
            results,
            options,
            searched_at: Utc::now(),
            from_cache: false,
        };

        info!(
            channel = %channel_id,
            query = %outcome.query,
            matches = outcome.matches_found,
            searched = outcome.total_messages_searched,
            "search complete"
        );

        self.cache.insert(key, Arc::new(outcome.clone()));
        Ok(outcome)
    }

    /// Resolve a channel reference, then search it.
    pub async fn search_by_name(
        &self,
        channel: &ChannelRef,
        matcher: &Matcher,
        options: SearchOptions,
    ) -> Result<(ResolvedChannel, SearchOutcome), SearchError> {
        let resolved = self.resolver.resolve(channel).await?;
        let outcome = self.search_channel(&resolved.id, matcher, options).await?;
        Ok((resolved, outcome))
    }

    /// Search between two instants.
    pub async fn search_in_range(
        &self,
        channel_id: &str,
        matcher: &Matcher,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: SearchOptions,
    ) -> Result<SearchOutcome, SearchError> {
        if start > end {
            return Err(SearchError::InvalidWindow(format!(
                "start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        let options = SearchOptions {
            oldest: Some(start.timestamp() as f64),
            latest: Some(end.timestamp() as f64),
            ..options
        };
        self.search_channel(channel_id, matcher, options).await
    }

    // ─────────────────────────────────────────────
    // Several channels / keywords
    // ─────────────────────────────────────────────

    /// Search channels one after another, pausing between them. A failing
    /// channel is reported in the result and does not stop the rest.
    pub async fn search_channels(
        &self,
        channels: &[ChannelRef],
        matcher: &Matcher,
        options: SearchOptions,
    ) -> CombinedOutcome {
        info!(channels = channels.len(), query = %matcher.describe(), "multi-channel search");

        let mut results = Vec::with_capacity(channels.len());
        for (n, channel) in channels.iter().enumerate() {
            if n > 0 {
                self.pause().await;
            }
            match self.search_by_name(channel, matcher, options.clone()).await {
                Ok((resolved, outcome)) => results.push(ChannelResult::Ok {
                    channel: resolved,
                    outcome,
                }),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "channel search failed");
                    results.push(ChannelResult::Failed {
                        channel: channel.label().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        combine(matcher.describe(), results)
    }

    /// Run several matchers against one channel, in order.
    pub async fn search_keywords(
        &self,
        channel_id: &str,
        matchers: &[Matcher],
        options: SearchOptions,
    ) -> Vec<(String, Result<SearchOutcome, SearchError>)> {
        let mut out = Vec::with_capacity(matchers.len());
        for (n, matcher) in matchers.iter().enumerate() {
            if n > 0 {
                self.pause().await;
            }
            let result = self
                .search_channel(channel_id, matcher, options.clone())
                .await;
            if let Err(e) = &result {
                warn!(channel = %channel_id, query = %matcher.describe(), error = %e, "keyword search failed");
            }
            out.push((matcher.describe(), result));
        }
        out
    }

    // ─────────────────────────────────────────────
    // Enrichment
    // ─────────────────────────────────────────────

    async fn pause(&self) {
        if !self.multi_channel_delay.is_zero() {
            tokio::time::sleep(self.multi_channel_delay).await;
        }
    }

    async fn lookup_users(&self, ids: &[&str]) -> HashMap<String, SlackUser> {
        let lookups = ids.iter().map(|id| async move {
            match self.api.user_info(id).await {
                Ok(user) => Some((id.to_string(), user)),
                Err(e) => {
                    warn!(user = %id, error = %e, "user lookup failed");
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    /// One permalink per hit, in hit order.
    async fn lookup_permalinks(
        &self,
        channel_id: &str,
        messages: &[SlackMessage],
        hits: &[usize],
    ) -> Vec<Option<String>> {
        let lookups = hits.iter().map(|&i| {
            let ts = messages[i].ts.as_str();
            async move {
                match self.api.permalink(channel_id, ts).await {
                    Ok(link) => Some(link),
                    Err(e) => {
                        warn!(channel = %channel_id, ts = %ts, error = %e, "permalink lookup failed");
                        None
                    }
                }
            }
        });
        join_all(lookups).await
    }

    /// For each threaded hit: how many replies were scanned, and the
    /// replies (parent excluded) that match too. Keyed by hit index.
    async fn fetch_thread_matches(
        &self,
        channel_id: &str,
        matcher: &Matcher,
        messages: &[SlackMessage],
        hits: &[usize],
    ) -> HashMap<usize, (usize, Vec<SlackMessage>)> {
        let fetches = hits.iter().filter_map(|&i| {
            let thread_ts = messages[i].thread_ts.as_deref()?;
            Some(async move {
                match self.api.conversation_replies(channel_id, thread_ts).await {
                    Ok(replies) => {
                        let scanned = replies.len().saturating_sub(1);
                        let matching = replies
                            .into_iter()
                            .filter(|r| r.ts != thread_ts && matcher.is_match(r.text_or_empty()))
                            .collect();
                        Some((i, (scanned, matching)))
                    }
                    Err(e) => {
                        warn!(channel = %channel_id, thread = %thread_ts, error = %e, "thread fetch failed");
                        None
                    }
                }
            })
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }
}

/// Indices of up to `k` neighbours on each side of `i`, excluding `i`.
fn context_indices(i: usize, len: usize, k: usize) -> Vec<usize> {
    let start = i.saturating_sub(k);
    let end = i.saturating_add(k).saturating_add(1).min(len);
    (start..end).filter(|&j| j != i).collect()
}

fn combine(query: String, channels: Vec<ChannelResult>) -> CombinedOutcome {
    let mut matches = Vec::new();
    let mut total_messages_searched = 0;
    let mut successful = 0;

    for result in &channels {
        if let ChannelResult::Ok { channel, outcome } = result {
            successful += 1;
            total_messages_searched += outcome.total_messages_searched;
            matches.extend(outcome.results.iter().map(|m| SourcedMatch {
                source_channel: channel.name.clone(),
                found: m.clone(),
            }));
        }
    }

    matches.sort_by(|a, b| b.found.message.ts_seconds().total_cmp(&a.found.message.ts_seconds()));

    CombinedOutcome {
        query,
        total_channels: channels.len(),
        successful_channels: successful,
        failed_channels: channels.len() - successful,
        total_matches: matches.len(),
        total_messages_searched,
        matches,
        channels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{channel, msg, user, FakeSlack};
    use chrono::TimeZone;
    use slackrat_api::traits::MAX_HISTORY_LIMIT;

    fn config() -> SearchConfig {
        SearchConfig {
            multi_channel_delay_ms: 0,
            ..Default::default()
        }
    }

    fn engine(fake: FakeSlack) -> (Arc<FakeSlack>, SearchEngine) {
        let fake = Arc::new(fake);
        let engine = SearchEngine::new(fake.clone(), &config(), true);
        (fake, engine)
    }

    fn general() -> FakeSlack {
        FakeSlack::default()
            .with_channels(vec![channel("C1", "general"), channel("C2", "random")])
            .with_users(vec![user("U1", "Ana Silva"), user("U2", "Bruno Costa")])
            .with_history(
                "C1",
                vec![
                    msg("1700000500.000100", "U1", "Deploy finished"),
                    msg("1700000400.000100", "U2", "lunch?"),
                    msg("1700000300.000100", "U9", "deploy started"),
                    msg("1700000200.000100", "U1", "coffee"),
                    msg("1700000100.000100", "U2", "nothing here"),
                ],
            )
    }

    #[tokio::test]
    async fn test_search_channel_matches_and_enriches() {
        let (fake, engine) = engine(general());
        let outcome = engine
            .search_channel("C1", &Matcher::keyword("deploy"), SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.total_messages_searched, 5);
        assert_eq!(outcome.matches_found, 2);
        assert!(!outcome.from_cache);

        let first = &outcome.results[0];
        assert_eq!(first.author_name, "Ana Silva");
        assert_eq!(
            first.permalink.as_deref(),
            Some("https://acme.slack.com/archives/C1/p1700000500000100")
        );
        assert_eq!(first.timestamp.map(|t| t.timestamp()), Some(1_700_000_500));

        let second = &outcome.results[1];
        assert!(second.author.is_none());
        assert_eq!(second.author_name, UNKNOWN_USER);

        assert_eq!(fake.calls_to("conversations.history"), 1);
        // U1, U2 (context) and U9, each looked up once
        assert_eq!(fake.calls_to("users.info"), 3);
        assert_eq!(outcome.summary.total_authors, 1);
    }

    #[tokio::test]
    async fn test_context_window() {
        let (_, engine) = engine(general());
        let outcome = engine
            .search_channel("C1", &Matcher::keyword("deploy started"), SearchOptions::default())
            .await
            .unwrap();

        let ctx = &outcome.results[0].context;
        let ts: Vec<&str> = ctx.iter().map(|c| c.message.ts.as_str()).collect();
        assert_eq!(
            ts,
            vec![
                "1700000500.000100",
                "1700000400.000100",
                "1700000200.000100",
                "1700000100.000100"
            ]
        );
        assert!(ctx[0].is_before && ctx[1].is_before);
        assert!(!ctx[2].is_before && !ctx[3].is_before);
        assert_eq!(ctx[1].author_name, "Bruno Costa");
    }

    #[tokio::test]
    async fn test_context_clipped_at_edges_and_disabled() {
        let (_, engine) = engine(general());
        let opts = SearchOptions {
            context_size: 2,
            ..Default::default()
        };
        let outcome = engine
            .search_channel("C1", &Matcher::keyword("finished"), opts)
            .await
            .unwrap();
        assert_eq!(outcome.results[0].context.len(), 2);

        let outcome = engine
            .search_channel(
                "C1",
                &Matcher::keyword("finished"),
                SearchOptions {
                    include_context: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.results[0].context.is_empty());
    }

    #[tokio::test]
    async fn test_thread_replies_counted_and_matched() {
        let mut parent = msg("1700000500.000100", "U1", "deploy thread");
        parent.thread_ts = Some(parent.ts.clone());
        parent.reply_count = Some(2);

        let fake = FakeSlack::default()
            .with_users(vec![user("U1", "Ana Silva"), user("U2", "Bruno Costa")])
            .with_history("C1", vec![parent.clone()])
            .with_thread(
                "1700000500.000100",
                vec![
                    parent,
                    msg("1700000600.000100", "U2", "deploy is green"),
                    msg("1700000700.000100", "U2", "thanks"),
                ],
            );
        let (_, engine) = engine(fake);

        let outcome = engine
            .search_channel("C1", &Matcher::keyword("deploy"), SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.total_messages_searched, 3);
        let thread = &outcome.results[0].thread_matches;
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].author_name, "Bruno Costa");
    }

    #[tokio::test]
    async fn test_failed_thread_and_permalink_are_skipped() {
        let mut parent = msg("1700000500.000100", "U1", "deploy thread");
        parent.thread_ts = Some(parent.ts.clone());
        let mut fake = FakeSlack::default().with_history("C1", vec![parent]);
        fake.permalinks_fail = true;
        let (_, engine) = engine(fake);

        let outcome = engine
            .search_channel("C1", &Matcher::keyword("deploy"), SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.matches_found, 1);
        assert!(outcome.results[0].permalink.is_none());
        assert!(outcome.results[0].thread_matches.is_empty());
        assert_eq!(outcome.total_messages_searched, 1);
    }

    #[tokio::test]
    async fn test_chat_options_skip_context_and_threads() {
        let (fake, engine) = engine(general());
        let opts = SearchOptions::for_chat(&SearchConfig::default());
        let outcome = engine
            .search_channel("C1", &Matcher::keyword("deploy"), opts)
            .await
            .unwrap();
        assert!(outcome.results.iter().all(|m| m.context.is_empty()));
        assert_eq!(fake.calls_to("conversations.replies"), 0);
        assert_eq!(fake.history_queries.lock().unwrap()[0].limit, 100);
    }

    #[tokio::test]
    async fn test_cache_hit_and_option_sensitivity() {
        let (fake, engine) = engine(general());
        let m = Matcher::keyword("deploy");

        engine.search_channel("C1", &m, SearchOptions::default()).await.unwrap();
        let again = engine.search_channel("C1", &m, SearchOptions::default()).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(fake.calls_to("conversations.history"), 1);

        let other = SearchOptions {
            context_size: 1,
            ..Default::default()
        };
        let fresh = engine.search_channel("C1", &m, other).await.unwrap();
        assert!(!fresh.from_cache);
        assert_eq!(fake.calls_to("conversations.history"), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled_with_zero_ttl() {
        let fake = Arc::new(general());
        let cfg = SearchConfig {
            cache_ttl_secs: 0,
            ..config()
        };
        let engine = SearchEngine::new(fake.clone(), &cfg, true);
        let m = Matcher::keyword("deploy");
        engine.search_channel("C1", &m, SearchOptions::default()).await.unwrap();
        engine.search_channel("C1", &m, SearchOptions::default()).await.unwrap();
        assert_eq!(fake.calls_to("conversations.history"), 2);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_regex_search() {
        let (_, engine) = engine(general());
        let m = Matcher::pattern(r"^deploy \w+ed$", false).unwrap();
        let outcome = engine
            .search_channel("C1", &m, SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.matches_found, 2);
        assert_eq!(outcome.query, r"/^deploy \w+ed$/");
    }

    #[tokio::test]
    async fn test_search_by_name() {
        let (_, engine) = engine(general());
        let (resolved, outcome) = engine
            .search_by_name(
                &ChannelRef::parse("#general"),
                &Matcher::keyword("deploy"),
                SearchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(resolved.id, "C1");
        assert_eq!(outcome.channel_id, "C1");

        let err = engine
            .search_by_name(
                &ChannelRef::parse("#nope"),
                &Matcher::keyword("deploy"),
                SearchOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::ChannelNotFound(n) if n == "nope"));
    }

    #[tokio::test]
    async fn test_search_in_range_sets_window() {
        let (fake, engine) = engine(general());
        let start = Utc.timestamp_opt(1_700_000_250, 0).unwrap();
        let end = Utc.timestamp_opt(1_700_000_450, 0).unwrap();
        let outcome = engine
            .search_in_range("C1", &Matcher::keyword("deploy"), start, end, SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.total_messages_searched, 2);
        assert_eq!(outcome.matches_found, 1);
        let q = fake.history_queries.lock().unwrap()[0].clone();
        assert_eq!(q.oldest, Some(1_700_000_250.0));
        assert_eq!(q.latest, Some(1_700_000_450.0));

        let err = engine
            .search_in_range("C1", &Matcher::keyword("x"), end, start, SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidWindow(_)));
    }

    #[tokio::test]
    async fn test_search_channels_combines_and_survives_failures() {
        let mut fake = general().with_history(
            "C2",
            vec![msg("1700000450.000100", "U2", "deploy on random")],
        );
        fake.history_fails.insert("C3".into());
        let fake = fake.with_channels(vec![channel("C3", "locked")]);
        let (_, engine) = engine(fake);

        let combined = engine
            .search_channels(
                &[
                    ChannelRef::parse("general"),
                    ChannelRef::parse("random"),
                    ChannelRef::parse("locked"),
                    ChannelRef::parse("missing"),
                ],
                &Matcher::keyword("deploy"),
                SearchOptions::default(),
            )
            .await;

        assert_eq!(combined.total_channels, 4);
        assert_eq!(combined.successful_channels, 2);
        assert_eq!(combined.failed_channels, 2);
        assert_eq!(combined.total_matches, 3);
        assert_eq!(combined.total_messages_searched, 6);

        let order: Vec<(&str, &str)> = combined
            .matches
            .iter()
            .map(|m| (m.source_channel.as_str(), m.found.message.ts.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("general", "1700000500.000100"),
                ("random", "1700000450.000100"),
                ("general", "1700000300.000100"),
            ]
        );

        match &combined.channels[3] {
            ChannelResult::Failed { channel, error } => {
                assert_eq!(channel, "missing");
                assert!(error.contains("not found"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_search_keywords_preserves_order() {
        let (_, engine) = engine(general());
        let results = engine
            .search_keywords(
                "C1",
                &[Matcher::keyword("lunch"), Matcher::keyword("deploy")],
                SearchOptions::default(),
            )
            .await;
        assert_eq!(results[0].0, "lunch");
        assert_eq!(results[0].1.as_ref().unwrap().matches_found, 1);
        assert_eq!(results[1].0, "deploy");
        assert_eq!(results[1].1.as_ref().unwrap().matches_found, 2);
    }

    #[tokio::test]
    async fn test_history_error_propagates() {
        let mut fake = general();
        fake.history_fails.insert("C1".into());
        let (_, engine) = engine(fake);
        let err = engine
            .search_channel("C1", &Matcher::keyword("x"), SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Api(ref e) if e.is_code("not_in_channel")));
    }

    #[tokio::test]
    async fn test_search_through_http_client() {
        use serde_json::json;
        use slackrat_api::SlackClient;
        use wiremock::matchers::{body_string_contains, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.history"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_string_contains("limit=100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    {"ts": "1700000100.000100", "user": "U1", "text": "Deploy OK"},
                    {"ts": "1700000000.000100", "user": "U1", "text": "lunch"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users.info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "user": {"id": "U1", "name": "ana", "real_name": "Ana Silva"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat.getPermalink"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "permalink": "https://acme.slack.com/archives/C1/p1700000100000100"
            })))
            .mount(&server)
            .await;

        let api = Arc::new(SlackClient::with_base_url("xoxb-test", server.uri()));
        let engine = SearchEngine::new(api, &config(), false);
        let outcome = engine
            .search_channel(
                "C1",
                &Matcher::keyword("deploy"),
                SearchOptions::for_chat(&SearchConfig::default()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.matches_found, 1);
        assert_eq!(outcome.results[0].author_name, "Ana Silva");
        assert!(outcome.results[0].permalink.is_some());
    }

    #[test]
    fn test_context_indices() {
        assert_eq!(context_indices(0, 5, 2), vec![1, 2]);
        assert_eq!(context_indices(2, 5, 2), vec![0, 1, 3, 4]);
        assert_eq!(context_indices(4, 5, 1), vec![3]);
        assert_eq!(context_indices(0, 1, 3), Vec::<usize>::new());
        assert_eq!(context_indices(1, 3, usize::MAX), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_huge_context_size_keeps_whole_page() {
        let (_, engine) = engine(general());
        let opts = SearchOptions {
            context_size: usize::MAX,
            ..Default::default()
        };
        let outcome = engine
            .search_channel("C1", &Matcher::keyword("deploy started"), opts)
            .await
            .unwrap();
        assert_eq!(outcome.results[0].context.len(), 4);
        assert_eq!(outcome.options.context_size, MAX_HISTORY_LIMIT as usize);
    }
}
