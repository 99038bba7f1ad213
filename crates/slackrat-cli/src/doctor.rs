//! `slackrat doctor`: probe which Slack scopes the bot token actually has.
//!
//! Each probe makes one harmless Web API call. The write probe posts a
//! message to the bot's own DM and deletes it again.

use anyhow::{Context, Result};
use colored::Colorize;

use slackrat_api::{list_all_conversations, HistoryQuery, SlackApi};
use slackrat_core::config::load_config;
use slackrat_core::types::{ChannelInfo, ChannelKind};
use slackrat_core::utils::truncate_chars;
use slackrat_search::{ChannelRef, Matcher};

use crate::helpers;

/// Scopes the bot needs, with what each one is for.
const REQUIRED_SCOPES: &[(&str, &str)] = &[
    ("channels:read", "list public channels"),
    ("channels:history", "read public channel history"),
    ("channels:join", "join public channels before searching"),
    ("groups:read", "list private channels"),
    ("groups:history", "read private channel history"),
    ("users:read", "resolve message authors"),
    ("chat:write", "reply to searches"),
    ("im:history", "receive direct messages"),
    ("app_mentions:read", "receive @mentions"),
    ("commands", "slash commands"),
];

const HISTORY_SAMPLE: u32 = 10;
const PROBE_TEXT: &str = "🧪 slackrat write check";

#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub scope: String,
    pub ok: bool,
    pub detail: String,
}

impl Probe {
    fn pass(scope: &str, detail: impl Into<String>) -> Self {
        Self {
            scope: scope.to_string(),
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(scope: &str, detail: impl Into<String>) -> Self {
        Self {
            scope: scope.to_string(),
            ok: false,
            detail: detail.into(),
        }
    }
}

pub async fn run(channel: Option<&str>, keyword: Option<&str>) -> Result<()> {
    let config = load_config(None);
    let client = helpers::build_client(&config)?;

    println!();
    println!("{}", "🩺 SlackRat Doctor".cyan().bold());
    println!();

    let identity = client
        .auth_test()
        .await
        .context("auth.test failed; the bot token is invalid or revoked")?;
    println!(
        "  {} authenticated as @{} ({})",
        helpers::check(true),
        identity.user,
        identity.user_id
    );
    println!("    workspace: {} ({})", identity.team, identity.team_id);
    println!();

    let channel = channel.map(ChannelRef::parse);
    let probes = probe(client.as_ref(), &identity.user_id, channel.as_ref(), keyword).await;
    for p in &probes {
        println!("  {} {:<18} {}", helpers::check(p.ok), p.scope.bold(), p.detail);
    }

    println!();
    println!("  {}", "Scopes the bot needs:".bold());
    for (scope, why) in REQUIRED_SCOPES {
        println!("    {:<18} {}", scope, why.dimmed());
    }
    println!();

    let failed = probes.iter().filter(|p| !p.ok).count();
    if failed > 0 {
        println!(
            "  {}",
            format!("{failed} check(s) failed; add the missing scopes and reinstall the app.").red()
        );
        println!();
    }
    Ok(())
}

/// Run every probe. Failures are recorded, never returned.
pub async fn probe(
    api: &dyn SlackApi,
    self_id: &str,
    channel: Option<&ChannelRef>,
    keyword: Option<&str>,
) -> Vec<Probe> {
    let mut probes = Vec::new();

    probes.push(match api.list_users(200).await {
        Ok(users) => Probe::pass("users:read", format!("{} users", users.len())),
        Err(e) => Probe::fail("users:read", e.to_string()),
    });

    let mut visible: Vec<ChannelInfo> = Vec::new();
    for (scope, kind) in [
        ("channels:read", ChannelKind::Public),
        ("groups:read", ChannelKind::Private),
    ] {
        probes.push(match list_all_conversations(api, kind, true).await {
            Ok(list) => {
                let p = Probe::pass(scope, format!("{} {kind} channels", list.len()));
                visible.extend(list);
                p
            }
            Err(e) => Probe::fail(scope, e.to_string()),
        });
    }

    if let Some(channel) = channel {
        probes.extend(probe_channel(api, &visible, channel, keyword).await);
    }

    probes.push(probe_write(api, self_id).await);
    probes
}

fn find_channel<'a>(visible: &'a [ChannelInfo], channel: &ChannelRef) -> Option<&'a ChannelInfo> {
    visible.iter().find(|c| match channel {
        ChannelRef::Mention { id, .. } | ChannelRef::Id(id) => &c.id == id,
        ChannelRef::Name(name) => c.name.eq_ignore_ascii_case(name),
    })
}

async fn probe_channel(
    api: &dyn SlackApi,
    visible: &[ChannelInfo],
    channel: &ChannelRef,
    keyword: Option<&str>,
) -> Vec<Probe> {
    let Some(info) = find_channel(visible, channel) else {
        return vec![Probe::fail(
            "channel",
            format!("{channel} is not visible to the bot"),
        )];
    };

    let scope = if info.is_private {
        "groups:history"
    } else {
        "channels:history"
    };
    let membership = if info.is_member { "member" } else { "not a member" };

    let messages = match api
        .conversation_history(&HistoryQuery::new(&info.id, HISTORY_SAMPLE))
        .await
    {
        Ok(m) => m,
        Err(e) => {
            return vec![Probe::fail(
                scope,
                format!("#{} ({membership}): {e}", info.name),
            )]
        }
    };

    let mut probes = vec![Probe::pass(
        scope,
        format!("#{} ({membership}), {} recent messages", info.name, messages.len()),
    )];

    if let Some(keyword) = keyword {
        let matcher = Matcher::keyword(keyword);
        let hits: Vec<&str> = messages
            .iter()
            .map(|m| m.text_or_empty())
            .filter(|t| matcher.is_match(t))
            .collect();
        let sample = hits
            .first()
            .map(|t| format!(": \"{}\"", truncate_chars(t, 60)))
            .unwrap_or_default();
        probes.push(Probe::pass(
            "search",
            format!("\"{keyword}\" in {} of {} messages{sample}", hits.len(), messages.len()),
        ));
    }
    probes
}

async fn probe_write(api: &dyn SlackApi, self_id: &str) -> Probe {
    match api.post_message(self_id, PROBE_TEXT, None).await {
        Ok(ts) => {
            if let Err(e) = api.delete_message(self_id, &ts).await {
                tracing::warn!(error = %e, "failed to delete probe message");
            }
            Probe::pass("chat:write", "posted and deleted a test message")
        }
        Err(e) => Probe::fail("chat:write", e.to_string()),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
