//! Shared CLI helpers: client/engine construction, paths, printing.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use colored::Colorize;

use slackrat_api::{SlackApi, SlackClient};
use slackrat_core::config::Config;
use slackrat_search::SearchEngine;

/// Build the Web API client, refusing to run without a bot token.
pub fn build_client(config: &Config) -> Result<Arc<SlackClient>> {
    if !config.slack.is_configured() {
        bail!(
            "no Slack bot token configured (set SLACK_BOT_TOKEN or run `slackrat onboard` and edit {})",
            display_path(&slackrat_core::config::get_config_path())
        );
    }
    Ok(Arc::new(SlackClient::with_base_url(
        config.slack.bot_token.clone(),
        config.slack.api_base.clone(),
    )))
}

pub fn build_engine(config: &Config, client: Arc<SlackClient>) -> Arc<SearchEngine> {
    let api: Arc<dyn SlackApi> = client;
    Arc::new(SearchEngine::new(api, &config.search, config.slack.join_channels))
}

/// Show a path with the home directory collapsed to `~`.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = dirs_next::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

/// How the gateway treats Slack webhooks for a given signing secret.
/// Without a secret every `/slack/*` request fails verification.
pub fn signing_summary(secret: &str) -> &'static str {
    if secret.is_empty() {
        "missing: Slack webhooks will be rejected"
    } else {
        "on"
    }
}

pub fn check(ok: bool) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Print the banner shown by `serve` and `repl`.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "🐀 SlackRat".cyan().bold(), version.dimmed());
}

/// Print one bot reply as it would appear in Slack (mrkdwn left as-is).
pub fn print_reply(reply: &str) {
    println!();
    println!("{}", "🐀 SlackRat".cyan().bold());
    if reply.is_empty() {
        println!("{}", "(no reply)".dimmed());
    } else {
        println!("{reply}");
    }
}

pub fn print_thinking() {
    eprint!("{}", "⠿ searching...".dimmed());
}

pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}
