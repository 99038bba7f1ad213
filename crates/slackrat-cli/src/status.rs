//! `slackrat status`: show configuration status.
//!
//! Secrets are reported as set / not set, never printed.

use anyhow::Result;
use colored::Colorize;

use slackrat_core::config::{get_config_path, load_config, InboundMode};
use slackrat_core::utils::get_repl_history_path;

use crate::helpers::{display_path, signing_summary};

pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "🐀 SlackRat Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        display_path(&config_path),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );
    println!(
        "  {:<18} {}",
        "REPL history:".bold(),
        display_path(&get_repl_history_path()).dimmed()
    );

    println!();
    println!("  {}", "Slack:".bold());
    let slack = &config.slack;
    println!("    {:<20} {}", "Bot token", secret_status(&slack.bot_token));
    println!(
        "    {:<20} {} ({})",
        "Signing secret",
        secret_status(&slack.signing_secret),
        display_signing(&slack.signing_secret)
    );
    println!("    {:<20} {}", "App token", secret_status(&slack.app_token));
    println!(
        "    {:<20} {}",
        "Inbound mode",
        match slack.mode {
            InboundMode::Events => "events",
            InboundMode::Socket => "socket",
        }
    );
    println!("    {:<20} {}", "API base", slack.api_base.dimmed());
    println!(
        "    {:<20} {}",
        "Allowed users",
        if slack.allowed_users.is_empty() {
            "everyone".to_string()
        } else {
            slack.allowed_users.len().to_string()
        }
    );
    println!(
        "    {:<20} {} ({})",
        "Direct messages",
        if slack.dm.enabled { "on" } else { "off" },
        slack.dm.policy
    );

    println!();
    println!("  {}", "Search:".bold());
    let search = &config.search;
    println!(
        "    {:<20} chat {} / api {}",
        "History limit", search.bot_history_limit, search.api_history_limit
    );
    println!(
        "    {:<20} {}",
        "Cache",
        if search.cache_ttl_secs == 0 {
            "off".to_string()
        } else {
            format!("{}s", search.cache_ttl_secs)
        }
    );
    println!(
        "    {:<20} {}",
        "Default channel",
        search.default_channel.as_deref().unwrap_or("-")
    );

    println!();
    println!(
        "  {:<18} {}:{}  (API auth {})",
        "Gateway:".bold(),
        config.gateway.host,
        config.gateway.port,
        if config.gateway.api_token.is_empty() {
            "off"
        } else {
            "on"
        }
    );
    println!();

    Ok(())
}

fn display_signing(secret: &str) -> String {
    let summary = signing_summary(secret);
    if secret.is_empty() {
        summary.red().to_string()
    } else {
        summary.dimmed().to_string()
    }
}

fn secret_status(value: &str) -> String {
    if value.is_empty() {
        format!("{}", "· not set".dimmed())
    } else {
        format!("{} (set)", "✓".green())
    }
}
