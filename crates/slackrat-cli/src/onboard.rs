//! `slackrat onboard`: write a default `~/.slackrat/config.json`.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use slackrat_core::config::{get_config_path, save_config, Config};

use crate::helpers::display_path;

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🐀 SlackRat Setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    if write_default_config(&config_path)? {
        println!(
            "  {} created config at {}",
            "✓".green(),
            display_path(&config_path)
        );
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            display_path(&config_path)
        );
    }

    println!();
    println!("  Next steps:");
    println!("    1. Set {} (or SLACK_BOT_TOKEN)", "slack.botToken".bold());
    println!(
        "    2. Set {} for the Events API, or {} + mode \"socket\"",
        "slack.signingSecret".bold(),
        "slack.appToken".bold()
    );
    println!("    3. Run `slackrat doctor` to check the bot's scopes");
    println!("    4. Run `slackrat serve`");
    println!();

    Ok(())
}

/// Write defaults to `path` unless a file is already there. Returns whether
/// a file was written.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(path))?;
    Ok(true)
}
