//! Config loader: reads `~/.slackrat/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.slackrat/config.json`
//! 3. Conventional Slack variables (`SLACK_BOT_TOKEN`, `PORT`, ...)
//! 4. `SLACKRAT_<SECTION>__<FIELD>` variables (override everything)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, InboundMode};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from `path` (or the default path) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    apply_env_overrides(load_config_from_path(&config_path), |key| std::env::var(key).ok())
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// `lookup` abstracts `std::env::var` so tests don't race on process env.
///
/// Supported overrides:
/// - `SLACK_BOT_TOKEN`, `SLACK_SIGNING_SECRET`, `SLACK_APP_TOKEN`
/// - `PORT` → `gateway.port`, `CACHE_TTL` → `search.cache_ttl_secs`
/// - `DEFAULT_CHANNEL` → `search.default_channel`
/// - `SLACKRAT_SLACK__BOT_TOKEN`, `SLACKRAT_SLACK__SIGNING_SECRET`,
///   `SLACKRAT_SLACK__APP_TOKEN`, `SLACKRAT_SLACK__MODE`, `SLACKRAT_SLACK__API_BASE`
/// - `SLACKRAT_SEARCH__CACHE_TTL_SECS`, `SLACKRAT_SEARCH__HISTORY_LIMIT`
/// - `SLACKRAT_GATEWAY__HOST`, `SLACKRAT_GATEWAY__PORT`, `SLACKRAT_GATEWAY__API_TOKEN`
fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

    // Conventional names first, prefixed names win.
    for (plain, prefixed, target) in [
        ("SLACK_BOT_TOKEN", "SLACKRAT_SLACK__BOT_TOKEN", &mut config.slack.bot_token),
        ("SLACK_SIGNING_SECRET", "SLACKRAT_SLACK__SIGNING_SECRET", &mut config.slack.signing_secret),
        ("SLACK_APP_TOKEN", "SLACKRAT_SLACK__APP_TOKEN", &mut config.slack.app_token),
        ("", "SLACKRAT_SLACK__API_BASE", &mut config.slack.api_base),
        ("", "SLACKRAT_GATEWAY__HOST", &mut config.gateway.host),
        ("", "SLACKRAT_GATEWAY__API_TOKEN", &mut config.gateway.api_token),
    ] {
        if let Some(val) = var(prefixed).or_else(|| var(plain)) {
            *target = val;
        }
    }

    if let Some(val) = var("SLACKRAT_SLACK__MODE") {
        match val.to_ascii_lowercase().as_str() {
            "socket" => config.slack.mode = InboundMode::Socket,
            "events" => config.slack.mode = InboundMode::Events,
            other => warn!("Ignoring unknown SLACKRAT_SLACK__MODE value: {}", other),
        }
    }

    if let Some(port) = var("SLACKRAT_GATEWAY__PORT")
        .or_else(|| var("PORT"))
        .and_then(|v| v.parse::<u16>().ok())
    {
        config.gateway.port = port;
    }

    if let Some(ttl) = var("SLACKRAT_SEARCH__CACHE_TTL_SECS")
        .or_else(|| var("CACHE_TTL"))
        .and_then(|v| v.parse::<u64>().ok())
    {
        config.search.cache_ttl_secs = ttl;
    }

    if let Some(limit) = var("SLACKRAT_SEARCH__HISTORY_LIMIT").and_then(|v| v.parse::<u32>().ok()) {
        config.search.api_history_limit = limit;
    }

    if let Some(channel) = var("SLACKRAT_SEARCH__DEFAULT_CHANNEL").or_else(|| var("DEFAULT_CHANNEL")) {
        config.search.default_channel = Some(channel.trim_start_matches('#').to_string());
    }

    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
