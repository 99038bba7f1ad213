//! Configuration schema.
//!
//! Hierarchy: `Config` → `SlackConfig`, `SearchConfig`, `GatewayConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.slackrat/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub slack: SlackConfig,
    pub search: SearchConfig,
    pub gateway: GatewayConfig,
}

// ─────────────────────────────────────────────
// Slack
// ─────────────────────────────────────────────

/// How inbound chat events reach the bot.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InboundMode {
    /// Events API webhook served by the HTTP gateway.
    #[default]
    Events,
    /// Socket Mode WebSocket (needs an app token).
    Socket,
}

/// Slack workspace credentials and access control.
///
/// DMs are controlled by `dm.enabled` + `dm.policy` + `dm.allow_from`,
/// on top of the flat `allowed_users` list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`): required.
    pub bot_token: String,
    /// Signing secret used to verify Events API and slash command requests.
    pub signing_secret: String,
    /// App-level token (`xapp-...`): required for Socket Mode.
    pub app_token: String,
    pub mode: InboundMode,
    /// Web API base URL, overridable for tests and proxies.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Flat allowed-users list (user IDs). Empty = allow everyone.
    pub allowed_users: Vec<String>,
    /// Join public channels the bot is not a member of before reading history.
    #[serde(default = "default_true")]
    pub join_channels: bool,
    pub dm: SlackDMConfig,
}

fn default_api_base() -> String {
    "https://slack.com/api".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            signing_secret: String::new(),
            app_token: String::new(),
            mode: InboundMode::Events,
            api_base: default_api_base(),
            allowed_users: Vec::new(),
            join_channels: true,
            dm: SlackDMConfig::default(),
        }
    }
}

impl SlackConfig {
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty()
    }
}

/// Slack DM-specific settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlackDMConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// DM access policy: `"open"` (default) or `"allowlist"`.
    #[serde(default = "default_dm_policy")]
    pub policy: String,
    /// User IDs allowed when `policy = "allowlist"`.
    pub allow_from: Vec<String>,
}

fn default_dm_policy() -> String {
    "open".to_string()
}

impl Default for SlackDMConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: default_dm_policy(),
            allow_from: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────

/// Search behaviour and chat rendering limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    /// History page size for chat-triggered searches.
    pub bot_history_limit: u32,
    /// History page size for HTTP API and CLI searches (Slack caps it at 1000).
    pub api_history_limit: u32,
    /// Matches listed in a chat reply.
    pub max_displayed: usize,
    /// Characters kept from each listed message.
    pub snippet_length: usize,
    /// Neighbouring messages attached to each match on each side.
    pub context_size: usize,
    pub include_context: bool,
    pub search_threads: bool,
    /// Result cache lifetime in seconds; 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Per-user search history entries kept.
    pub history_size: usize,
    /// Pause between channels in multi-channel searches.
    pub multi_channel_delay_ms: u64,
    /// Channel used when a caller gives none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bot_history_limit: 100,
            api_history_limit: 1000,
            max_displayed: 5,
            snippet_length: 100,
            context_size: 2,
            include_context: true,
            search_threads: true,
            cache_ttl_secs: 3600,
            history_size: 10,
            multi_channel_delay_ms: 1000,
            default_channel: None,
        }
    }
}

// ─────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────

/// HTTP gateway (Events API webhook, slash commands, REST API).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on `/api/*` when non-empty.
    pub api_token: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_token: String::new(),
        }
    }
}
