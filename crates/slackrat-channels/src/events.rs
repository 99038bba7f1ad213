//! Inbound Slack event handling shared by the Events API webhook and
//! Socket Mode.
//!
//! - `InboundFilter`: who may talk to the bot (DM policy + allow-list)
//! - `classify_event`: turns an event payload into a bus message or a
//!   reason for ignoring it
//! - `SlashCommand` / `route_slash_command`: `/search` and `/searchhelp`

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use slackrat_core::bus::types::{META_CHANNEL_TYPE, META_SOURCE, META_THREAD_TS, META_TS};
use slackrat_core::bus::InboundMessage;
use slackrat_core::config::SlackConfig;
use slackrat_search::commands::{HELP_TEXT, SEARCH_USAGE_TEXT};

use crate::formatting::escape_mrkdwn;

/// Name inbound messages are tagged with; replies are routed back here.
pub const SLACK_CHANNEL_NAME: &str = "slack";

/// Slackbot's user ID; its messages are never answered.
pub const SLACKBOT_USER: &str = "USLACKBOT";

// ─────────────────────────────────────────────
// Access control
// ─────────────────────────────────────────────

/// Access policy plus the bot's own user ID, resolved at startup.
pub struct InboundFilter {
    config: SlackConfig,
    bot_user_id: RwLock<Option<String>>,
}

/// What to do with an inbound event.
#[derive(Debug)]
pub enum Verdict {
    Deliver(InboundMessage),
    Ignore(&'static str),
}

impl InboundFilter {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            config,
            bot_user_id: RwLock::new(None),
        }
    }

    pub async fn set_bot_user_id(&self, id: impl Into<String>) {
        *self.bot_user_id.write().await = Some(id.into());
    }

    pub async fn bot_user_id(&self) -> Option<String> {
        self.bot_user_id.read().await.clone()
    }

    /// Check if a sender is allowed in the given context.
    ///
    /// - DMs: `dm.enabled` → `dm.policy` → `dm.allow_from`
    /// - Everything else: `allowed_users` (empty = everyone)
    pub fn is_allowed(&self, sender_id: &str, channel_type: &str) -> bool {
        if channel_type == "im" {
            if !self.config.dm.enabled {
                return false;
            }
            match self.config.dm.policy.as_str() {
                "allowlist" => self.config.dm.allow_from.iter().any(|u| u == sender_id),
                _ => true,
            }
        } else {
            self.config.allowed_users.is_empty()
                || self.config.allowed_users.iter().any(|u| u == sender_id)
        }
    }

    /// Decide whether an Events API `event` object becomes a bot message.
    ///
    /// `source` is recorded in the message metadata (`events` or `socket`).
    pub async fn classify_event(&self, event: &Value, source: &str) -> Verdict {
        let event_type = event["type"].as_str().unwrap_or("");
        let mut channel_type = event["channel_type"].as_str().unwrap_or("").to_string();

        match event_type {
            "app_mention" => channel_type = "channel".to_string(),
            "message" => {
                if channel_type.is_empty() {
                    channel_type = "im".to_string();
                }
                if channel_type != "im" && channel_type != "mpim" {
                    return Verdict::Ignore("message outside a direct conversation");
                }
            }
            _ => return Verdict::Ignore("unsupported event type"),
        }

        if event.get("subtype").is_some_and(|s| !s.is_null()) {
            return Verdict::Ignore("message subtype");
        }
        if event.get("bot_id").is_some_and(|b| !b.is_null()) {
            return Verdict::Ignore("bot message");
        }

        let sender_id = event["user"].as_str().unwrap_or("");
        if sender_id.is_empty() {
            return Verdict::Ignore("no sender");
        }
        if sender_id == SLACKBOT_USER {
            return Verdict::Ignore("slackbot message");
        }

        let bot_id = self.bot_user_id().await.unwrap_or_default();
        if !bot_id.is_empty() && sender_id == bot_id {
            return Verdict::Ignore("own message");
        }

        let text = event["text"].as_str().unwrap_or("");
        let mention = format!("<@{bot_id}>");

        // A DM that mentions the bot arrives twice; the app_mention copy wins.
        if event_type == "message" && !bot_id.is_empty() && text.contains(&mention) {
            return Verdict::Ignore("mention handled by app_mention");
        }

        if !self.is_allowed(sender_id, &channel_type) {
            warn!(sender = %sender_id, channel_type = %channel_type, "access denied by policy");
            return Verdict::Ignore("access denied");
        }

        let clean_text = if bot_id.is_empty() {
            text.trim().to_string()
        } else {
            text.replace(&mention, "").trim().to_string()
        };
        if clean_text.is_empty() {
            return Verdict::Ignore("empty text");
        }

        let chat_id = event["channel"].as_str().unwrap_or("");
        let ts = event["ts"].as_str().unwrap_or("");
        let thread_ts = event["thread_ts"].as_str().unwrap_or(ts);

        let msg = InboundMessage::new(SLACK_CHANNEL_NAME, sender_id, chat_id, clean_text)
            .with_meta(META_CHANNEL_TYPE, channel_type)
            .with_meta(META_THREAD_TS, thread_ts)
            .with_meta(META_TS, ts)
            .with_meta(META_SOURCE, source);

        debug!(
            sender = %msg.sender_id,
            chat = %msg.chat_id,
            event_type,
            "accepted inbound event"
        );
        Verdict::Deliver(msg)
    }
}

// ─────────────────────────────────────────────
// Slash commands
// ─────────────────────────────────────────────

/// The fields of a slash-command request the bot uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
}

impl SlashCommand {
    /// Parse an `application/x-www-form-urlencoded` slash-command body.
    pub fn from_form(body: &[u8]) -> Self {
        let fields: HashMap<String, String> =
            url::form_urlencoded::parse(body).into_owned().collect();
        Self::from_fields(&fields)
    }

    fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |k: &str| fields.get(k).cloned().unwrap_or_default();
        Self {
            command: get("command"),
            text: get("text").trim().to_string(),
            user_id: get("user_id"),
            channel_id: get("channel_id"),
        }
    }

    /// Socket Mode delivers the same fields as a JSON object.
    pub fn from_json(payload: &Value) -> Self {
        let get = |k: &str| payload[k].as_str().unwrap_or("").to_string();
        Self {
            command: get("command"),
            text: get("text").trim().to_string(),
            user_id: get("user_id"),
            channel_id: get("channel_id"),
        }
    }
}

/// What a slash command turns into.
#[derive(Debug)]
pub struct CommandRoute {
    /// Ephemeral text returned to the invoking user right away.
    pub ephemeral: String,
    /// Work handed to the bot, if any.
    pub dispatch: Option<InboundMessage>,
}

pub fn route_slash_command(cmd: &SlashCommand, source: &str) -> CommandRoute {
    match cmd.command.as_str() {
        "/search" if cmd.text.is_empty() => CommandRoute {
            ephemeral: SEARCH_USAGE_TEXT.to_string(),
            dispatch: None,
        },
        "/search" => {
            let msg = InboundMessage::new(
                SLACK_CHANNEL_NAME,
                &cmd.user_id,
                &cmd.channel_id,
                format!("search {}", cmd.text),
            )
            .with_meta(META_CHANNEL_TYPE, "command")
            .with_meta(META_SOURCE, source);
            CommandRoute {
                ephemeral: format!(
                    ":hourglass_flowing_sand: Processing `/search {}`...",
                    escape_mrkdwn(&cmd.text)
                ),
                dispatch: Some(msg),
            }
        }
        "/searchhelp" => CommandRoute {
            ephemeral: HELP_TEXT.to_string(),
            dispatch: None,
        },
        other => CommandRoute {
            ephemeral: format!(":question: Unknown command `{}`.", escape_mrkdwn(other)),
            dispatch: None,
        },
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slackrat_core::config::SlackDMConfig;

    async fn filter_with(config: SlackConfig) -> InboundFilter {
        let filter = InboundFilter::new(config);
        filter.set_bot_user_id("UBOT").await;
        filter
    }

    fn deliver(v: Verdict) -> InboundMessage {
        match v {
            Verdict::Deliver(m) => m,
            Verdict::Ignore(reason) => panic!("expected delivery, ignored: {reason}"),
        }
    }

    fn ignored(v: Verdict) -> &'static str {
        match v {
            Verdict::Ignore(reason) => reason,
            Verdict::Deliver(m) => panic!("expected ignore, delivered: {}", m.content),
        }
    }

    #[tokio::test]
    async fn test_dm_message_delivered() {
        let filter = filter_with(SlackConfig::default()).await;
        let event = json!({
            "type": "message", "channel_type": "im", "user": "U1",
            "channel": "D1", "text": "search #general deploy", "ts": "1700000000.000100"
        });

        let msg = deliver(filter.classify_event(&event, "events").await);
        assert_eq!(msg.channel, "slack");
        assert_eq!(msg.sender_id, "U1");
        assert_eq!(msg.chat_id, "D1");
        assert_eq!(msg.content, "search #general deploy");
        assert_eq!(msg.channel_type(), "im");
        assert_eq!(msg.metadata[META_THREAD_TS], "1700000000.000100");
        assert_eq!(msg.metadata[META_SOURCE], "events");
    }

    #[tokio::test]
    async fn test_app_mention_strips_mention_and_keeps_thread() {
        let filter = filter_with(SlackConfig::default()).await;
        let event = json!({
            "type": "app_mention", "user": "U1", "channel": "C1",
            "text": "<@UBOT> help", "ts": "1700000000.000200", "thread_ts": "1700000000.000001"
        });

        let msg = deliver(filter.classify_event(&event, "socket").await);
        assert_eq!(msg.content, "help");
        assert_eq!(msg.channel_type(), "channel");
        assert_eq!(msg.metadata[META_THREAD_TS], "1700000000.000001");
        assert_eq!(msg.metadata[META_TS], "1700000000.000200");
    }

    #[tokio::test]
    async fn test_ignored_events() {
        let filter = filter_with(SlackConfig::default()).await;
        let base = json!({"type": "message", "channel_type": "im", "user": "U1", "channel": "D1", "text": "hi", "ts": "1"});

        let mut edited = base.clone();
        edited["subtype"] = json!("message_changed");
        assert_eq!(ignored(filter.classify_event(&edited, "events").await), "message subtype");

        let mut bot = base.clone();
        bot["bot_id"] = json!("B1");
        assert_eq!(ignored(filter.classify_event(&bot, "events").await), "bot message");

        let mut own = base.clone();
        own["user"] = json!("UBOT");
        assert_eq!(ignored(filter.classify_event(&own, "events").await), "own message");

        let mut slackbot = base.clone();
        slackbot["user"] = json!("USLACKBOT");
        assert_eq!(ignored(filter.classify_event(&slackbot, "events").await), "slackbot message");

        let mut mention = base.clone();
        mention["text"] = json!("<@UBOT> hi");
        assert_eq!(
            ignored(filter.classify_event(&mention, "events").await),
            "mention handled by app_mention"
        );

        let mut public = base.clone();
        public["channel_type"] = json!("channel");
        assert_eq!(
            ignored(filter.classify_event(&public, "events").await),
            "message outside a direct conversation"
        );

        let reaction = json!({"type": "reaction_added", "user": "U1"});
        assert_eq!(ignored(filter.classify_event(&reaction, "events").await), "unsupported event type");

        let blank = json!({"type": "app_mention", "user": "U1", "channel": "C1", "text": "<@UBOT>  ", "ts": "1"});
        assert_eq!(ignored(filter.classify_event(&blank, "events").await), "empty text");
    }

    #[tokio::test]
    async fn test_mpim_message_delivered() {
        let filter = filter_with(SlackConfig::default()).await;
        let event = json!({"type": "message", "channel_type": "mpim", "user": "U1", "channel": "G1", "text": "history", "ts": "1"});
        let msg = deliver(filter.classify_event(&event, "events").await);
        assert_eq!(msg.channel_type(), "mpim");
        assert!(!msg.is_direct());
    }

    #[tokio::test]
    async fn test_dm_policy() {
        let config = SlackConfig {
            dm: SlackDMConfig {
                enabled: true,
                policy: "allowlist".into(),
                allow_from: vec!["U_OK".into()],
            },
            allowed_users: vec!["U_CHAN".into()],
            ..SlackConfig::default()
        };
        let filter = filter_with(config).await;

        assert!(filter.is_allowed("U_OK", "im"));
        assert!(!filter.is_allowed("U_OTHER", "im"));
        assert!(filter.is_allowed("U_CHAN", "channel"));
        assert!(!filter.is_allowed("U_OK", "channel"));

        let event = json!({"type": "message", "channel_type": "im", "user": "U_OTHER", "channel": "D1", "text": "hi", "ts": "1"});
        assert_eq!(ignored(filter.classify_event(&event, "events").await), "access denied");
    }

    #[test]
    fn test_dm_disabled() {
        let config = SlackConfig {
            dm: SlackDMConfig {
                enabled: false,
                ..SlackDMConfig::default()
            },
            ..SlackConfig::default()
        };
        let filter = InboundFilter::new(config);
        assert!(!filter.is_allowed("U1", "im"));
        assert!(filter.is_allowed("U1", "channel"));
    }

    #[test]
    fn test_slash_command_from_form() {
        let body = b"command=%2Fsearch&text=%23general+deploy+failed&user_id=U1&channel_id=C9&team_id=T1";
        let cmd = SlashCommand::from_form(body);
        assert_eq!(
            cmd,
            SlashCommand {
                command: "/search".into(),
                text: "#general deploy failed".into(),
                user_id: "U1".into(),
                channel_id: "C9".into(),
            }
        );
    }

    #[test]
    fn test_route_search_command() {
        let cmd = SlashCommand {
            command: "/search".into(),
            text: "#general deploy".into(),
            user_id: "U1".into(),
            channel_id: "C9".into(),
        };
        let route = route_slash_command(&cmd, "command");
        assert!(route.ephemeral.contains("/search #general deploy"));
        let msg = route.dispatch.expect("dispatched");
        assert_eq!(msg.content, "search #general deploy");
        assert_eq!(msg.chat_id, "C9");
        assert_eq!(msg.channel_type(), "command");
    }

    #[test]
    fn test_route_static_commands() {
        let bare = SlashCommand {
            command: "/search".into(),
            ..SlashCommand::default()
        };
        let route = route_slash_command(&bare, "command");
        assert!(route.dispatch.is_none());
        assert_eq!(route.ephemeral, SEARCH_USAGE_TEXT);

        let help = SlashCommand {
            command: "/searchhelp".into(),
            ..SlashCommand::default()
        };
        assert_eq!(route_slash_command(&help, "command").ephemeral, HELP_TEXT);

        let other = SlashCommand {
            command: "/deploy".into(),
            ..SlashCommand::default()
        };
        let route = route_slash_command(&other, "command");
        assert!(route.dispatch.is_none());
        assert!(route.ephemeral.contains("/deploy"));
    }
}
