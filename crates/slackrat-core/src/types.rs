//! Slack data model: the subset of Web API objects the search bot reads.
//!
//! Every struct deserializes from the minimal JSON Slack returns: optional
//! fields default, unknown fields are ignored.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Conversations
// ─────────────────────────────────────────────

/// Topic or purpose attached to a conversation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelTopic {
    pub value: String,
}

/// A conversation as returned by `conversations.list` / `conversations.info`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_member: bool,
    pub is_archived: bool,
    pub is_im: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_members: Option<u32>,
    /// Creation time, unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<ChannelTopic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<ChannelTopic>,
}

impl ChannelInfo {
    /// Creation time as a UTC datetime.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Topic text, `None` when unset or blank.
    pub fn topic_text(&self) -> Option<&str> {
        self.topic
            .as_ref()
            .map(|t| t.value.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Which `types` filter to pass to `conversations.list`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Public,
    Private,
}

impl ChannelKind {
    /// Value for the Web API `types` parameter.
    pub fn as_api_type(&self) -> &'static str {
        match self {
            ChannelKind::Public => "public_channel",
            ChannelKind::Private => "private_channel",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Public => write!(f, "public"),
            ChannelKind::Private => write!(f, "private"),
        }
    }
}

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// A message from `conversations.history` or `conversations.replies`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlackMessage {
    /// Message timestamp, `"<seconds>.<micros>"`; doubles as the message ID.
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<u32>,
}

impl SlackMessage {
    /// Text content, empty when the message has none.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_slack_ts(&self.ts)
    }

    /// `ts` as float seconds, 0.0 when unparseable. Used for ordering.
    pub fn ts_seconds(&self) -> f64 {
        self.ts.parse::<f64>().unwrap_or(0.0)
    }

    /// Whether the message starts or belongs to a thread.
    pub fn has_thread(&self) -> bool {
        self.thread_ts.is_some()
    }
}

/// Parse a Slack `ts` string into a UTC datetime.
pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = ts.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
    Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
}

// ─────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────

/// Profile block nested in a user object.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserProfile {
    pub real_name: String,
    pub display_name: String,
}

/// A workspace member as returned by `users.info` / `users.list`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SlackUser {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    pub is_bot: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl SlackUser {
    /// Human-readable name: real name, then profile real name, then handle.
    pub fn display_name(&self) -> &str {
        if let Some(real) = self.real_name.as_deref().filter(|s| !s.is_empty()) {
            return real;
        }
        if let Some(profile) = &self.profile {
            if !profile.real_name.is_empty() {
                return &profile.real_name;
            }
        }
        &self.name
    }
}

/// Identity returned by `auth.test`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthIdentity {
    pub user: String,
    pub user_id: String,
    pub team: String,
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}
