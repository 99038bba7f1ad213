//! Bus event types: messages flowing between channels and the search bot.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Metadata key: Slack conversation type (`im`, `channel`, `group`, `mpim`, `command`).
pub const META_CHANNEL_TYPE: &str = "channel_type";
/// Metadata key: thread to reply into.
pub const META_THREAD_TS: &str = "thread_ts";
/// Metadata key: timestamp of the triggering Slack message.
pub const META_TS: &str = "ts";
/// Metadata key: transport the message arrived on (`events`, `socket`, `command`, `repl`).
pub const META_SOURCE: &str = "source";

/// An inbound chat message addressed to the bot.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Channel name (e.g. "slack", "repl").
    pub channel: String,
    /// Slack user ID of the sender.
    pub sender_id: String,
    /// Conversation ID the reply goes to.
    pub chat_id: String,
    /// Text content, with bot mentions already stripped.
    pub content: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Transport-specific metadata (see the `META_*` keys).
    pub metadata: HashMap<String, String>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        InboundMessage {
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Builder-style metadata insert.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Conversation type reported by Slack, `im` when unknown.
    pub fn channel_type(&self) -> &str {
        self.metadata
            .get(META_CHANNEL_TYPE)
            .map(String::as_str)
            .unwrap_or("im")
    }

    /// Whether this came from a direct message conversation.
    pub fn is_direct(&self) -> bool {
        self.channel_type() == "im"
    }
}

/// An outbound reply from the bot to a channel.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// Target channel name.
    pub channel: String,
    /// Target conversation ID.
    pub chat_id: String,
    /// Text content to send (Slack mrkdwn).
    pub content: String,
    /// Optional thread timestamp to reply into.
    pub reply_to: Option<String>,
    /// Channel-specific metadata.
    pub metadata: HashMap<String, String>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        OutboundMessage {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            metadata: HashMap::new(),
        }
    }

    /// Build a reply addressed to the same channel and conversation as `msg`.
    ///
    /// Replies to non-DM messages stay in the thread they came from.
    pub fn reply_to(msg: &InboundMessage, content: impl Into<String>) -> Self {
        let mut out = OutboundMessage::new(msg.channel.clone(), msg.chat_id.clone(), content);
        if !msg.is_direct() {
            out.reply_to = msg.metadata.get(META_THREAD_TS).cloned();
        }
        if let Some(source) = msg.metadata.get(META_SOURCE) {
            out.metadata.insert(META_SOURCE.to_string(), source.clone());
        }
        out
    }
}
