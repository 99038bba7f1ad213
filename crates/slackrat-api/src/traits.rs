//! `SlackApi`: the Web API surface the rest of SlackRat is written against.
//!
//! `SlackClient` is the production implementation; tests substitute in-memory
//! fakes.

use async_trait::async_trait;
use tracing::debug;

use slackrat_core::types::{AuthIdentity, ChannelInfo, ChannelKind, SlackMessage, SlackUser};

use crate::error::SlackApiError;

/// Largest page Slack serves from `conversations.history`.
pub const MAX_HISTORY_LIMIT: u32 = 1000;

/// Page size used when walking `conversations.list`.
const LIST_PAGE_SIZE: u32 = 200;
/// Upper bound on `conversations.list` pages fetched per kind.
const MAX_LIST_PAGES: usize = 50;

/// Parameters for `conversations.history`.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryQuery {
    pub channel: String,
    pub limit: u32,
    /// Only messages after this unix time (seconds).
    pub oldest: Option<f64>,
    /// Only messages before this unix time (seconds).
    pub latest: Option<f64>,
}

impl HistoryQuery {
    pub fn new(channel: impl Into<String>, limit: u32) -> Self {
        Self {
            channel: channel.into(),
            limit: limit.clamp(1, MAX_HISTORY_LIMIT),
            oldest: None,
            latest: None,
        }
    }

    pub fn oldest(mut self, oldest: Option<f64>) -> Self {
        self.oldest = oldest;
        self
    }

    pub fn latest(mut self, latest: Option<f64>) -> Self {
        self.latest = latest;
        self
    }
}

/// One page of `conversations.list`.
#[derive(Clone, Debug, Default)]
pub struct ConversationPage {
    pub channels: Vec<ChannelInfo>,
    /// Cursor for the next page; `None` on the last one.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `auth.test`: who the bot token belongs to.
    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError>;

    /// `conversations.list` for one kind of channel, one page.
    async fn list_conversations(
        &self,
        kind: ChannelKind,
        exclude_archived: bool,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<ConversationPage, SlackApiError>;

    /// `conversations.info`.
    async fn conversation_info(&self, channel: &str) -> Result<ChannelInfo, SlackApiError>;

    /// `conversations.history`: a single page, newest first.
    async fn conversation_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<SlackMessage>, SlackApiError>;

    /// `conversations.replies`: parent message first, then replies.
    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackApiError>;

    /// `conversations.join`.
    async fn join_conversation(&self, channel: &str) -> Result<(), SlackApiError>;

    /// `users.info`.
    async fn user_info(&self, user: &str) -> Result<SlackUser, SlackApiError>;

    /// `users.list`, first page only.
    async fn list_users(&self, limit: u32) -> Result<Vec<SlackUser>, SlackApiError>;

    /// `chat.getPermalink`.
    async fn permalink(&self, channel: &str, ts: &str) -> Result<String, SlackApiError>;

    /// `chat.postMessage`; returns the new message's `ts`.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackApiError>;

    /// `chat.delete`.
    async fn delete_message(&self, channel: &str, ts: &str) -> Result<(), SlackApiError>;
}

/// Walk every `conversations.list` page of one kind.
///
/// Stops at the last page or after a fixed page cap.
pub async fn list_all_conversations(
    api: &dyn SlackApi,
    kind: ChannelKind,
    exclude_archived: bool,
) -> Result<Vec<ChannelInfo>, SlackApiError> {
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;

    for page_no in 0..MAX_LIST_PAGES {
        let page = api
            .list_conversations(kind, exclude_archived, cursor.as_deref(), LIST_PAGE_SIZE)
            .await?;
        debug!(kind = %kind, page = page_no, count = page.channels.len(), "Listed conversations");
        all.extend(page.channels);

        match page.next_cursor.filter(|c| !c.is_empty()) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(all)
}
