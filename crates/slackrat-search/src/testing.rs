//! In-memory `SlackApi` used by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use slackrat_api::{ConversationPage, HistoryQuery, SlackApi, SlackApiError};
use slackrat_core::types::{AuthIdentity, ChannelInfo, ChannelKind, SlackMessage, SlackUser};

#[derive(Default)]
pub struct FakeSlack {
    pub public: Vec<ChannelInfo>,
    pub private: Vec<ChannelInfo>,
    /// `conversations.list` for private channels fails with `missing_scope`.
    pub private_listing_fails: bool,
    /// Channel ID → history, newest first.
    pub history: HashMap<String, Vec<SlackMessage>>,
    /// Channels whose history call fails with `not_in_channel`.
    pub history_fails: HashSet<String>,
    /// Thread ts → parent + replies.
    pub replies: HashMap<String, Vec<SlackMessage>>,
    pub users: HashMap<String, SlackUser>,
    pub permalinks_fail: bool,
    /// Error code returned by `conversations.join`.
    pub join_error: Option<String>,
    pub calls: Mutex<Vec<String>>,
    pub posted: Mutex<Vec<(String, String, Option<String>)>>,
    pub history_queries: Mutex<Vec<HistoryQuery>>,
}

pub fn channel(id: &str, name: &str) -> ChannelInfo {
    ChannelInfo {
        id: id.to_string(),
        name: name.to_string(),
        is_private: id.starts_with('G'),
        is_member: true,
        num_members: Some(3),
        ..Default::default()
    }
}

pub fn msg(ts: &str, user: &str, text: &str) -> SlackMessage {
    SlackMessage {
        ts: ts.to_string(),
        user: Some(user.to_string()),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

pub fn user(id: &str, real_name: &str) -> SlackUser {
    SlackUser {
        id: id.to_string(),
        name: real_name.to_lowercase().replace(' ', "."),
        real_name: Some(real_name.to_string()),
        ..Default::default()
    }
}

impl FakeSlack {
    pub fn with_channels(mut self, channels: Vec<ChannelInfo>) -> Self {
        for ch in channels {
            if ch.is_private {
                self.private.push(ch);
            } else {
                self.public.push(ch);
            }
        }
        self
    }

    pub fn with_history(mut self, channel: &str, messages: Vec<SlackMessage>) -> Self {
        self.history.insert(channel.to_string(), messages);
        self
    }

    pub fn with_users(mut self, users: Vec<SlackUser>) -> Self {
        for u in users {
            self.users.insert(u.id.clone(), u);
        }
        self
    }

    pub fn with_thread(mut self, thread_ts: &str, messages: Vec<SlackMessage>) -> Self {
        self.replies.insert(thread_ts.to_string(), messages);
        self
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    fn record(&self, method: &str) {
        self.calls.lock().unwrap().push(method.to_string());
    }

    fn find(&self, id: &str) -> Option<&ChannelInfo> {
        self.public.iter().chain(self.private.iter()).find(|c| c.id == id)
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        self.record("auth.test");
        Ok(AuthIdentity {
            user: "searchbot".into(),
            user_id: "UBOT".into(),
            team: "Acme".into(),
            team_id: "T1".into(),
            ..Default::default()
        })
    }

    async fn list_conversations(
        &self,
        kind: ChannelKind,
        _exclude_archived: bool,
        _cursor: Option<&str>,
        _limit: u32,
    ) -> Result<ConversationPage, SlackApiError> {
        self.record("conversations.list");
        let channels = match kind {
            ChannelKind::Public => self.public.clone(),
            ChannelKind::Private if self.private_listing_fails => {
                return Err(SlackApiError::api("conversations.list", "missing_scope"))
            }
            ChannelKind::Private => self.private.clone(),
        };
        Ok(ConversationPage {
            channels,
            next_cursor: None,
        })
    }

    async fn conversation_info(&self, channel: &str) -> Result<ChannelInfo, SlackApiError> {
        self.record("conversations.info");
        self.find(channel)
            .cloned()
            .ok_or_else(|| SlackApiError::api("conversations.info", "channel_not_found"))
    }

    async fn conversation_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        self.record("conversations.history");
        self.history_queries.lock().unwrap().push(query.clone());
        if self.history_fails.contains(&query.channel) {
            return Err(SlackApiError::api("conversations.history", "not_in_channel"));
        }
        let messages = self
            .history
            .get(&query.channel)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| query.oldest.map_or(true, |o| m.ts_seconds() >= o))
            .filter(|m| query.latest.map_or(true, |l| m.ts_seconds() <= l))
            .take(query.limit as usize)
            .collect();
        Ok(messages)
    }

    async fn conversation_replies(
        &self,
        _channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        self.record("conversations.replies");
        self.replies
            .get(thread_ts)
            .cloned()
            .ok_or_else(|| SlackApiError::api("conversations.replies", "thread_not_found"))
    }

    async fn join_conversation(&self, _channel: &str) -> Result<(), SlackApiError> {
        self.record("conversations.join");
        match &self.join_error {
            Some(code) => Err(SlackApiError::api("conversations.join", code.clone())),
            None => Ok(()),
        }
    }

    async fn user_info(&self, user: &str) -> Result<SlackUser, SlackApiError> {
        self.record("users.info");
        self.users
            .get(user)
            .cloned()
            .ok_or_else(|| SlackApiError::api("users.info", "user_not_found"))
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<SlackUser>, SlackApiError> {
        self.record("users.list");
        Ok(self.users.values().take(limit as usize).cloned().collect())
    }

    async fn permalink(&self, channel: &str, ts: &str) -> Result<String, SlackApiError> {
        self.record("chat.getPermalink");
        if self.permalinks_fail {
            return Err(SlackApiError::api("chat.getPermalink", "message_not_found"));
        }
        Ok(format!(
            "https://acme.slack.com/archives/{}/p{}",
            channel,
            ts.replace('.', "")
        ))
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackApiError> {
        self.record("chat.postMessage");
        self.posted.lock().unwrap().push((
            channel.to_string(),
            text.to_string(),
            thread_ts.map(String::from),
        ));
        Ok("1800000000.000001".to_string())
    }

    async fn delete_message(&self, _channel: &str, _ts: &str) -> Result<(), SlackApiError> {
        self.record("chat.delete");
        Ok(())
    }
}
