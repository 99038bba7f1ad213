//! Channel resolution: turn what a user typed into a channel ID.
//!
//! Names are resolved by listing public and private channels in two separate
//! paginated calls and scanning for an exact name match. A listing failure
//! for one kind (typically a missing `groups:read` scope) is logged and that
//! kind is skipped.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use slackrat_api::{list_all_conversations, SlackApi};
use slackrat_core::types::{ChannelInfo, ChannelKind};

use crate::error::SearchError;

// ─────────────────────────────────────────────
// ChannelRef
// ─────────────────────────────────────────────

/// A channel as referenced in user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelRef {
    /// Slack's own link markup: `<#C123|general>` or `<#C123>`.
    Mention { id: String, name: Option<String> },
    /// A bare conversation ID (`C0123ABCD`, `G...`, `D...`).
    Id(String),
    /// A name with or without the leading `#`.
    Name(String),
}

impl ChannelRef {
    pub fn parse(input: &str) -> Self {
        let s = input.trim();

        if let Some(inner) = s.strip_prefix("<#").and_then(|r| r.strip_suffix('>')) {
            let (id, name) = match inner.split_once('|') {
                Some((id, name)) => (id, Some(name).filter(|n| !n.is_empty())),
                None => (inner, None),
            };
            return ChannelRef::Mention {
                id: id.to_string(),
                name: name.map(String::from),
            };
        }

        let bare = s.trim_start_matches('#');
        if looks_like_channel_id(bare) {
            ChannelRef::Id(bare.to_string())
        } else {
            ChannelRef::Name(bare.to_lowercase())
        }
    }

    /// Best human-readable label before resolution.
    pub fn label(&self) -> &str {
        match self {
            ChannelRef::Mention { name: Some(n), .. } => n,
            ChannelRef::Mention { id, name: None } => id,
            ChannelRef::Id(id) => id,
            ChannelRef::Name(n) => n,
        }
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.label())
    }
}

fn looks_like_channel_id(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some('C' | 'G' | 'D'))
        && s.len() >= 9
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

// ─────────────────────────────────────────────
// Resolution results
// ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedChannel {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_member: bool,
}

impl From<&ChannelInfo> for ResolvedChannel {
    fn from(ch: &ChannelInfo) -> Self {
        Self {
            id: ch.id.clone(),
            name: ch.name.clone(),
            is_private: ch.is_private,
            is_member: ch.is_member,
        }
    }
}

/// One row of the channel listing served to API and CLI callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub member_count: u32,
    pub is_member: bool,
}

// ─────────────────────────────────────────────
// ChannelResolver
// ─────────────────────────────────────────────

pub struct ChannelResolver {
    api: Arc<dyn SlackApi>,
    join_channels: bool,
}

impl ChannelResolver {
    pub fn new(api: Arc<dyn SlackApi>, join_channels: bool) -> Self {
        Self { api, join_channels }
    }

    pub async fn resolve(&self, channel: &ChannelRef) -> Result<ResolvedChannel, SearchError> {
        let resolved = match channel {
            ChannelRef::Name(name) => {
                let info = self.find_by_name(name).await?;
                self.ensure_member(&info).await;
                ResolvedChannel::from(&info)
            }
            ChannelRef::Id(id) => match self.api.conversation_info(id).await {
                Ok(info) => {
                    self.ensure_member(&info).await;
                    ResolvedChannel::from(&info)
                }
                Err(e) if e.is_code("channel_not_found") => {
                    return Err(SearchError::ChannelNotFound(id.clone()))
                }
                Err(e) => {
                    warn!(channel = %id, error = %e, "conversations.info failed, using raw ID");
                    ResolvedChannel {
                        id: id.clone(),
                        name: id.clone(),
                        is_private: id.starts_with('G'),
                        is_member: false,
                    }
                }
            },
            ChannelRef::Mention { id, name } => match self.api.conversation_info(id).await {
                Ok(info) => {
                    self.ensure_member(&info).await;
                    ResolvedChannel::from(&info)
                }
                Err(e) => {
                    debug!(channel = %id, error = %e, "conversations.info failed for mention");
                    ResolvedChannel {
                        id: id.clone(),
                        name: name.clone().unwrap_or_else(|| id.clone()),
                        is_private: false,
                        is_member: false,
                    }
                }
            },
        };

        debug!(channel = %resolved.id, name = %resolved.name, "Resolved channel");
        Ok(resolved)
    }

    /// Exact name match over public then private channels; first match wins.
    pub async fn find_by_name(&self, name: &str) -> Result<ChannelInfo, SearchError> {
        let wanted = name.trim_start_matches('#');
        self.list_all()
            .await
            .into_iter()
            .find(|c| c.name == wanted)
            .ok_or_else(|| SearchError::ChannelNotFound(wanted.to_string()))
    }

    /// Every visible, unarchived channel: public first, then private.
    pub async fn list_all(&self) -> Vec<ChannelInfo> {
        let mut all = Vec::new();
        for kind in [ChannelKind::Public, ChannelKind::Private] {
            match list_all_conversations(self.api.as_ref(), kind, true).await {
                Ok(channels) => {
                    debug!(kind = %kind, count = channels.len(), "Listed channels");
                    all.extend(channels);
                }
                Err(e) => warn!(kind = %kind, error = %e, "Failed to list channels"),
            }
        }
        all
    }

    pub async fn list_available(&self) -> Vec<ChannelSummary> {
        self.list_all()
            .await
            .into_iter()
            .map(|c| ChannelSummary {
                member_count: c.num_members.unwrap_or(0),
                id: c.id,
                name: c.name,
                is_private: c.is_private,
                is_member: c.is_member,
            })
            .collect()
    }

    /// Join public channels the bot can't read yet. Failures only get logged;
    /// the history call that follows reports the real problem.
    async fn ensure_member(&self, channel: &ChannelInfo) {
        if !self.join_channels || channel.is_private || channel.is_member || channel.is_im {
            return;
        }
        match self.api.join_conversation(&channel.id).await {
            Ok(()) => info!(channel = %channel.name, "Joined channel"),
            Err(e) if e.is_code("already_in_channel") => {}
            Err(e) => warn!(channel = %channel.name, error = %e, "Could not join channel"),
        }
    }
}
