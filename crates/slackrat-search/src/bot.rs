//! Search bot: turns chat commands into searches and replies.
//!
//! Consumes inbound bus messages, parses them with [`BotCommand`], and
//! publishes replies outbound to the conversation they came from. A search
//! publishes its acknowledgement before the Slack calls start, so the user
//! sees feedback right away.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use slackrat_core::bus::{InboundMessage, MessageBus, OutboundMessage};
use slackrat_core::config::SearchConfig;

use crate::commands::BotCommand;
use crate::engine::SearchEngine;
use crate::error::SearchError;
use crate::history::{HistoryEntry, SearchHistory};
use crate::matcher::Matcher;
use crate::outcome::SearchOptions;
use crate::resolver::ChannelRef;
use crate::summary::{render_channel_stats, render_chat_summary, RenderLimits};

/// Slack's own system user; its messages are never commands.
const SLACKBOT_USER: &str = "USLACKBOT";

pub struct SearchBot {
    engine: Arc<SearchEngine>,
    history: SearchHistory,
    config: SearchConfig,
}

impl SearchBot {
    pub fn new(engine: Arc<SearchEngine>, config: SearchConfig) -> Self {
        Self {
            engine,
            history: SearchHistory::new(config.history_size),
            config,
        }
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    /// Poll inbound messages until the bus closes. Each message runs on its
    /// own task so one slow search doesn't hold up other users.
    pub async fn run(self: Arc<Self>, bus: Arc<MessageBus>) {
        info!("search bot started, waiting for messages");
        loop {
            match bus.consume_inbound().await {
                Some(msg) => {
                    debug!(user = %msg.sender_id, chat = %msg.chat_id, "received message");
                    let bot = self.clone();
                    let out = bus.outbound_sender();
                    tokio::spawn(async move {
                        if let Err(e) = bot.handle(&msg, &out).await {
                            error!(error = %e, user = %msg.sender_id, "message processing error");
                            send_error_reply(&out, &msg, &e).await;
                        }
                    });
                }
                None => {
                    info!("inbound channel closed, search bot exiting");
                    break;
                }
            }
        }
    }

    /// Handle one message, sending every reply to `out` as soon as it's ready.
    pub async fn handle(
        &self,
        msg: &InboundMessage,
        out: &mpsc::Sender<OutboundMessage>,
    ) -> Result<()> {
        if msg.sender_id == SLACKBOT_USER {
            debug!("ignoring slackbot message");
            return Ok(());
        }
        let text = msg.content.trim();
        if text.is_empty() {
            return Ok(());
        }

        let command = BotCommand::parse(text);
        debug!(user = %msg.sender_id, command = ?command, "parsed command");

        match command {
            BotCommand::Search { channel, query } => {
                self.search(msg, &channel, &query, out).await
            }
            BotCommand::History => send(out, msg, self.history.render(&msg.sender_id)).await,
            BotCommand::Stats(channel) => {
                let reply = self.stats(&channel).await;
                send(out, msg, reply).await
            }
            other => {
                let reply = other.static_reply().unwrap_or_default();
                send(out, msg, reply).await
            }
        }
    }

    /// Run `text` as `user` and collect the replies. Used by the REPL.
    pub async fn process_direct(&self, user: &str, text: &str) -> Result<Vec<String>> {
        let msg = InboundMessage::new("repl", user, "direct", text);
        let (tx, mut rx) = mpsc::channel(16);
        self.handle(&msg, &tx).await?;
        drop(tx);

        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            replies.push(reply.content);
        }
        Ok(replies)
    }

    async fn search(
        &self,
        msg: &InboundMessage,
        channel: &ChannelRef,
        query: &str,
        out: &mpsc::Sender<OutboundMessage>,
    ) -> Result<()> {
        let parsed = Matcher::parse_query(query);
        let shown = parsed
            .as_ref()
            .map(Matcher::describe)
            .unwrap_or_else(|_| query.to_string());
        send(
            out,
            msg,
            format!(":mag: Searching for \"{}\" in #{}...", shown, channel.label()),
        )
        .await?;

        let matcher = match parsed {
            Ok(m) => m,
            Err(e) => return send(out, msg, format!(":x: Search error: {e}")).await,
        };

        let options = SearchOptions::for_chat(&self.config);
        let reply = match self.engine.search_by_name(channel, &matcher, options).await {
            Ok((resolved, outcome)) => {
                self.history.record(
                    &msg.sender_id,
                    HistoryEntry {
                        timestamp: Utc::now(),
                        channel: resolved.name.clone(),
                        keyword: outcome.query.clone(),
                        result_count: outcome.matches_found,
                    },
                );
                render_chat_summary(
                    &outcome.query,
                    &resolved.name,
                    &outcome.results,
                    RenderLimits {
                        max_displayed: self.config.max_displayed,
                        snippet_length: self.config.snippet_length,
                    },
                )
            }
            Err(SearchError::ChannelNotFound(name)) => {
                format!(":x: Channel #{name} not found. Check the channel name.")
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "chat search failed");
                format!(":x: Search error: {e}")
            }
        };

        send(out, msg, reply).await
    }

    async fn stats(&self, channel: &ChannelRef) -> String {
        let info = match self.engine.resolver().resolve(channel).await {
            Ok(resolved) => self.engine.api().conversation_info(&resolved.id).await,
            Err(SearchError::ChannelNotFound(name)) => {
                return format!(":x: Channel #{name} not found. Check the channel name.")
            }
            Err(e) => return format!(":x: Failed to get statistics: {e}"),
        };
        match info {
            Ok(info) => render_channel_stats(&info),
            Err(e) => {
                warn!(channel = %channel, error = %e, "conversations.info failed");
                format!(":x: Failed to get statistics: {e}")
            }
        }
    }
}

async fn send(
    out: &mpsc::Sender<OutboundMessage>,
    msg: &InboundMessage,
    content: impl Into<String>,
) -> Result<()> {
    out.send(OutboundMessage::reply_to(msg, content))
        .await
        .context("outbound channel closed")
}

/// Tell the user a message failed. Returns whether the reply was queued.
async fn send_error_reply(
    out: &mpsc::Sender<OutboundMessage>,
    msg: &InboundMessage,
    err: &anyhow::Error,
) -> bool {
    let reply = OutboundMessage::reply_to(msg, format!(":x: Error: {err}"));
    match out.send(reply).await {
        Ok(()) => true,
        Err(e) => {
            warn!(chat_id = %e.0.chat_id, "outbound bus closed, error reply dropped");
            false
        }
    }
}
