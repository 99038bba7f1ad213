//! Slack channel: Web API delivery plus optional Socket Mode intake.
//!
//! Outbound replies always go through `chat.postMessage`. Inbound traffic
//! arrives one of two ways, picked by `slack.mode`:
//!
//! - `events`: the HTTP gateway receives Events API callbacks; this channel
//!   only idles until shutdown.
//! - `socket`: this channel opens a Socket Mode WebSocket, ACKs every
//!   envelope, and feeds events and slash commands into the bus.

use std::sync::Arc;
#[cfg(feature = "socket")]
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
#[cfg(feature = "socket")]
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use slackrat_api::{SlackApi, SlackClient};
use slackrat_core::bus::{InboundMessage, MessageBus, OutboundMessage};
use slackrat_core::config::{InboundMode, SlackConfig};

use crate::base::Channel;
use crate::events::{route_slash_command, InboundFilter, SlashCommand, Verdict, SLACK_CHANNEL_NAME};
use crate::formatting::{split_message, SLACK_MAX_LEN};

// ─────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────

/// Reconnect backoff step (seconds).
#[cfg(feature = "socket")]
const RECONNECT_DELAY_SECS: u64 = 5;

/// Maximum reconnect attempts before giving up.
#[cfg(feature = "socket")]
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

// ─────────────────────────────────────────────
// Socket Mode types
// ─────────────────────────────────────────────

/// Socket Mode envelope received from Slack.
#[derive(Debug, Clone, Deserialize)]
struct SocketEnvelope {
    /// Must be ACKed immediately.
    envelope_id: String,
    /// `"events_api"`, `"slash_commands"`, `"interactive"`.
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: Value,
}

/// ACK sent back to Slack. Slash commands may carry a response payload.
#[derive(Debug, Serialize)]
struct SocketAck {
    envelope_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

/// What an envelope produced: the ACK to send and the bot work to queue.
#[derive(Debug)]
struct EnvelopeOutcome {
    ack: SocketAck,
    inbound: Option<InboundMessage>,
}

#[cfg(feature = "socket")]
type WsSender = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    tokio_tungstenite::tungstenite::Message,
>;

// ─────────────────────────────────────────────
// SlackChannel
// ─────────────────────────────────────────────

pub struct SlackChannel {
    config: SlackConfig,
    client: Arc<SlackClient>,
    filter: Arc<InboundFilter>,
    bus: Arc<MessageBus>,
    shutdown: Notify,
    /// Active WebSocket write half (for ACKs and pongs).
    #[cfg(feature = "socket")]
    ws_write: Mutex<Option<WsSender>>,
}

impl SlackChannel {
    pub fn new(
        config: SlackConfig,
        client: Arc<SlackClient>,
        filter: Arc<InboundFilter>,
        bus: Arc<MessageBus>,
    ) -> Self {
        Self {
            config,
            client,
            filter,
            bus,
            shutdown: Notify::new(),
            #[cfg(feature = "socket")]
            ws_write: Mutex::new(None),
        }
    }

    /// Resolve the bot's own user ID so self-messages and mentions are recognised.
    async fn resolve_bot_id(&self) {
        match self.client.auth_test().await {
            Ok(identity) => {
                info!(bot_user_id = %identity.user_id, team = %identity.team, "resolved Slack bot user ID");
                self.filter.set_bot_user_id(identity.user_id).await;
            }
            Err(e) => {
                warn!(error = %e, "could not resolve bot user ID (mention detection may not work)");
            }
        }
    }

    // ─────────────────────────────────────────
    // Socket Mode event processing
    // ─────────────────────────────────────────

    /// Turn an envelope into its ACK and, when relevant, a bot message.
    async fn process_envelope(&self, envelope: SocketEnvelope) -> EnvelopeOutcome {
        let mut ack = SocketAck {
            envelope_id: envelope.envelope_id,
            payload: None,
        };

        let inbound = match envelope.envelope_type.as_str() {
            "events_api" => {
                let event = &envelope.payload["event"];
                match self.filter.classify_event(event, "socket").await {
                    Verdict::Deliver(msg) => Some(msg),
                    Verdict::Ignore(reason) => {
                        debug!(reason, "ignoring socket event");
                        None
                    }
                }
            }
            "slash_commands" => {
                let cmd = SlashCommand::from_json(&envelope.payload);
                info!(command = %cmd.command, user = %cmd.user_id, "slash command via socket");
                let route = route_slash_command(&cmd, "command");
                ack.payload = Some(serde_json::json!({
                    "response_type": "ephemeral",
                    "text": route.ephemeral,
                }));
                route.dispatch
            }
            other => {
                debug!(envelope_type = %other, "ignoring envelope type");
                None
            }
        };

        EnvelopeOutcome { ack, inbound }
    }

    async fn publish(&self, msg: InboundMessage) {
        if let Err(e) = self.bus.publish_inbound(msg).await {
            error!(error = %e, "failed to publish inbound message");
        }
    }

    // ─────────────────────────────────────────
    // WebSocket loop
    // ─────────────────────────────────────────

    /// Main Socket Mode loop: connect, receive envelopes, ACK, reconnect.
    #[cfg(feature = "socket")]
    async fn run_socket_loop(&self) -> anyhow::Result<()> {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        let mut attempts: u32 = 0;

        loop {
            if attempts >= MAX_RECONNECT_ATTEMPTS {
                anyhow::bail!("exceeded max reconnect attempts ({MAX_RECONNECT_ATTEMPTS})");
            }

            if attempts > 0 {
                let delay = Duration::from_secs(RECONNECT_DELAY_SECS * u64::from(attempts).min(6));
                info!(
                    attempt = attempts,
                    delay_secs = delay.as_secs(),
                    "reconnecting to Slack Socket Mode..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown.notified() => {
                        info!("shutdown during reconnect backoff");
                        return Ok(());
                    }
                }
            }

            let ws_url = match self.client.open_socket_connection(&self.config.app_token).await {
                Ok(url) => url,
                Err(e) => {
                    error!(error = %e, "failed to get Socket Mode URL");
                    attempts += 1;
                    continue;
                }
            };

            let ws_stream = match tokio_tungstenite::connect_async(ws_url.as_str()).await {
                Ok((stream, _)) => {
                    info!("connected to Slack Socket Mode");
                    attempts = 0;
                    stream
                }
                Err(e) => {
                    error!(error = %e, "WebSocket connect failed");
                    attempts += 1;
                    continue;
                }
            };

            let (write, mut read) = ws_stream.split();
            *self.ws_write.lock().await = Some(write);

            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(WsMessage::Text(text))) => {
                                self.handle_ws_message(&text).await;
                            }
                            Some(Ok(WsMessage::Ping(data))) => {
                                let mut guard = self.ws_write.lock().await;
                                if let Some(ref mut w) = *guard {
                                    let _ = w.send(WsMessage::Pong(data)).await;
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) => {
                                info!("Slack WebSocket closed by server");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "Slack WebSocket error");
                                break;
                            }
                            None => {
                                info!("Slack WebSocket stream ended");
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = self.shutdown.notified() => {
                        info!("shutdown signal received");
                        self.close_socket().await;
                        return Ok(());
                    }
                }
            }

            *self.ws_write.lock().await = None;
            attempts += 1;
        }
    }

    #[cfg(feature = "socket")]
    async fn handle_ws_message(&self, text: &str) {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        if let Ok(msg) = serde_json::from_str::<Value>(text) {
            match msg["type"].as_str() {
                Some("hello") => {
                    info!("received Socket Mode hello");
                    return;
                }
                Some("disconnect") => {
                    let reason = msg["reason"].as_str().unwrap_or("unknown");
                    info!(reason = %reason, "Slack requested disconnect");
                    return;
                }
                _ => {}
            }
        }

        let envelope: SocketEnvelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "failed to parse Socket Mode envelope");
                return;
            }
        };

        let outcome = self.process_envelope(envelope).await;

        if let Ok(ack_json) = serde_json::to_string(&outcome.ack) {
            let mut guard = self.ws_write.lock().await;
            if let Some(ref mut w) = *guard {
                if let Err(e) = w.send(WsMessage::Text(ack_json.into())).await {
                    warn!(error = %e, "failed to send ACK");
                }
            }
        }

        if let Some(msg) = outcome.inbound {
            self.publish(msg).await;
        }
    }

    #[cfg(feature = "socket")]
    async fn close_socket(&self) {
        use futures_util::SinkExt;

        let mut guard = self.ws_write.lock().await;
        if let Some(ref mut w) = *guard {
            let _ = w.close().await;
        }
        *guard = None;
    }
}

// ─────────────────────────────────────────────
// Channel trait implementation
// ─────────────────────────────────────────────

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        SLACK_CHANNEL_NAME
    }

    async fn start(&self) -> anyhow::Result<()> {
        if self.config.bot_token.is_empty() {
            warn!("slack botToken is empty, channel will not start");
            return Ok(());
        }

        self.resolve_bot_id().await;

        match self.config.mode {
            InboundMode::Socket => {
                if self.config.app_token.is_empty() {
                    warn!("slack appToken is empty (required for Socket Mode), channel will not start");
                    return Ok(());
                }
                info!(dm_enabled = self.config.dm.enabled, "starting Slack Socket Mode channel");
                #[cfg(feature = "socket")]
                {
                    self.run_socket_loop().await
                }
                #[cfg(not(feature = "socket"))]
                {
                    anyhow::bail!("socket mode requested but the `socket` feature is disabled")
                }
            }
            InboundMode::Events => {
                info!("Slack channel ready (inbound via Events API gateway)");
                self.shutdown.notified().await;
                Ok(())
            }
        }
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!("stopping Slack channel");
        // notify_one keeps a permit if `start` is not waiting yet.
        self.shutdown.notify_one();
        #[cfg(feature = "socket")]
        self.close_socket().await;
        Ok(())
    }

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        let chunks = split_message(&msg.content, SLACK_MAX_LEN);

        for chunk in &chunks {
            if let Err(e) = self
                .client
                .post_message(&msg.chat_id, chunk, msg.reply_to.as_deref())
                .await
            {
                error!(chat_id = %msg.chat_id, error = %e, "failed to send Slack message");
                return Err(e.into());
            }
        }

        debug!(chat_id = %msg.chat_id, chunks = chunks.len(), "sent Slack message");
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
