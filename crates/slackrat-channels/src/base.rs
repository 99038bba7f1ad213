//! Channel trait: the interface every chat transport implements.
//!
//! - `start()`: begin delivering inbound messages (long-running)
//! - `stop()`: graceful shutdown
//! - `send()`: deliver an outbound reply
//! - `name()`: identifier matched against `OutboundMessage.channel`

use async_trait::async_trait;
use slackrat_core::bus::OutboundMessage;

/// The `ChannelManager` holds `Arc<dyn Channel>` and orchestrates
/// start/stop/send across all registered channels.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name (e.g. "slack").
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    ///
    /// Runs until `stop()` is called. Transports that receive their
    /// messages elsewhere (the HTTP gateway) just wait for the stop signal.
    async fn start(&self) -> anyhow::Result<()>;

    async fn stop(&self) -> anyhow::Result<()>;

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()>;
}
