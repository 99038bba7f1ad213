//! Two bounded queues between the transports and the search bot.
//!
//! Inbound carries user messages toward the bot, outbound carries replies
//! back to the channel manager. Each lane is a `tokio::sync::mpsc` channel
//! whose receiver sits behind a mutex so the bus can be shared as `Arc`.

use tokio::sync::{mpsc, Mutex};

use super::types::{InboundMessage, OutboundMessage};

/// One direction of the bus.
struct Lane<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
}

impl<T> Lane<T> {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Waits for the next item; `None` once every sender is gone.
    async fn next(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

/// Transports (Events API, Socket Mode, slash commands) publish inbound;
/// the bot consumes inbound and publishes replies outbound; the channel
/// manager consumes outbound.
pub struct MessageBus {
    inbound: Lane<InboundMessage>,
    outbound: Lane<OutboundMessage>,
}

impl MessageBus {
    /// `capacity` bounds each direction separately.
    pub fn new(capacity: usize) -> Self {
        Self {
            inbound: Lane::new(capacity),
            outbound: Lane::new(capacity),
        }
    }

    pub async fn publish_inbound(
        &self,
        msg: InboundMessage,
    ) -> Result<(), mpsc::error::SendError<InboundMessage>> {
        self.inbound.tx.send(msg).await
    }

    pub async fn consume_inbound(&self) -> Option<InboundMessage> {
        self.inbound.next().await
    }

    pub async fn publish_outbound(
        &self,
        msg: OutboundMessage,
    ) -> Result<(), mpsc::error::SendError<OutboundMessage>> {
        self.outbound.tx.send(msg).await
    }

    pub async fn consume_outbound(&self) -> Option<OutboundMessage> {
        self.outbound.next().await
    }

    /// Handed to the HTTP gateway, which must never block a Slack callback.
    pub fn inbound_sender(&self) -> mpsc::Sender<InboundMessage> {
        self.inbound.tx.clone()
    }

    pub fn outbound_sender(&self) -> mpsc::Sender<OutboundMessage> {
        self.outbound.tx.clone()
    }
}
