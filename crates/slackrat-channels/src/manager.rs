//! Channel manager: runs the transports and routes bot replies to them.
//!
//! `start_all` spawns every channel plus one outbound dispatcher and parks
//! until `stop_all`. Shutdown asks each channel to stop, then gives its task
//! a grace period before aborting it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use slackrat_core::bus::{MessageBus, OutboundMessage};

use crate::base::Channel;

const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

type Channels = HashMap<String, Arc<dyn Channel>>;

pub struct ChannelManager {
    channels: Channels,
    bus: Arc<MessageBus>,
    /// Flipped to `true` once on shutdown.
    shutdown: watch::Sender<bool>,
    /// Running `start()` tasks, by channel name.
    tasks: Mutex<Vec<(String, JoinHandle<()>)>>,
    stop_grace: Duration,
}

impl ChannelManager {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            channels: HashMap::new(),
            bus,
            shutdown,
            tasks: Mutex::new(Vec::new()),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// How long `stop_all` waits for each channel task before aborting it.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Replaces any channel registered under the same name.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        let name = channel.name().to_string();
        info!(channel = %name, "registered channel");
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Channel>> {
        self.channels.get(name)
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Start every channel and the dispatcher, then wait for [`stop_all`](Self::stop_all).
    pub async fn start_all(&self) -> Result<()> {
        if self.channels.is_empty() {
            warn!("no channels registered, nothing to start");
            return Ok(());
        }
        info!(channels = ?self.channel_names(), "starting channels");

        {
            let mut tasks = self.tasks.lock().await;
            for (name, channel) in &self.channels {
                tasks.push((name.clone(), spawn_channel(name.clone(), channel.clone())));
            }
        }
        tokio::spawn(dispatch_outbound(
            self.bus.clone(),
            self.channels.clone(),
            self.shutdown.subscribe(),
        ));

        let mut done = self.shutdown.subscribe();
        let _ = done.wait_for(|&stop| stop).await;
        info!("channel manager shutting down");
        Ok(())
    }

    /// Signal shutdown, stop every channel, and reap their tasks.
    pub async fn stop_all(&self) {
        info!("stopping all channels");
        self.shutdown.send_replace(true);

        for (name, channel) in &self.channels {
            debug!(channel = %name, "stopping channel");
            if let Err(e) = channel.stop().await {
                error!(channel = %name, error = %e, "channel stop failed");
            }
        }

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for (name, handle) in tasks {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.stop_grace, handle).await.is_err() {
                warn!(channel = %name, grace_ms = self.stop_grace.as_millis() as u64, "channel did not stop in time, aborting");
                abort.abort();
            }
        }
        info!("all channels stopped");
    }
}

fn spawn_channel(name: String, channel: Arc<dyn Channel>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(channel = %name, "channel starting");
        if let Err(e) = channel.start().await {
            error!(channel = %name, error = %e, "channel start failed");
        }
        info!(channel = %name, "channel stopped");
    })
}

/// Deliver replies from the bus to the channel each one names.
async fn dispatch_outbound(
    bus: Arc<MessageBus>,
    channels: Channels,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("outbound dispatcher started");
    loop {
        let outbound = tokio::select! {
            msg = bus.consume_outbound() => msg,
            _ = shutdown.wait_for(|&stop| stop) => {
                info!("dispatcher received shutdown signal");
                return;
            }
        };
        match outbound {
            Some(msg) => deliver(&channels, &msg).await,
            None => {
                info!("outbound bus closed, dispatcher exiting");
                return;
            }
        }
    }
}

async fn deliver(channels: &Channels, msg: &OutboundMessage) {
    let Some(channel) = channels.get(&msg.channel) else {
        warn!(channel = %msg.channel, "no channel registered for outbound message");
        return;
    };
    debug!(
        channel = %msg.channel,
        chat_id = %msg.chat_id,
        thread = msg.reply_to.as_deref().unwrap_or("-"),
        content_len = msg.content.len(),
        "dispatching reply"
    );
    if let Err(e) = channel.send(msg).await {
        error!(channel = %msg.channel, chat_id = %msg.chat_id, error = %e, "failed to send reply");
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
