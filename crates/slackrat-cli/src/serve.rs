//! `slackrat serve`: runs the Slack channel, the HTTP gateway and the
//! search bot together.
//!
//! Startup sequence:
//! 1. Load config, build the Web API client and search engine
//! 2. Create the message bus shared by bot and channels
//! 3. Register the Slack channel with the channel manager
//! 4. Bind the HTTP gateway (Events API, slash commands, REST API)
//! 5. Run: `tokio::select!` of bot + channels + gateway + Ctrl+C

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use slackrat_channels::server::{self, GatewayState};
use slackrat_channels::{ChannelManager, InboundFilter, SlackChannel};
use slackrat_core::bus::queue::MessageBus;
use slackrat_core::config::{load_config, Config, InboundMode};
use slackrat_search::SearchBot;

use crate::helpers;

/// Bus capacity in each direction.
const BUS_CAPACITY: usize = 100;

pub async fn run() -> Result<()> {
    helpers::print_banner();

    let config = load_config(None);
    let client = helpers::build_client(&config)?;
    let engine = helpers::build_engine(&config, client.clone());

    let bus = Arc::new(MessageBus::new(BUS_CAPACITY));
    let filter = Arc::new(InboundFilter::new(config.slack.clone()));
    let bot = Arc::new(SearchBot::new(engine.clone(), config.search.clone()));

    let mut channel_manager = ChannelManager::new(bus.clone());
    channel_manager.register(Arc::new(SlackChannel::new(
        config.slack.clone(),
        client,
        filter.clone(),
        bus.clone(),
    )));

    let state = Arc::new(GatewayState {
        engine,
        filter,
        inbound: bus.inbound_sender(),
        signing_secret: config.slack.signing_secret.clone(),
        api_token: config.gateway.api_token.clone(),
        search: config.search.clone(),
        mode: config.slack.mode,
        app_token_set: !config.slack.app_token.is_empty(),
    });
    let addr = gateway_addr(&config);

    info!(
        addr = %addr,
        mode = ?config.slack.mode,
        channels = ?channel_manager.channel_names(),
        "slackrat starting"
    );
    print_summary(&config, &addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::select! {
        _ = bot.clone().run(bus.clone()) => {
            info!("search bot exited");
        }
        result = channel_manager.start_all() => {
            if let Err(e) = result {
                error!(error = %e, "channel manager error");
            }
        }
        result = server::serve(&addr, state, shutdown_rx) => {
            if let Err(e) = result {
                error!(error = %e, "HTTP gateway error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("  Shutting down...");
            info!("received Ctrl+C, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    channel_manager.stop_all().await;

    println!("  SlackRat stopped. Goodbye!");
    Ok(())
}

fn gateway_addr(config: &Config) -> String {
    format!("{}:{}", config.gateway.host, config.gateway.port)
}

fn print_summary(config: &Config, addr: &str) {
    let mode = match config.slack.mode {
        InboundMode::Events => "Events API (POST /slack/events)",
        InboundMode::Socket => "Socket Mode",
    };
    println!("  Gateway:   http://{addr}");
    println!("  Inbound:   {mode}");
    println!(
        "  Signing:   {}",
        helpers::signing_summary(&config.slack.signing_secret)
    );
    println!(
        "  API auth:  {}",
        if config.gateway.api_token.is_empty() {
            "off"
        } else {
            "bearer token"
        }
    );
    if config.slack.mode == InboundMode::Socket && config.slack.app_token.is_empty() {
        println!("  ⚠  Socket Mode needs an app token (SLACK_APP_TOKEN).");
    }
    println!();
    println!("  Ctrl+C to stop");
    println!();
}
