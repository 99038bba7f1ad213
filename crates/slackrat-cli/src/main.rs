//! SlackRat CLI: entry point.
//!
//! # Commands
//!
//! - `slackrat serve`: run the bot: Slack channel, HTTP gateway, search bot
//! - `slackrat search <KEYWORD>... -c <CHANNEL>...`: one-shot search
//! - `slackrat channels | stats | active-users`: channel information
//! - `slackrat doctor`: check the bot token's scopes
//! - `slackrat status | onboard`: configuration
//! - `slackrat repl`: talk to the bot locally

mod doctor;
mod helpers;
mod onboard;
mod query;
mod repl;
mod serve;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 🐀 SlackRat: search Slack channel history from chat, HTTP or the terminal
#[derive(Parser)]
#[command(name = "slackrat", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (Slack channel + HTTP gateway + search bot)
    Serve {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,

        /// Emit logs as JSON lines
        #[arg(long, default_value_t = false)]
        json_logs: bool,
    },

    /// Search one or more channels for one or more keywords
    Search(query::SearchArgs),

    /// List the channels the bot can see
    Channels,

    /// Message activity of a channel
    Stats {
        /// Channel name, #name or ID
        channel: String,

        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Most active posters in a channel
    ActiveUsers {
        /// Channel name, #name or ID
        channel: String,

        #[arg(long, default_value_t = 30)]
        days: u32,
    },

    /// Check which Slack scopes the bot token has
    Doctor {
        /// Also read history from this channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Keyword tried against that channel's history
        #[arg(short, long)]
        keyword: Option<String>,
    },

    /// Show configuration status
    Status,

    /// Write a default configuration file
    Onboard,

    /// Chat with the bot locally
    Repl {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { logs, json_logs } => {
            init_logging(if logs { LogLevel::Debug } else { LogLevel::Info }, json_logs);
            serve::run().await
        }
        Commands::Search(args) => {
            init_logging(LogLevel::for_verbose(args.logs), false);
            query::search(args).await
        }
        Commands::Channels => {
            init_logging(LogLevel::Quiet, false);
            query::channels().await
        }
        Commands::Stats { channel, days } => {
            init_logging(LogLevel::Quiet, false);
            query::stats(&channel, days).await
        }
        Commands::ActiveUsers { channel, days } => {
            init_logging(LogLevel::Quiet, false);
            query::active_users(&channel, days).await
        }
        Commands::Doctor { channel, keyword } => {
            init_logging(LogLevel::Quiet, false);
            doctor::run(channel.as_deref(), keyword.as_deref()).await
        }
        Commands::Status => status::run(),
        Commands::Onboard => onboard::run(),
        Commands::Repl { logs } => {
            init_logging(LogLevel::for_verbose(logs), false);
            repl::run().await
        }
    }
}

// ─────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    Debug,
    Info,
    Quiet,
}

impl LogLevel {
    fn for_verbose(verbose: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Quiet
        }
    }

    fn directives(self) -> &'static str {
        match self {
            LogLevel::Debug => "slackrat=debug,info",
            LogLevel::Info => "info",
            LogLevel::Quiet => "warn",
        }
    }
}

/// Initialize tracing. `RUST_LOG` wins over the level picked here.
fn init_logging(level: LogLevel, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directives()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
