//! SlackRat Core: shared building blocks for every other crate.
//!
//! - **types**: the Slack data model returned by the Web API
//! - **bus**: async message bus between channels and the search bot
//! - **config**: `~/.slackrat/config.json` schema and loader
//! - **utils**: paths, truncation, timestamp formatting

pub mod bus;
pub mod config;
pub mod types;
pub mod utils;
