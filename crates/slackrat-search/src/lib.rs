//! Channel search for SlackRat: resolving channels, matching messages,
//! enriching and summarizing results, and the chat bot that drives it all.

pub mod analysis;
pub mod bot;
pub mod cache;
pub mod commands;
pub mod engine;
pub mod error;
pub mod export;
pub mod history;
pub mod matcher;
pub mod outcome;
pub mod resolver;
pub mod summary;

#[cfg(test)]
mod testing;

pub use bot::SearchBot;
pub use engine::SearchEngine;
pub use error::SearchError;
pub use matcher::Matcher;
pub use outcome::{CombinedOutcome, SearchOptions, SearchOutcome};
pub use resolver::{ChannelRef, ChannelResolver};
