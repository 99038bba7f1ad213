//! SlackRat API: typed access to the Slack Web API.
//!
//! - **traits**: the `SlackApi` trait every caller depends on
//! - **client**: `SlackClient`, the reqwest implementation
//! - **error**: `SlackApiError`

pub mod client;
pub mod error;
pub mod traits;

pub use client::SlackClient;
pub use error::SlackApiError;
pub use traits::{list_all_conversations, ConversationPage, HistoryQuery, SlackApi};
