//! SlackRat Channels: how the bot talks to Slack.
//!
//! - **slack**: outbound delivery and Socket Mode intake
//! - **server**: HTTP gateway for Events API callbacks, slash commands and the REST API
//! - **events**: inbound filtering shared by both transports
//! - **signature**: request signature verification
//! - **manager**: channel lifecycle and reply routing

pub mod base;
pub mod events;
pub mod formatting;
pub mod manager;
pub mod server;
pub mod signature;
pub mod slack;

pub use base::Channel;
pub use events::InboundFilter;
pub use manager::ChannelManager;
pub use server::GatewayState;
pub use slack::SlackChannel;
