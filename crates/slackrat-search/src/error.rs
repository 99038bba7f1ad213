use slackrat_api::SlackApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// No visible public or private channel carries this name.
    #[error("channel #{0} not found")]
    ChannelNotFound(String),

    /// A user-supplied regular expression failed to compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A statistics window of zero days, or an inverted time range.
    #[error("invalid time window: {0}")]
    InvalidWindow(String),

    #[error(transparent)]
    Api(#[from] SlackApiError),
}
