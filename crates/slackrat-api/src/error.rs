use thiserror::Error;

/// Failure of a single Web API call.
#[derive(Debug, Error)]
pub enum SlackApiError {
    /// Transport failure (DNS, TLS, connection reset, timeout).
    #[error("{method}: HTTP request failed: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    /// Slack answered `ok: false`.
    #[error("{method} failed: {code}")]
    Api { method: String, code: String },

    /// The body was not the JSON envelope we expected.
    #[error("{method}: unexpected response: {message}")]
    Decode { method: String, message: String },

    /// Still throttled after exhausting retries.
    #[error("{method}: rate limited by Slack (retry after {retry_after}s)")]
    RateLimited { method: String, retry_after: u64 },
}

impl SlackApiError {
    /// Shorthand for an `ok: false` response.
    pub fn api(method: impl Into<String>, code: impl Into<String>) -> Self {
        SlackApiError::Api {
            method: method.into(),
            code: code.into(),
        }
    }

    /// Slack's error code (`channel_not_found`, `missing_scope`, ...), if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            SlackApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    /// Web API method the error came from.
    pub fn method(&self) -> &str {
        match self {
            SlackApiError::Http { method, .. }
            | SlackApiError::Api { method, .. }
            | SlackApiError::Decode { method, .. }
            | SlackApiError::RateLimited { method, .. } => method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_code() {
        let err = SlackApiError::api("conversations.join", "already_in_channel");
        assert_eq!(err.code(), Some("already_in_channel"));
        assert!(err.is_code("already_in_channel"));
        assert_eq!(err.method(), "conversations.join");
        assert_eq!(err.to_string(), "conversations.join failed: already_in_channel");
    }

    #[test]
    fn test_non_api_error_has_no_code() {
        let err = SlackApiError::RateLimited {
            method: "conversations.history".into(),
            retry_after: 30,
        };
        assert!(err.code().is_none());
        assert!(err.to_string().contains("retry after 30s"));
    }
}
