//! Slack Web API client over reqwest.
//!
//! Every call is a POST to `{base_url}/{method}` with the bot token as a
//! bearer credential. Reads are form-encoded, writes send JSON. Slack always
//! answers with an envelope `{ "ok": bool, "error": "...", ... }`; a false `ok`
//! becomes `SlackApiError::Api`. HTTP 429 is retried after `Retry-After`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use slackrat_core::types::{AuthIdentity, ChannelInfo, ChannelKind, SlackMessage, SlackUser};

use crate::error::SlackApiError;
use crate::traits::{ConversationPage, HistoryQuery, SlackApi};

/// Base URL for the Slack Web API.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 2;

enum Payload<'a> {
    Form(&'a [(&'a str, String)]),
    Json(Value),
}

// ─────────────────────────────────────────────
// SlackClient
// ─────────────────────────────────────────────

pub struct SlackClient {
    http: reqwest::Client,
    bot_token: String,
    base_url: String,
    max_retries: u32,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_base_url(bot_token, SLACK_API_BASE)
    }

    /// Client pointing at a custom base URL (proxies, tests).
    pub fn with_base_url(bot_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            bot_token: bot_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// How many times a 429 is retried before giving up.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `apps.connections.open`: WebSocket URL for Socket Mode.
    ///
    /// Authenticates with the app-level token (`xapp-...`), not the bot token.
    pub async fn open_socket_connection(&self, app_token: &str) -> Result<String, SlackApiError> {
        let method = "apps.connections.open";
        let mut body = self.call(method, app_token, Payload::Form(&[])).await?;
        take_required(method, &mut body, "url")
    }

    async fn call(
        &self,
        method: &str,
        token: &str,
        payload: Payload<'_>,
    ) -> Result<Value, SlackApiError> {
        let url = format!("{}/{}", self.base_url, method);
        let mut attempt = 0;

        loop {
            let request = self.http.post(&url).bearer_auth(token);
            let request = match &payload {
                Payload::Form(params) => request.form(params),
                Payload::Json(json) => request.json(json),
            };

            debug!(method, attempt, "Calling Slack Web API");

            let resp = request.send().await.map_err(|e| SlackApiError::Http {
                method: method.to_string(),
                source: e,
            })?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(1);

                if attempt >= self.max_retries {
                    return Err(SlackApiError::RateLimited {
                        method: method.to_string(),
                        retry_after,
                    });
                }
                attempt += 1;
                warn!(method, retry_after, attempt, "Rate limited by Slack, backing off");
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            let status = resp.status();
            let body: Value = resp.json().await.map_err(|e| SlackApiError::Decode {
                method: method.to_string(),
                message: format!("HTTP {status}: {e}"),
            })?;

            if body["ok"].as_bool() != Some(true) {
                let code = body["error"].as_str().unwrap_or("unknown_error").to_string();
                debug!(method, code = %code, "Slack API returned an error");
                return Err(SlackApiError::Api {
                    method: method.to_string(),
                    code,
                });
            }

            if let Some(warning) = body["warning"].as_str() {
                debug!(method, warning, "Slack API warning");
            }

            return Ok(body);
        }
    }

    async fn read(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<Value, SlackApiError> {
        self.call(method, &self.bot_token, Payload::Form(params)).await
    }

    async fn write(&self, method: &str, json: Value) -> Result<Value, SlackApiError> {
        self.call(method, &self.bot_token, Payload::Json(json)).await
    }
}

/// Move `key` out of the envelope; a missing key is a decode error.
fn take_required<T: DeserializeOwned>(
    method: &str,
    body: &mut Value,
    key: &str,
) -> Result<T, SlackApiError> {
    let value = body.get_mut(key).map(Value::take).unwrap_or(Value::Null);
    if value.is_null() {
        return Err(SlackApiError::Decode {
            method: method.to_string(),
            message: format!("missing `{key}`"),
        });
    }
    serde_json::from_value(value).map_err(|e| SlackApiError::Decode {
        method: method.to_string(),
        message: format!("bad `{key}`: {e}"),
    })
}

/// Like `take_required`, but a missing key yields `T::default()`.
fn take_or_default<T: DeserializeOwned + Default>(
    method: &str,
    body: &mut Value,
    key: &str,
) -> Result<T, SlackApiError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(_) => take_required(method, body, key),
    }
}

fn format_epoch(secs: f64) -> String {
    format!("{secs:.6}")
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn auth_test(&self) -> Result<AuthIdentity, SlackApiError> {
        let body = self.read("auth.test", &[]).await?;
        serde_json::from_value(body).map_err(|e| SlackApiError::Decode {
            method: "auth.test".into(),
            message: e.to_string(),
        })
    }

    async fn list_conversations(
        &self,
        kind: ChannelKind,
        exclude_archived: bool,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<ConversationPage, SlackApiError> {
        let method = "conversations.list";
        let mut params = vec![
            ("types", kind.as_api_type().to_string()),
            ("exclude_archived", exclude_archived.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(c) = cursor {
            params.push(("cursor", c.to_string()));
        }

        let mut body = self.read(method, &params).await?;
        let channels: Vec<ChannelInfo> = take_or_default(method, &mut body, "channels")?;
        let next_cursor = body["response_metadata"]["next_cursor"]
            .as_str()
            .filter(|c| !c.is_empty())
            .map(String::from);

        Ok(ConversationPage {
            channels,
            next_cursor,
        })
    }

    async fn conversation_info(&self, channel: &str) -> Result<ChannelInfo, SlackApiError> {
        let method = "conversations.info";
        let mut body = self.read(method, &[("channel", channel.to_string())]).await?;
        take_required(method, &mut body, "channel")
    }

    async fn conversation_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        let method = "conversations.history";
        let mut params = vec![
            ("channel", query.channel.clone()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(oldest) = query.oldest {
            params.push(("oldest", format_epoch(oldest)));
        }
        if let Some(latest) = query.latest {
            params.push(("latest", format_epoch(latest)));
        }

        let mut body = self.read(method, &params).await?;
        if body["has_more"].as_bool() == Some(true) {
            debug!(channel = %query.channel, limit = query.limit, "History truncated to one page");
        }
        take_or_default(method, &mut body, "messages")
    }

    async fn conversation_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackApiError> {
        let method = "conversations.replies";
        let mut body = self
            .read(
                method,
                &[("channel", channel.to_string()), ("ts", thread_ts.to_string())],
            )
            .await?;
        take_or_default(method, &mut body, "messages")
    }

    async fn join_conversation(&self, channel: &str) -> Result<(), SlackApiError> {
        self.write("conversations.join", serde_json::json!({ "channel": channel }))
            .await?;
        Ok(())
    }

    async fn user_info(&self, user: &str) -> Result<SlackUser, SlackApiError> {
        let method = "users.info";
        let mut body = self.read(method, &[("user", user.to_string())]).await?;
        take_required(method, &mut body, "user")
    }

    async fn list_users(&self, limit: u32) -> Result<Vec<SlackUser>, SlackApiError> {
        let method = "users.list";
        let mut body = self.read(method, &[("limit", limit.to_string())]).await?;
        take_or_default(method, &mut body, "members")
    }

    async fn permalink(&self, channel: &str, ts: &str) -> Result<String, SlackApiError> {
        let method = "chat.getPermalink";
        let mut body = self
            .read(
                method,
                &[("channel", channel.to_string()), ("message_ts", ts.to_string())],
            )
            .await?;
        take_required(method, &mut body, "permalink")
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, SlackApiError> {
        let method = "chat.postMessage";
        let mut payload = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            payload["thread_ts"] = Value::String(ts.to_string());
        }

        debug!(channel = %channel, "Posting message");
        let mut body = self.write(method, payload).await?;
        take_required(method, &mut body, "ts")
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> Result<(), SlackApiError> {
        self.write("chat.delete", serde_json::json!({ "channel": channel, "ts": ts }))
            .await?;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ok(extra: Value) -> ResponseTemplate {
        let mut body = serde_json::json!({ "ok": true });
        if let (Some(obj), Some(add)) = (body.as_object_mut(), extra.as_object()) {
            obj.extend(add.clone());
        }
        ResponseTemplate::new(200).set_body_json(body)
    }

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::with_base_url("xoxb-test", server.uri())
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(SlackClient::new("xoxb").base_url(), "https://slack.com/api");
        assert_eq!(
            SlackClient::with_base_url("xoxb", "http://localhost:9/api/").base_url(),
            "http://localhost:9/api"
        );
    }

    #[tokio::test]
    async fn test_auth_test_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .and(header("Authorization", "Bearer xoxb-test"))
            .respond_with(ok(serde_json::json!({
                "user": "searchbot",
                "user_id": "UBOT",
                "team": "Acme",
                "team_id": "T1",
                "bot_id": "B1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let me = client(&server).auth_test().await.unwrap();
        assert_eq!(me.user, "searchbot");
        assert_eq!(me.user_id, "UBOT");
        assert_eq!(me.bot_id.as_deref(), Some("B1"));
    }

    #[tokio::test]
    async fn test_api_error_surfaces_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.history"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "ok": false, "error": "not_in_channel" })),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .conversation_history(&HistoryQuery::new("C1", 100))
            .await
            .unwrap_err();
        assert!(err.is_code("not_in_channel"));
        assert_eq!(err.method(), "conversations.history");
    }

    #[tokio::test]
    async fn test_history_sends_form_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.history"))
            .and(body_string_contains("channel=C42"))
            .and(body_string_contains("limit=1000"))
            .and(body_string_contains("oldest=1700000000.000000"))
            .respond_with(ok(serde_json::json!({
                "messages": [
                    { "type": "message", "ts": "1700000100.000100", "user": "U1", "text": "deploy done" },
                    { "type": "message", "ts": "1700000050.000100", "bot_id": "B9", "text": "ci green" }
                ],
                "has_more": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = HistoryQuery::new("C42", 5000).oldest(Some(1_700_000_000.0));
        let messages = client(&server).conversation_history(&query).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].user.as_deref(), Some("U1"));
        assert_eq!(messages[1].bot_id.as_deref(), Some("B9"));
    }

    #[tokio::test]
    async fn test_list_conversations_reads_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.list"))
            .and(body_string_contains("types=private_channel"))
            .and(body_string_contains("exclude_archived=true"))
            .respond_with(ok(serde_json::json!({
                "channels": [{ "id": "G1", "name": "ops", "is_private": true }],
                "response_metadata": { "next_cursor": "abc" }
            })))
            .mount(&server)
            .await;

        let page = client(&server)
            .list_conversations(ChannelKind::Private, true, None, 200)
            .await
            .unwrap();
        assert_eq!(page.channels[0].name, "ops");
        assert!(page.channels[0].is_private);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_post_message_sends_json_with_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(serde_json::json!({
                "channel": "D1",
                "text": "hello",
                "thread_ts": "1700000000.000100"
            })))
            .respond_with(ok(serde_json::json!({ "ts": "1700000200.000001" })))
            .expect(1)
            .mount(&server)
            .await;

        let ts = client(&server)
            .post_message("D1", "hello", Some("1700000000.000100"))
            .await
            .unwrap();
        assert_eq!(ts, "1700000200.000001");
    }

    #[tokio::test]
    async fn test_permalink_and_user_info() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.getPermalink"))
            .and(body_string_contains("message_ts=1700000000.000100"))
            .respond_with(ok(serde_json::json!({
                "channel": "C1",
                "permalink": "https://acme.slack.com/archives/C1/p1700000000000100"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users.info"))
            .respond_with(ok(serde_json::json!({
                "user": { "id": "U1", "name": "jdoe", "real_name": "Jane Doe", "is_bot": false }
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        let link = c.permalink("C1", "1700000000.000100").await.unwrap();
        assert!(link.ends_with("p1700000000000100"));
        let user = c.user_info("U1").await.unwrap();
        assert_eq!(user.display_name(), "Jane Doe");
    }

    #[tokio::test]
    async fn test_missing_required_field_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/conversations.info"))
            .respond_with(ok(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client(&server).conversation_info("C1").await.unwrap_err();
        assert!(matches!(err, SlackApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let err = client(&server).auth_test().await.unwrap_err();
        match err {
            SlackApiError::Decode { message, .. } => assert!(message.contains("502")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users.list"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users.list"))
            .respond_with(ok(serde_json::json!({
                "members": [{ "id": "U1", "name": "a" }, { "id": "U2", "name": "b" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let users = client(&server).list_users(10).await.unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users.list"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server)
            .with_max_retries(1)
            .list_users(10)
            .await
            .unwrap_err();
        assert!(matches!(err, SlackApiError::RateLimited { retry_after: 0, .. }));
    }

    #[tokio::test]
    async fn test_open_socket_connection_uses_app_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apps.connections.open"))
            .and(header("Authorization", "Bearer xapp-1"))
            .respond_with(ok(serde_json::json!({ "url": "wss://wss.slack.test/link" })))
            .mount(&server)
            .await;

        let url = client(&server).open_socket_connection("xapp-1").await.unwrap();
        assert_eq!(url, "wss://wss.slack.test/link");
    }

    #[tokio::test]
    async fn test_network_error() {
        let c = SlackClient::with_base_url("xoxb", "http://127.0.0.1:1");
        let err = c.auth_test().await.unwrap_err();
        assert!(matches!(err, SlackApiError::Http { .. }));
    }
}
