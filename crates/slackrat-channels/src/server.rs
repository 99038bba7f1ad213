//! HTTP gateway: Events API webhook, slash commands and the REST search API.
//!
//! Slack endpoints verify the request signature against the raw body and
//! answer right away; the actual work is handed to the bot through the bus.
//! `/api/*` endpoints run searches inline and return JSON (or CSV).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use slackrat_core::bus::InboundMessage;
use slackrat_core::config::{InboundMode, SearchConfig};
use slackrat_search::analysis::{active_users, channel_activity};
use slackrat_search::export::to_csv;
use slackrat_search::{ChannelRef, Matcher, SearchEngine, SearchError, SearchOptions};

use crate::events::{route_slash_command, InboundFilter, SlashCommand, Verdict};
use crate::signature::{unix_now, verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};

const RETRY_HEADER: &str = "x-slack-retry-num";
const DEFAULT_STATS_DAYS: u32 = 30;

const ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /health",
    "GET /test",
    "GET /debug",
    "POST /slack/events",
    "POST /slack/commands",
    "POST /api/search",
    "POST /api/search/multiple",
    "GET /api/channels",
    "GET /api/channel/{channelId}/stats",
    "GET /api/channel/{channelId}/active-users",
];

// ─────────────────────────────────────────────
// State
// ─────────────────────────────────────────────

/// Shared state for every handler.
pub struct GatewayState {
    pub engine: Arc<SearchEngine>,
    pub filter: Arc<InboundFilter>,
    /// Bot work produced by Slack callbacks.
    pub inbound: mpsc::Sender<InboundMessage>,
    pub signing_secret: String,
    /// Bearer token for `/api/*`; empty disables the check.
    pub api_token: String,
    pub search: SearchConfig,
    pub mode: InboundMode,
    /// Whether an app-level token is configured (reported by `/debug`).
    pub app_token_set: bool,
}

// ─────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/test", get(test_handler))
        .route("/debug", get(debug_handler))
        .route("/slack/events", post(events_handler))
        .route("/slack/commands", post(commands_handler))
        .route("/api/search", post(search_handler))
        .route("/api/search/multiple", post(search_multiple_handler))
        .route("/api/channels", get(channels_handler))
        .route("/api/channel/{channel_id}/stats", get(stats_handler))
        .route("/api/channel/{channel_id}/active-users", get(active_users_handler))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` flips to `true`.
pub async fn serve(
    addr: &str,
    state: Arc<GatewayState>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    serve_on(listener, state, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(
    listener: TcpListener,
    state: Arc<GatewayState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    info!(addr = %local, mode = ?state.mode, "HTTP gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&stop| stop).await;
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP gateway error: {e}"))?;

    info!("HTTP gateway stopped");
    Ok(())
}

// ─────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────

/// Error reply: `{ "success": false, "error": "..." }`.
#[derive(Debug)]
struct ApiError(StatusCode, String);

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "success": false, "error": self.1 }))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let status = match &e {
            SearchError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
            SearchError::InvalidPattern { .. } | SearchError::InvalidWindow(_) => {
                StatusCode::BAD_REQUEST
            }
            SearchError::Api(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, e.to_string())
    }
}

type ApiResult = Result<Response, ApiError>;

#[derive(Serialize)]
struct Success<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn success<T: Serialize>(body: T) -> Response {
    Json(Success {
        success: true,
        body,
    })
    .into_response()
}

/// Constant-time bearer check, skipped when no token is configured.
fn check_auth(state: &GatewayState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.api_token.is_empty() {
        return Ok(());
    }

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let expected = format!("Bearer {}", state.api_token);

    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    let ok = if a.len() == b.len() {
        bool::from(a.ct_eq(b))
    } else {
        let _ = a.ct_eq(a);
        false
    };

    if ok {
        Ok(())
    } else {
        Err(ApiError(StatusCode::UNAUTHORIZED, "invalid or missing API token".into()))
    }
}

fn verify_slack(state: &GatewayState, headers: &HeaderMap, body: &[u8]) -> Result<(), ApiError> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    verify_signature(
        &state.signing_secret,
        header_str(TIMESTAMP_HEADER),
        body,
        header_str(SIGNATURE_HEADER),
        unix_now(),
    )
    .map_err(|e| {
        warn!(error = %e, "rejected Slack request");
        ApiError(StatusCode::UNAUTHORIZED, "invalid signature".into())
    })
}

/// Queue bot work without holding up Slack's 3-second deadline.
fn dispatch(state: &GatewayState, msg: InboundMessage) {
    if let Err(e) = state.inbound.try_send(msg) {
        error!(error = %e, "could not queue inbound message");
    }
}

// ─────────────────────────────────────────────
// Info endpoints
// ─────────────────────────────────────────────

async fn index_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    Json(json!({
        "name": "slackrat",
        "description": "Slack channel search bot",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "mode": state.mode,
        "endpoints": ENDPOINTS,
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "OK", "timestamp": Utc::now().to_rfc3339() }))
}

async fn test_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match state.engine.api().auth_test().await {
        Ok(identity) => Json(json!({
            "status": "ok",
            "bot": {
                "name": identity.user,
                "id": identity.user_id,
                "team": identity.team,
                "teamId": identity.team_id,
            },
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn debug_handler(State(state): State<Arc<GatewayState>>) -> Json<Value> {
    let mut features = vec!["dm-search", "app-mentions", "slash-commands", "rest-api"];
    if cfg!(feature = "socket") {
        features.push("socket-mode");
    }

    Json(json!({
        "status": "debug",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "config": {
            "signingSecret": !state.signing_secret.is_empty(),
            "appToken": state.app_token_set,
            "apiToken": !state.api_token.is_empty(),
            "mode": state.mode,
            "botHistoryLimit": state.search.bot_history_limit,
            "cacheTtlSecs": state.search.cache_ttl_secs,
        },
        "features": features,
        "endpoints": ENDPOINTS,
    }))
}

// ─────────────────────────────────────────────
// Slack callbacks
// ─────────────────────────────────────────────

async fn events_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    verify_slack(&state, &headers, &body)?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;

    match payload["type"].as_str().unwrap_or("") {
        "url_verification" => {
            info!("answering Events API URL verification");
            return Ok(Json(json!({ "challenge": payload["challenge"] })).into_response());
        }
        "event_callback" => {}
        other => {
            debug!(payload_type = %other, "ignoring Events API payload");
            return Ok((StatusCode::OK, "OK").into_response());
        }
    }

    if let Some(retry) = headers.get(RETRY_HEADER).and_then(|v| v.to_str().ok()) {
        debug!(retry, "dropping Slack retry delivery");
        return Ok((StatusCode::OK, "OK").into_response());
    }

    match state.filter.classify_event(&payload["event"], "events").await {
        Verdict::Deliver(msg) => dispatch(&state, msg),
        Verdict::Ignore(reason) => debug!(reason, "ignoring event"),
    }

    Ok((StatusCode::OK, "OK").into_response())
}

async fn commands_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    verify_slack(&state, &headers, &body)?;

    let cmd = SlashCommand::from_form(&body);
    info!(command = %cmd.command, user = %cmd.user_id, channel = %cmd.channel_id, "slash command");

    if !state.filter.is_allowed(&cmd.user_id, "command") {
        return Ok(Json(json!({
            "response_type": "ephemeral",
            "text": ":no_entry: You are not allowed to use this command.",
        }))
        .into_response());
    }

    let route = route_slash_command(&cmd, "command");
    if let Some(msg) = route.dispatch {
        dispatch(&state, msg);
    }

    Ok(Json(json!({ "response_type": "ephemeral", "text": route.ephemeral })).into_response())
}

// ─────────────────────────────────────────────
// REST API
// ─────────────────────────────────────────────

/// Look up one query-string parameter.
fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// `?days=N`, defaulting to 30.
fn days_param(query: Option<&str>) -> Result<u32, ApiError> {
    match query_param(query, "days") {
        None => Ok(DEFAULT_STATS_DAYS),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::bad_request(format!("days must be a whole number, got `{raw}`"))),
    }
}

/// Request bodies are parsed by hand so errors keep the JSON error shape.
fn json_body(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

/// Request options layered over the configured defaults.
///
/// Besides the `SearchOptions` fields, `pattern` turns the keyword into a
/// regex and `caseSensitive` applies to that regex.
fn request_options(
    base: &SearchConfig,
    raw: &Value,
) -> Result<(SearchOptions, bool, bool), ApiError> {
    let mut merged = serde_json::to_value(SearchOptions::from_config(base))
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if let (Some(target), Some(given)) = (merged.as_object_mut(), raw.as_object()) {
        for (key, value) in given {
            let key = if key == "searchInThreads" { "searchThreads" } else { key.as_str() };
            target.insert(key.to_string(), value.clone());
        }
    }

    let options: SearchOptions = serde_json::from_value(merged)
        .map_err(|e| ApiError::bad_request(format!("invalid options: {e}")))?;
    let pattern = raw["pattern"].as_bool().unwrap_or(false);
    let case_sensitive = raw["caseSensitive"].as_bool().unwrap_or(false);
    Ok((options, pattern, case_sensitive))
}

fn build_matcher(keyword: &str, pattern: bool, case_sensitive: bool) -> Result<Matcher, ApiError> {
    if pattern {
        Ok(Matcher::pattern(keyword, case_sensitive)?)
    } else {
        Ok(Matcher::keyword(keyword))
    }
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body[key].as_str().map(str::trim).filter(|s| !s.is_empty())
}

async fn search_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult {
    check_auth(&state, &headers)?;
    let body = json_body(&body)?;

    let (Some(channel), Some(keyword)) = (non_empty_str(&body, "channelId"), non_empty_str(&body, "keyword"))
    else {
        return Err(ApiError::bad_request("channelId and keyword are required"));
    };

    let (options, pattern, case_sensitive) = request_options(&state.search, &body["options"])?;
    let matcher = build_matcher(keyword, pattern, case_sensitive)?;

    let (resolved, outcome) = state
        .engine
        .search_by_name(&ChannelRef::parse(channel), &matcher, options)
        .await?;

    if query_param(query.as_deref(), "format").as_deref() == Some("csv") {
        let filename = format!("attachment; filename=\"search-{}.csv\"", resolved.name);
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (header::CONTENT_DISPOSITION, filename),
            ],
            to_csv(&outcome),
        )
            .into_response());
    }

    Ok(success(json!({ "channel": resolved, "outcome": outcome })))
}

async fn search_multiple_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    check_auth(&state, &headers)?;
    let body = json_body(&body)?;

    let channels: Option<Vec<ChannelRef>> = body["channelIds"].as_array().map(|ids| {
        ids.iter()
            .filter_map(Value::as_str)
            .map(ChannelRef::parse)
            .collect()
    });
    let (Some(channels), Some(keyword)) = (channels, non_empty_str(&body, "keyword")) else {
        return Err(ApiError::bad_request("channelIds (array) and keyword are required"));
    };

    let (options, pattern, case_sensitive) = request_options(&state.search, &body["options"])?;
    let matcher = build_matcher(keyword, pattern, case_sensitive)?;

    let combined = state.engine.search_channels(&channels, &matcher, options).await;
    Ok(success(combined))
}

async fn channels_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> ApiResult {
    check_auth(&state, &headers)?;
    let channels = state.engine.list_available().await;
    Ok(success(json!({ "count": channels.len(), "channels": channels })))
}

async fn stats_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult {
    check_auth(&state, &headers)?;
    let days = days_param(query.as_deref())?;
    let stats = channel_activity(state.engine.api(), &channel_id, days, Utc::now()).await?;
    Ok(success(json!({ "stats": stats })))
}

async fn active_users_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult {
    check_auth(&state, &headers)?;
    let days = days_param(query.as_deref())?;
    let users = active_users(state.engine.api(), &channel_id, days, Utc::now()).await?;
    Ok(success(json!({ "channelId": channel_id, "days": days, "users": users })))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
