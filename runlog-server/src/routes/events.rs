// runlog-server/src/routes/events.rs
// ============================================================================
// Module: Event Routes
// Description: append_event, list_events, stream_events.
// Purpose: HTTP/SSE surface over EventLog and the run-event stream.
// Dependencies: axum, runlog-core
// ============================================================================

use std::sync::Arc;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use runlog_core::Actor;
use runlog_core::CorrelationId;
use runlog_core::Event;
use runlog_core::EventId;
use runlog_core::EventIntent;
use runlog_core::Pins;
use runlog_core::Privacy;
use runlog_core::RunId;
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::sse::resolve_cursor;
use crate::sse::run_stream;
use crate::sse::StreamKind;
use crate::sse::StreamRow;
use crate::sse::StreamTiming;
use crate::state::AppState;

const APPEND_EVENT_ENDPOINT: &str = "append_event";

/// Body for `append_event`.
#[derive(Debug, Deserialize, serde::Serialize)]
pub struct AppendEventRequest {
    /// Event kind, selects the payload schema.
    pub kind: String,
    /// Canonical JSON payload, validated against `kind`'s schema.
    pub payload: serde_json::Value,
    /// Event originator. Defaults to `user` for an externally-authored
    /// event; tool/system events are appended internally by this crate's
    /// own runtime calls, not through this route.
    #[serde(default = "default_actor")]
    pub actor: Actor,
    /// Causal parent, if any.
    #[serde(default)]
    pub parent_event_id: Option<String>,
    /// Correlation group, if any.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Privacy classification. Defaults to `standard`.
    #[serde(default)]
    pub privacy: Option<Privacy>,
}

const fn default_actor() -> Actor {
    Actor::User
}

/// Appends an event to a run through EventLog.
///
/// # Errors
///
/// Returns [`ApiError`] on validation, quota, or contention failure.
pub async fn append_event(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(run_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<AppendEventRequest>,
) -> Result<Json<Event>, ApiError> {
    let run_id: RunId = parse_id("run_not_found", &run_id)?;
    let idempotency_key = headers.get("idempotency-key").and_then(|v| v.to_str().ok());
    let request_body = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);

    let pending_key = match idempotency_key {
        Some(key) => match state.idempotency.resolve(user.user_id, APPEND_EVENT_ENDPOINT, key, &request_body)? {
            runlog_core::IdempotencyOutcome::Hit { response } => {
                let event: Event = serde_json::from_value(response)
                    .map_err(|err| ApiError::schema_violation(err.to_string()))?;
                return Ok(Json(event));
            }
            runlog_core::IdempotencyOutcome::Miss { composite_key } => Some(composite_key),
        },
        None => None,
    };

    let parent_event_id = body
        .parent_event_id
        .as_deref()
        .map(|text| parse_id::<EventId>("event_not_found", text))
        .transpose()?;
    let correlation_id = body
        .correlation_id
        .as_deref()
        .map(|text| parse_id::<CorrelationId>("event_not_found", text))
        .transpose()?;
    let event = state.event_log.append(EventIntent {
        run_id,
        kind: body.kind,
        payload: body.payload,
        actor: body.actor,
        parent_event_id,
        correlation_id,
        privacy: body.privacy.unwrap_or(Privacy::Standard),
        pins: Pins::default(),
        event_id: None,
        ts: None,
    })?;
    if let Ok(run) = state.store.get_run(run_id) {
        state.notify.notify_event(&event, &run, Some(user.user_id));
    }
    if let Some(composite_key) = pending_key {
        let response = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
        state.idempotency.store(user.user_id, APPEND_EVENT_ENDPOINT, &composite_key, response)?;
    }
    Ok(Json(event))
}

/// Query parameters for `list_events`.
#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    /// Only events with `seq > after_seq`.
    #[serde(default)]
    pub after_seq: u64,
    /// Restrict to these kinds, client-side filtered.
    #[serde(default)]
    pub kinds: Option<String>,
    /// Restrict to this tool id, client-side filtered against the
    /// `tool_call`/`tool_result`/`tool_error` payload's `tool_id`.
    #[serde(default)]
    pub tool_id: Option<String>,
    /// Restrict to `tool_error` events only.
    #[serde(default)]
    pub errors_only: bool,
}

/// Lists events for a run after a cursor, with optional client-side
/// filters.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id` is malformed or the store fails.
pub async fn list_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let run_id: RunId = parse_id("run_not_found", &run_id)?;
    let mut events = state.store.list_events(run_id, query.after_seq)?;
    if query.errors_only {
        events.retain(|event| event.kind == "tool_error");
    }
    if let Some(kinds) = query.kinds {
        let wanted: Vec<&str> = kinds.split(',').map(str::trim).collect();
        events.retain(|event| wanted.iter().any(|kind| *kind == event.kind));
    }
    if let Some(tool_id) = query.tool_id {
        events.retain(|event| event.payload.get("tool_id").and_then(|v| v.as_str()) == Some(tool_id.as_str()));
    }
    Ok(Json(events))
}

/// Query parameters for `stream_events`.
#[derive(Debug, Deserialize)]
pub struct StreamEventsQuery {
    /// Start cursor, takes priority over `Last-Event-ID`.
    #[serde(default)]
    pub after_seq: Option<u64>,
    /// Close after replay instead of tailing live.
    #[serde(default)]
    pub once: bool,
}

/// Serves the per-run event SSE stream, per section 4.6.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id` is malformed or the per-user stream
/// concurrency limit for this kind is already saturated.
pub async fn stream_events(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(run_id): Path<String>,
    Query(query): Query<StreamEventsQuery>,
    headers: HeaderMap,
) -> Result<axum::response::sse::Sse<tokio_stream::wrappers::ReceiverStream<Result<axum::response::sse::Event, std::convert::Infallible>>>, ApiError> {
    let run_id: RunId = parse_id("run_not_found", &run_id)?;
    let last_event_id = headers.get("last-event-id").and_then(|v| v.to_str().ok());
    let run_id_str = run_id.to_string();
    let cursor = resolve_cursor(query.after_seq, last_event_id, Some(run_id_str.as_str()));
    let permit = state.stream_limiter.acquire(user.user_id, StreamKind::RunEvents)?;
    let timing = StreamTiming {
        max_replay: state.config.sse_max_replay,
        poll_interval_seconds: state.config.sse_poll_interval_seconds,
        heartbeat_seconds: state.config.sse_heartbeat_seconds,
        max_duration_seconds: state.config.sse_max_duration_seconds,
        idle_timeout_seconds: state.config.sse_idle_timeout_seconds,
    };
    Ok(run_stream(
        Arc::clone(&state.store),
        StreamKind::RunEvents,
        cursor,
        query.once,
        timing,
        permit,
        move |store, after_seq| {
            store.list_events(run_id, after_seq).map(|events| {
                events
                    .into_iter()
                    .map(|event| StreamRow {
                        seq: event.seq,
                        scope: Some(run_id.to_string()),
                        kind: event.kind.clone(),
                        data: serde_json::to_value(&event).unwrap_or_default(),
                    })
                    .collect()
            })
        },
    ))
}
