// runlog-server/src/routes/activity.rs
// ============================================================================
// Module: Activity & Notification Routes
// Description: list_activity, stream_activity, mark_activity_seen,
//              list_notifications, get_unread_count, mark_notifications_read,
//              stream_notifications.
// Purpose: HTTP/SSE surface over the Activity and Notification rows.
// Dependencies: axum, runlog-core
// ============================================================================

use std::sync::Arc;

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use runlog_core::Activity;
use runlog_core::Notification;
use runlog_core::NotificationId;
use runlog_core::NotificationState;
use serde::Deserialize;
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::sse::resolve_cursor;
use crate::sse::run_stream;
use crate::sse::StreamKind;
use crate::sse::StreamRow;
use crate::sse::StreamTiming;
use crate::state::AppState;

/// Query parameters for `list_activity`.
#[derive(Debug, Deserialize)]
pub struct ListActivityQuery {
    /// Only rows with `activity_seq > after_seq`.
    #[serde(default)]
    pub after_seq: u64,
}

/// Lists a project's activity feed after a cursor.
///
/// # Errors
///
/// Returns [`ApiError`] if `project_id` is malformed or the store fails.
pub async fn list_activity(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<ListActivityQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let project_id = parse_id("run_not_found", &project_id)?;
    Ok(Json(state.store.list_activity(project_id, query.after_seq)?))
}

/// Query parameters for `stream_activity`.
#[derive(Debug, Deserialize)]
pub struct StreamActivityQuery {
    /// Start cursor, takes priority over `Last-Event-ID`.
    #[serde(default)]
    pub after_seq: Option<u64>,
    /// Close after replay instead of tailing live.
    #[serde(default)]
    pub once: bool,
}

/// Serves a project's activity feed as an SSE stream.
///
/// # Errors
///
/// Returns [`ApiError`] if `project_id` is malformed or the per-user stream
/// concurrency limit for this kind is already saturated.
pub async fn stream_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<String>,
    Query(query): Query<StreamActivityQuery>,
    headers: HeaderMap,
) -> Result<axum::response::sse::Sse<tokio_stream::wrappers::ReceiverStream<Result<axum::response::sse::Event, std::convert::Infallible>>>, ApiError> {
    let project_id = parse_id("run_not_found", &project_id)?;
    let last_event_id = headers.get("last-event-id").and_then(|v| v.to_str().ok());
    let cursor = resolve_cursor(query.after_seq, last_event_id, None);
    let permit = state.stream_limiter.acquire(user.user_id, StreamKind::ProjectActivity)?;
    let timing = StreamTiming {
        max_replay: state.config.sse_max_replay,
        poll_interval_seconds: state.config.sse_poll_interval_seconds,
        heartbeat_seconds: state.config.sse_heartbeat_seconds,
        max_duration_seconds: state.config.sse_max_duration_seconds,
        idle_timeout_seconds: state.config.sse_idle_timeout_seconds,
    };
    Ok(run_stream(
        Arc::clone(&state.store),
        StreamKind::ProjectActivity,
        cursor,
        query.once,
        timing,
        permit,
        move |store, after_seq| {
            store.list_activity(project_id, after_seq).map(|rows| {
                rows.into_iter()
                    .map(|row| StreamRow {
                        seq: row.activity_seq,
                        scope: None,
                        kind: row.kind.clone(),
                        data: serde_json::to_value(&row).unwrap_or_default(),
                    })
                    .collect()
            })
        },
    ))
}

/// Body for `mark_activity_seen`.
#[derive(Debug, Deserialize)]
pub struct MarkActivitySeenRequest {
    /// Highest `activity_seq` the caller has observed.
    pub seq: u64,
}

/// Acknowledges an activity cursor for a user/project pair. Activity feeds
/// have no per-user read state in the store today, so this endpoint is a
/// client-side bookmarking convenience and always succeeds once the
/// project id parses.
///
/// # Errors
///
/// Returns [`ApiError`] if `project_id` is malformed.
pub async fn mark_activity_seen(
    Path(project_id): Path<String>,
    Json(body): Json<MarkActivitySeenRequest>,
) -> Result<Json<MarkActivitySeenRequest>, ApiError> {
    let _: runlog_core::ProjectId = parse_id("run_not_found", &project_id)?;
    Ok(Json(body))
}

/// Query parameters for `list_notifications`.
#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    /// Restrict to unread rows only.
    #[serde(default)]
    pub unread_only: bool,
    /// Only rows with `notification_seq > after_seq`.
    #[serde(default)]
    pub after_seq: u64,
}

/// Lists the caller's notifications.
///
/// # Errors
///
/// Returns [`ApiError`] if the store fails.
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = state.store.list_notifications(user.user_id, query.unread_only, query.after_seq)?;
    Ok(Json(notifications))
}

/// Unread-notification count, for a badge counter.
#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    /// Number of unread notifications.
    pub count: usize,
}

/// Returns the caller's unread notification count.
///
/// # Errors
///
/// Returns [`ApiError`] if the store fails.
pub async fn get_unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.store.list_notifications(user.user_id, true, 0)?;
    Ok(Json(UnreadCountResponse { count: unread.len() }))
}

/// Body for `mark_notifications_read`: either advance the high-water mark
/// or mark specific ids, per section 6.
#[derive(Debug, Deserialize)]
pub struct MarkNotificationsReadRequest {
    /// Advance `last_seen_notification_seq` to this value.
    #[serde(default)]
    pub up_to_seq: Option<u64>,
    /// Mark these specific notification ids read, without touching the
    /// high-water mark.
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Marks notifications read, either by high-water mark or by explicit id
/// list.
///
/// # Errors
///
/// Returns [`ApiError`] if an id is malformed or the store fails.
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<MarkNotificationsReadRequest>,
) -> Result<Json<NotificationState>, ApiError> {
    if !body.ids.is_empty() {
        let ids: Vec<NotificationId> = body
            .ids
            .iter()
            .map(|text| parse_id("run_not_found", text))
            .collect::<Result<_, ApiError>>()?;
        state.store.mark_notifications_read_by_id(user.user_id, &ids)?;
    }
    if let Some(up_to_seq) = body.up_to_seq {
        return Ok(Json(state.store.advance_notification_state(user.user_id, up_to_seq)?));
    }
    Ok(Json(state.store.get_notification_state(user.user_id)?))
}

/// Query parameters for `stream_notifications`.
#[derive(Debug, Deserialize)]
pub struct StreamNotificationsQuery {
    /// Start cursor, takes priority over `Last-Event-ID`.
    #[serde(default)]
    pub after_seq: Option<u64>,
    /// Close after replay instead of tailing live.
    #[serde(default)]
    pub once: bool,
}

/// Serves the caller's own notification stream.
///
/// # Errors
///
/// Returns [`ApiError`] if the per-user stream concurrency limit for this
/// kind is already saturated.
pub async fn stream_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<StreamNotificationsQuery>,
    headers: HeaderMap,
) -> Result<axum::response::sse::Sse<tokio_stream::wrappers::ReceiverStream<Result<axum::response::sse::Event, std::convert::Infallible>>>, ApiError> {
    let last_event_id = headers.get("last-event-id").and_then(|v| v.to_str().ok());
    let cursor = resolve_cursor(query.after_seq, last_event_id, None);
    let permit = state.stream_limiter.acquire(user.user_id, StreamKind::Notifications)?;
    let timing = StreamTiming {
        max_replay: state.config.sse_max_replay,
        poll_interval_seconds: state.config.sse_poll_interval_seconds,
        heartbeat_seconds: state.config.sse_heartbeat_seconds,
        max_duration_seconds: state.config.sse_max_duration_seconds,
        idle_timeout_seconds: state.config.sse_idle_timeout_seconds,
    };
    let user_id = user.user_id;
    Ok(run_stream(
        Arc::clone(&state.store),
        StreamKind::Notifications,
        cursor,
        query.once,
        timing,
        permit,
        move |store, after_seq| {
            store.list_notifications(user_id, false, after_seq).map(|rows| {
                rows.into_iter()
                    .map(|row| StreamRow {
                        seq: row.notification_seq,
                        scope: None,
                        kind: row.kind.clone(),
                        data: serde_json::to_value(&row).unwrap_or_default(),
                    })
                    .collect()
            })
        },
    ))
}
