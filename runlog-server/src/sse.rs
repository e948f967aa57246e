// runlog-server/src/sse.rs
// ============================================================================
// Module: Stream Broker
// Description: Replay-then-live-poll SSE framing shared by the run-event,
//              project-activity, and notification streams.
// Purpose: One cursor/heartbeat/backpressure implementation every stream
//          route reuses instead of re-deriving it per kind.
// Dependencies: axum, tokio, tokio-stream, runlog-core
// ============================================================================

//! ## Overview
//! [`run_stream`] takes a row-fetching closure and drives it with a
//! background task that pushes frames into an `mpsc` channel backing the
//! response stream, so a slow client backs up the channel rather than
//! this process's own memory. [`StreamLimiter`] bounds concurrent streams
//! per `(user_id, stream_kind)`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::response::sse::Event;
use axum::response::sse::Sse;
use runlog_core::Store;
use runlog_core::UserId;
use serde_json::Value;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::time::interval;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::error::ApiError;

/// One of the three stream kinds section 4.6 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Per-run event stream, keyed by `seq`.
    RunEvents,
    /// Per-project activity stream, keyed by `activity_seq`.
    ProjectActivity,
    /// Per-user notification stream, keyed by `notification_seq`.
    Notifications,
}

impl StreamKind {
    /// Stable identifier used in the `sse.active_streams_by_type.<kind>`
    /// gauge name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunEvents => "run_events",
            Self::ProjectActivity => "project_activity",
            Self::Notifications => "notifications",
        }
    }
}

/// One framed row: `id: <cursor>\nevent: <kind>\ndata: <json>\n\n`.
///
/// `scope` is the run-events stream's `run_id`, carried in the wire cursor
/// as `"{run_id}:{seq}"` per section 10's `Last-Event-ID` format; the
/// project-activity and notification streams have no such scope and are
/// framed with a bare `seq`.
#[derive(Debug, Clone)]
pub struct StreamRow {
    /// Sequence number, used as the next cursor.
    pub seq: u64,
    /// Scoping id for the composite cursor, `None` for unscoped streams.
    pub scope: Option<String>,
    /// SSE `event:` field.
    pub kind: String,
    /// SSE `data:` field, serialised as JSON.
    pub data: Value,
}

impl StreamRow {
    fn into_sse_event(self) -> Event {
        let id = match &self.scope {
            Some(scope) => format!("{scope}:{}", self.seq),
            None => self.seq.to_string(),
        };
        Event::default().id(id).event(self.kind).data(self.data.to_string())
    }
}

/// Bounds concurrent streams per `(user_id, stream_kind)`.
#[derive(Default)]
pub struct StreamLimiter {
    limit_per_user: u32,
    buckets: Mutex<HashMap<(UserId, StreamKind), Arc<Semaphore>>>,
}

impl StreamLimiter {
    /// Builds a limiter allowing `limit_per_user` concurrent streams of
    /// each kind, per user.
    #[must_use]
    pub fn new(limit_per_user: u32) -> Self {
        Self { limit_per_user, buckets: Mutex::new(HashMap::new()) }
    }

    /// Acquires a permit, or returns `too_many_concurrent_streams`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::too_many_concurrent_streams`] when the per-user
    /// bound for `kind` is already saturated.
    pub fn acquire(&self, user_id: UserId, kind: StreamKind) -> Result<OwnedSemaphorePermit, ApiError> {
        let semaphore = {
            let mut buckets = self.buckets.lock().expect("stream limiter mutex is never poisoned");
            Arc::clone(
                buckets
                    .entry((user_id, kind))
                    .or_insert_with(|| Arc::new(Semaphore::new(self.limit_per_user as usize))),
            )
        };
        semaphore.try_acquire_owned().map_err(|_| ApiError::too_many_concurrent_streams())
    }
}

/// Shared cadence knobs for one stream.
#[derive(Debug, Clone, Copy)]
pub struct StreamTiming {
    /// Rows replayed on open, at most.
    pub max_replay: u64,
    /// Seconds between live polls.
    pub poll_interval_seconds: u64,
    /// Seconds between heartbeat comments while idle.
    pub heartbeat_seconds: u64,
    /// Maximum stream lifetime.
    pub max_duration_seconds: u64,
    /// Maximum time without a new row before the stream ends.
    pub idle_timeout_seconds: u64,
}

/// Drives the replay-then-live-poll loop described in section 4.6.
///
/// `fetch` is called with the current cursor and returns rows with
/// `seq > cursor`, ordered ascending; it is re-invoked on every poll.
pub fn run_stream<F>(
    store: Arc<dyn Store>,
    kind: StreamKind,
    mut cursor: u64,
    once: bool,
    timing: StreamTiming,
    permit: OwnedSemaphorePermit,
    fetch: F,
) -> Sse<ReceiverStream<Result<Event, Infallible>>>
where
    F: Fn(&dyn Store, u64) -> Result<Vec<StreamRow>, runlog_core::StoreError> + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(16);
    let _ = store.increment_counter("sse_connections_total", 1);
    let _ = store.set_gauge(&format!("sse.active_streams_by_type.{}", kind.as_str()), 1.0);
    tokio::spawn(async move {
        let _permit = permit;
        let now_ms = i64::try_from(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
        )
        .unwrap_or_default();
        if tx
            .send(Ok(Event::default().comment(format!("heartbeat {now_ms}"))))
            .await
            .is_err()
        {
            finish(&store, kind);
            return;
        }

        let replayed = match fetch(store.as_ref(), cursor) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(error = %err, "stream replay fetch failed");
                finish(&store, kind);
                return;
            }
        };
        for row in replayed.into_iter().take(usize::try_from(timing.max_replay).unwrap_or(usize::MAX)) {
            cursor = row.seq;
            if tx.send(Ok(row.into_sse_event())).await.is_err() {
                finish(&store, kind);
                return;
            }
        }

        if once {
            finish(&store, kind);
            return;
        }

        let deadline = Instant::now() + Duration::from_secs(timing.max_duration_seconds);
        let mut last_progress = Instant::now();
        let mut poll_timer = interval(Duration::from_secs(timing.poll_interval_seconds.max(1)));
        let mut since_heartbeat = Instant::now();
        loop {
            poll_timer.tick().await;
            if tx.is_closed() {
                break;
            }
            if Instant::now() >= deadline {
                break;
            }
            if Instant::now().duration_since(last_progress) >= Duration::from_secs(timing.idle_timeout_seconds) {
                break;
            }
            match fetch(store.as_ref(), cursor) {
                Ok(rows) if rows.is_empty() => {
                    if since_heartbeat.elapsed() >= Duration::from_secs(timing.heartbeat_seconds) {
                        since_heartbeat = Instant::now();
                        if tx.send(Ok(Event::default().comment("heartbeat"))).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(rows) => {
                    last_progress = Instant::now();
                    since_heartbeat = Instant::now();
                    let mut disconnected = false;
                    for row in rows {
                        cursor = row.seq;
                        if tx.send(Ok(row.into_sse_event())).await.is_err() {
                            disconnected = true;
                            break;
                        }
                    }
                    if disconnected {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "stream live poll failed");
                    break;
                }
            }
        }
        finish(&store, kind);
    });
    Sse::new(ReceiverStream::new(rx))
}

fn finish(store: &Arc<dyn Store>, kind: StreamKind) {
    let _ = store.increment_counter("sse_disconnects_total", 1);
    let _ = store.set_gauge(&format!("sse.active_streams_by_type.{}", kind.as_str()), 0.0);
}

/// Resolves the start cursor per section 4.6: `after_seq` query parameter,
/// else `Last-Event-ID`, else 0.
///
/// `scope` is `Some(run_id)` for the run-events stream, whose wire cursor
/// is the composite `"{run_id}:{seq}"` format documented in section 10. A
/// `Last-Event-ID` whose scope does not match the run being resumed is
/// discarded (falls back to 0, a full replay) rather than trusted across
/// runs. Unscoped streams (project activity, notifications) parse a bare
/// `seq`.
#[must_use]
pub fn resolve_cursor(after_seq: Option<u64>, last_event_id: Option<&str>, scope: Option<&str>) -> u64 {
    if let Some(after_seq) = after_seq {
        return after_seq;
    }
    let Some(last_event_id) = last_event_id else {
        return 0;
    };
    match scope {
        Some(expected) => last_event_id
            .rsplit_once(':')
            .filter(|(id_scope, _)| *id_scope == expected)
            .and_then(|(_, seq)| seq.parse().ok())
            .unwrap_or(0),
        None => last_event_id.parse().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_seq_query_param_takes_priority() {
        assert_eq!(resolve_cursor(Some(42), Some("7"), None), 42);
    }

    #[test]
    fn falls_back_to_last_event_id_header_when_unscoped() {
        assert_eq!(resolve_cursor(None, Some("7"), None), 7);
    }

    #[test]
    fn defaults_to_zero() {
        assert_eq!(resolve_cursor(None, None, None), 0);
    }

    #[test]
    fn malformed_last_event_id_falls_back_to_zero() {
        assert_eq!(resolve_cursor(None, Some("not-a-number"), None), 0);
    }

    #[test]
    fn parses_composite_cursor_matching_the_expected_scope() {
        assert_eq!(resolve_cursor(None, Some("abcabc:9"), Some("abcabc")), 9);
    }

    #[test]
    fn composite_cursor_from_a_different_run_falls_back_to_zero() {
        assert_eq!(resolve_cursor(None, Some("other-run:9"), Some("abcabc")), 0);
    }

    #[test]
    fn bare_cursor_under_a_scope_falls_back_to_zero() {
        assert_eq!(resolve_cursor(None, Some("9"), Some("abcabc")), 0);
    }
}
