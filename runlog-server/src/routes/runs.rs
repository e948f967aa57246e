// runlog-server/src/routes/runs.rs
// ============================================================================
// Module: Run Lifecycle Routes
// Description: create_run, get_run, get_run_summary, list_runs_in_thread,
//              update_run_status.
// Purpose: HTTP surface over Run rows and their terminal-status transition.
// Dependencies: axum, runlog-core
// ============================================================================

use std::collections::BTreeMap;

use axum::extract::Path;
use axum::extract::State;
use axum::Json;
use runlog_core::Actor;
use runlog_core::EventIntent;
use runlog_core::Pins;
use runlog_core::Privacy;
use runlog_core::Run;
use runlog_core::RunStatus;
use runlog_core::ThreadId;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

/// Body for `create_run`.
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    /// Owning thread.
    pub thread_id: String,
    /// Model configuration snapshot, opaque to the substrate.
    #[serde(default)]
    pub model_config: Option<serde_json::Value>,
    /// Tool id/version pins at run start.
    #[serde(default)]
    pub tool_versions: BTreeMap<String, String>,
    /// Executor version at run start.
    pub executor_version: String,
}

/// Creates a run under an existing thread.
///
/// # Errors
///
/// Returns [`ApiError`] if `thread_id` is malformed or the store fails.
pub async fn create_run(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateRunRequest>,
) -> Result<Json<Run>, ApiError> {
    let thread_id: ThreadId = parse_id("run_not_found", &body.thread_id)?;
    let run = Run {
        run_id: runlog_core::RunId::from(state.id_gen.generate()),
        thread_id,
        status: RunStatus::Running,
        created_by_user_id: user.user_id,
        pins: Pins {
            model_config: body.model_config,
            tool_versions: body.tool_versions,
            executor_version: body.executor_version,
        },
        created_at: state.clock.now(),
    };
    let stored = state.store.create_run(run)?;
    Ok(Json(stored))
}

/// Fetches a run by id.
///
/// # Errors
///
/// Returns [`ApiError`] if the run does not exist.
pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<String>) -> Result<Json<Run>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    Ok(Json(state.store.get_run(run_id)?))
}

/// Run plus its aggregate metrics, for dashboard summaries.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    /// The run row.
    pub run: Run,
    /// Current aggregate metrics, zeroed if none have been recorded yet.
    pub metrics: runlog_core::RunMetrics,
}

/// Fetches a run together with its current aggregate metrics.
///
/// # Errors
///
/// Returns [`ApiError`] if the run does not exist.
pub async fn get_run_summary(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunSummary>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    let run = state.store.get_run(run_id)?;
    let metrics = state.store.get_run_metrics(run_id).unwrap_or_default();
    Ok(Json(RunSummary { run, metrics }))
}

/// Lists runs in a thread, oldest first.
///
/// # Errors
///
/// Returns [`ApiError`] if `thread_id` is malformed or the store fails.
pub async fn list_runs_in_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Vec<Run>>, ApiError> {
    let thread_id: ThreadId = parse_id("run_not_found", &thread_id)?;
    Ok(Json(state.store.list_runs_in_thread(thread_id)?))
}

/// Body for `update_run_status`.
#[derive(Debug, Deserialize)]
pub struct UpdateRunStatusRequest {
    /// The new status, one of `running | completed | cancelled | failed |
    /// waiting_approval`.
    pub status: String,
}

fn parse_status(text: &str) -> Result<RunStatus, ApiError> {
    match text {
        "running" => Ok(RunStatus::Running),
        "completed" | "complete" => Ok(RunStatus::Completed),
        "cancelled" => Ok(RunStatus::Cancelled),
        "failed" => Ok(RunStatus::Failed),
        "waiting_approval" => Ok(RunStatus::WaitingApproval),
        other => Err(ApiError::schema_violation(format!("unknown run status: {other}"))),
    }
}

/// Transitions a run's status and records a `run_status` event, so
/// EventLog's terminal-kind handling computes `completed_at`/`duration_ms`.
///
/// # Errors
///
/// Returns [`ApiError`] if the run does not exist or the status is invalid.
pub async fn update_run_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(run_id): Path<String>,
    Json(body): Json<UpdateRunStatusRequest>,
) -> Result<Json<Run>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    let status = parse_status(&body.status)?;
    let event = state.event_log.append(EventIntent {
        run_id,
        kind: "run_status".to_string(),
        payload: json!({ "status": body.status }),
        actor: Actor::User,
        parent_event_id: None,
        correlation_id: None,
        privacy: Privacy::Standard,
        pins: Pins::default(),
        event_id: None,
        ts: None,
    })?;
    let run = state.store.update_run_status(run_id, status)?;
    state.notify.notify_event(&event, &run, Some(user.user_id));
    Ok(Json(run))
}
