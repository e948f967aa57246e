// runlog-server/src/router.rs
// ============================================================================
// Module: Router
// Description: Wires every route handler in `routes/` into one axum Router.
// Purpose: The single assembly site for the HTTP surface named in section 6.
// Dependencies: axum
// ============================================================================

use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Router;

use crate::routes::activity;
use crate::routes::approvals;
use crate::routes::artifacts;
use crate::routes::events;
use crate::routes::provenance;
use crate::routes::runs;
use crate::routes::system;
use crate::routes::tools;
use crate::security;
use crate::state::AppState;

/// Builds the full HTTP/SSE surface over `state`, with the CORS and
/// trusted-host posture from section 10 applied ahead of every route.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let cors = security::cors_layer(&state.config.cors_allowed_origins);
    router(state.clone()).layer(axum::middleware::from_fn_with_state(state, security::trusted_host_guard)).layer(cors)
}

fn router(state: AppState) -> Router {
    Router::new()
        // -- Run lifecycle ---------------------------------------------
        .route("/runs", post(runs::create_run))
        .route("/runs/{run_id}", get(runs::get_run))
        .route("/runs/{run_id}/summary", get(runs::get_run_summary))
        .route("/runs/{run_id}/status", put(runs::update_run_status))
        .route("/threads/{thread_id}/runs", get(runs::list_runs_in_thread))
        // -- Events ------------------------------------------------------
        .route("/runs/{run_id}/events", post(events::append_event).get(events::list_events))
        .route("/runs/{run_id}/events/stream", get(events::stream_events))
        // -- Tools ---------------------------------------------------------
        .route("/tools", get(tools::list_tools))
        .route("/tools/invoke", post(tools::invoke_tool))
        .route("/tools/{tool_id}/manifest", get(tools::get_manifest))
        // -- Approvals ------------------------------------------------------
        .route("/runs/{run_id}/approvals", get(approvals::list_approvals))
        .route("/approvals/{approval_id}/approve", post(approvals::approve))
        .route("/approvals/{approval_id}/deny", post(approvals::deny))
        // -- Artifacts -------------------------------------------------------
        .route("/artifacts", post(artifacts::create_artifact))
        .route("/artifacts/uploads", post(artifacts::init_upload))
        .route("/artifacts/uploads/{upload_id}/parts", post(artifacts::put_part))
        .route("/artifacts/uploads/{upload_id}/finalize", post(artifacts::finalize_upload))
        .route("/artifacts/{artifact_id}", get(artifacts::get_artifact))
        .route("/runs/{run_id}/artifacts", get(artifacts::list_run_artifacts).post(artifacts::link_run_artifact))
        // -- Activity & notifications ------------------------------------
        .route("/projects/{project_id}/activity", get(activity::list_activity))
        .route("/projects/{project_id}/activity/stream", get(activity::stream_activity))
        .route("/projects/{project_id}/activity/seen", post(activity::mark_activity_seen))
        .route("/notifications", get(activity::list_notifications))
        .route("/notifications/unread_count", get(activity::get_unread_count))
        .route("/notifications/read", post(activity::mark_notifications_read))
        .route("/notifications/stream", get(activity::stream_notifications))
        // -- Provenance -----------------------------------------------------
        .route("/runs/{run_id}/provenance/summary", get(provenance::provenance_summary))
        .route("/runs/{run_id}/provenance/graph", get(provenance::provenance_graph))
        .route("/runs/{run_id}/provenance/why/{artifact_id}", get(provenance::provenance_why))
        // -- Operational ------------------------------------------------------
        .route("/system/health", get(system::system_health))
        .route("/system/stats", get(system::system_stats))
        .route("/system/config", get(system::system_config))
        .with_state(state)
}
