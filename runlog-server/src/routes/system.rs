// runlog-server/src/routes/system.rs
// ============================================================================
// Module: Operational Routes
// Description: system_health, system_stats, system_config.
// Purpose: HTTP surface over Store::health_check/snapshot_metrics and the
//          operator-facing configuration snapshot.
// Dependencies: axum, runlog-core
// ============================================================================

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Response from `system_health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `"ok"` if the store is reachable, `"error"` otherwise.
    pub status: &'static str,
}

/// Checks store connectivity.
///
/// # Errors
///
/// Returns [`ApiError`] if the store's health check fails.
pub async fn system_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.store.health_check()?;
    Ok(Json(HealthResponse { status: "ok" }))
}

/// Returns the full counter/gauge snapshot, for dashboards and alerting.
///
/// # Errors
///
/// Returns [`ApiError`] if the store fails.
pub async fn system_stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.store.snapshot_metrics()?))
}

/// Returns the operator-visible configuration snapshot, validated against
/// the `system_config` contract schema. Admin-gated.
///
/// # Errors
///
/// Returns [`ApiError`] if the config fails its own schema (a programmer
/// error this endpoint surfaces rather than masks).
pub async fn system_config(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state.config.to_json();
    state.contracts.validate_system_config(&snapshot).map_err(|err| {
        ApiError::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;
    Ok(Json(snapshot))
}
