// runlog-server/src/routes/approvals.rs
// ============================================================================
// Module: Approval Routes
// Description: list_approvals, approve, deny.
// Purpose: HTTP surface over ApprovalLedger and the resume-after-approval
//          re-invocation described in section 4.5.
// Dependencies: axum, runlog-core
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::Json;
use runlog_core::Id;
use runlog_core::ProjectId;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::routes::tools::InvokeToolResponse;
use crate::state::AppState;

/// Lists approvals recorded for a run.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id` is malformed or the store fails.
pub async fn list_approvals(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<runlog_core::Approval>>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    Ok(Json(state.approvals.list_for_run(run_id)?))
}

/// Resolves the project id the original `tool_call` was made under, for
/// the resumed `ToolExecutor::invoke` call. `bypass_policy_rule_2=true`
/// means the value is never consulted by PolicyEngine; it only needs to be
/// a well-formed id.
fn originating_project_id(state: &AppState, approval: &runlog_core::Approval) -> ProjectId {
    state
        .store
        .list_events(approval.run_id, 0)
        .ok()
        .and_then(|events| {
            events
                .into_iter()
                .find(|event| event.event_id == approval.tool_call_event_id)
                .and_then(|event| event.project_id)
        })
        .unwrap_or_else(|| ProjectId::from(Id::from_raw(0)))
}

/// Approves a pending approval and resumes the gated tool call.
///
/// # Errors
///
/// Returns [`ApiError`] if the approval is absent, already decided, or the
/// resumed invocation fails.
pub async fn approve(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(approval_id): Path<String>,
) -> Result<Json<InvokeToolResponse>, ApiError> {
    let approval_id = parse_id("approval_not_found", &approval_id)?;
    let approval = state.approvals.approve(approval_id)?;
    let project_id = originating_project_id(&state, &approval);
    let outcome = state.tool_executor.invoke(
        approval.run_id,
        project_id,
        &approval.tool_id,
        Some(approval.tool_version.as_str()),
        approval.inputs,
        user.user_id,
        state.config.workspace_root.clone(),
        true,
    )?;
    Ok(Json(outcome.into()))
}

/// Denies a pending approval; the gated call does not resume.
///
/// # Errors
///
/// Returns [`ApiError`] if the approval is absent or already decided.
pub async fn deny(
    State(state): State<AppState>,
    Path(approval_id): Path<String>,
) -> Result<Json<runlog_core::Approval>, ApiError> {
    let approval_id = parse_id("approval_not_found", &approval_id)?;
    let approval = state.approvals.deny(approval_id)?;
    state.event_log.append(runlog_core::EventIntent {
        run_id: approval.run_id,
        kind: "system_event".to_string(),
        payload: serde_json::json!({
            "code": "approval_decided",
            "details": format!("approval {} denied", approval.approval_id),
        }),
        actor: runlog_core::Actor::System,
        parent_event_id: None,
        correlation_id: Some(approval.correlation_id),
        privacy: runlog_core::Privacy::Standard,
        pins: runlog_core::Pins::default(),
        event_id: None,
        ts: None,
    })?;
    state.event_log.append(runlog_core::EventIntent {
        run_id: approval.run_id,
        kind: "tool_error".to_string(),
        payload: serde_json::json!({
            "error_code": "APPROVAL_DENIED",
            "message": "approval denied",
            "correlation_id": approval.correlation_id.to_string(),
            "binding_type": "inproc_safe",
        }),
        actor: runlog_core::Actor::System,
        parent_event_id: None,
        correlation_id: Some(approval.correlation_id),
        privacy: runlog_core::Privacy::Standard,
        pins: runlog_core::Pins::default(),
        event_id: None,
        ts: None,
    })?;
    Ok(Json(approval))
}
