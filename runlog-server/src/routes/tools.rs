// runlog-server/src/routes/tools.rs
// ============================================================================
// Module: Tool Routes
// Description: list_tools, invoke_tool, get_manifest.
// Purpose: HTTP surface over the tool manifest registry and ToolExecutor.
// Dependencies: axum, runlog-core
// ============================================================================

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

/// One installed tool manifest paired with its operational metrics.
#[derive(Debug, Serialize)]
pub struct ToolSummary {
    /// The tool's manifest.
    pub manifest: runlog_core::ToolManifest,
    /// Call/error/latency counters, defaulted when the tool has never been
    /// invoked.
    pub metrics: runlog_core::ToolMetrics,
}

/// Lists every installed tool manifest, merged with its operational
/// metrics, per §10's tool/error metrics table.
///
/// # Errors
///
/// Returns [`ApiError`] if the store fails.
pub async fn list_tools(State(state): State<AppState>) -> Result<Json<Vec<ToolSummary>>, ApiError> {
    let manifests = state.store.list_manifests()?;
    let mut metrics_by_tool = state
        .store
        .list_tool_metrics()?
        .into_iter()
        .map(|(tool_id, version, metrics)| ((tool_id, version), metrics))
        .collect::<std::collections::HashMap<_, _>>();
    let summaries = manifests
        .into_iter()
        .map(|manifest| {
            let metrics = metrics_by_tool
                .remove(&(manifest.tool_id.clone(), manifest.version.clone()))
                .unwrap_or_default();
            ToolSummary { manifest, metrics }
        })
        .collect();
    Ok(Json(summaries))
}

/// Query parameters for `get_manifest`.
#[derive(Debug, Deserialize)]
pub struct GetManifestQuery {
    /// Explicit version; defaults to the project's pin when absent.
    #[serde(default)]
    pub version: Option<String>,
}

/// Fetches one tool manifest, `version` defaulting to the project's pin.
///
/// # Errors
///
/// Returns [`ApiError`] if no manifest matches.
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(tool_id): Path<String>,
    Query(query): Query<GetManifestQuery>,
) -> Result<Json<runlog_core::ToolManifest>, ApiError> {
    let manifest = state.store.get_manifest(&tool_id, query.version.as_deref())?;
    Ok(Json(manifest))
}

/// Body for `invoke_tool`.
#[derive(Debug, Deserialize)]
pub struct InvokeToolRequest {
    /// Owning run.
    pub run_id: String,
    /// Owning project, consulted by PolicyEngine.
    pub project_id: String,
    /// Tool id to invoke.
    pub tool_id: String,
    /// Explicit version; defaults to the project's pin.
    #[serde(default)]
    pub version: Option<String>,
    /// Tool inputs, validated against the manifest's inputs schema.
    pub inputs: serde_json::Value,
}

/// One `invoke_tool` response shape, since the three [`runlog_core::ToolOutcome`]
/// variants carry different payloads.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvokeToolResponse {
    /// The tool ran to completion; `event` is the `tool_result` event.
    Completed {
        /// The `tool_result` event.
        event: runlog_core::Event,
    },
    /// PolicyEngine denied the call; `event` is the `tool_error` event.
    Denied {
        /// The `tool_error` event.
        event: runlog_core::Event,
    },
    /// A human decision is required before this call can resume.
    WaitingApproval {
        /// The created approval's id.
        approval_id: String,
    },
}

impl From<runlog_core::ToolOutcome> for InvokeToolResponse {
    fn from(outcome: runlog_core::ToolOutcome) -> Self {
        match outcome {
            runlog_core::ToolOutcome::Completed { event } => Self::Completed { event },
            runlog_core::ToolOutcome::Denied { event } => Self::Denied { event },
            runlog_core::ToolOutcome::WaitingApproval { approval_id } => {
                Self::WaitingApproval { approval_id: approval_id.to_string() }
            }
        }
    }
}

/// Invokes a tool through ToolExecutor, per section 4.4.
///
/// # Errors
///
/// Returns [`ApiError`] on validation, policy, approval, or dispatch
/// failure.
pub async fn invoke_tool(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<InvokeToolRequest>,
) -> Result<(StatusCode, Json<InvokeToolResponse>), ApiError> {
    let run_id = parse_id("run_not_found", &body.run_id)?;
    let project_id = parse_id("run_not_found", &body.project_id)?;
    let outcome = state.tool_executor.invoke(
        run_id,
        project_id,
        &body.tool_id,
        body.version.as_deref(),
        body.inputs,
        user.user_id,
        state.config.workspace_root.clone(),
        false,
    )?;
    let status = match &outcome {
        runlog_core::ToolOutcome::WaitingApproval { .. } => StatusCode::ACCEPTED,
        runlog_core::ToolOutcome::Completed { .. } | runlog_core::ToolOutcome::Denied { .. } => StatusCode::OK,
    };
    Ok((status, Json(outcome.into())))
}
