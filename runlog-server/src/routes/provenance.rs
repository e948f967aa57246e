// runlog-server/src/routes/provenance.rs
// ============================================================================
// Module: Provenance Routes
// Description: provenance_summary, provenance_graph, provenance_why.
// Purpose: HTTP surface over ProvenanceService's cached graph construction
//          and reverse-BFS why-path search.
// Dependencies: axum, runlog-core
// ============================================================================

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use runlog_core::ProvenanceLimits;
use serde::Deserialize;
use serde::Serialize;
use axum::Json;

use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

/// Query parameters shared by `provenance_graph` and `provenance_why`.
#[derive(Debug, Deserialize)]
pub struct ProvenanceLimitsQuery {
    /// Maximum BFS depth from artifact roots.
    #[serde(default)]
    pub max_depth: Option<u32>,
    /// Maximum nodes retained.
    #[serde(default)]
    pub node_cap: Option<usize>,
    /// Maximum edges retained.
    #[serde(default)]
    pub edge_cap: Option<usize>,
}

impl ProvenanceLimitsQuery {
    fn resolve(&self) -> ProvenanceLimits {
        let defaults = ProvenanceLimits::default();
        ProvenanceLimits {
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            node_cap: self.node_cap.unwrap_or(defaults.node_cap),
            edge_cap: self.edge_cap.unwrap_or(defaults.edge_cap),
        }
    }
}

/// A compact provenance summary, for a dashboard tile.
#[derive(Debug, Serialize)]
pub struct ProvenanceSummary {
    /// Total node count.
    pub node_count: usize,
    /// Total edge count.
    pub edge_count: usize,
    /// True if the graph was truncated by the default caps.
    pub truncated: bool,
    /// The run `seq` this summary reflects.
    pub last_seq: u64,
}

/// Returns a compact node/edge count summary for a run's provenance graph,
/// using the default limits and cache.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id` is malformed or the store fails.
pub async fn provenance_summary(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<ProvenanceSummary>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    let graph = state.provenance.graph(run_id, ProvenanceLimits::default(), true)?;
    Ok(Json(ProvenanceSummary {
        node_count: graph.nodes.len(),
        edge_count: graph.edges.len(),
        truncated: graph.truncated,
        last_seq: graph.last_seq,
    }))
}

/// Returns the full provenance graph for a run.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id` is malformed or the store fails.
pub async fn provenance_graph(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(query): Query<ProvenanceLimitsQuery>,
) -> Result<Json<runlog_core::ProvenanceGraph>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    let limits = query.resolve();
    let use_default_limits = query.max_depth.is_none() && query.node_cap.is_none() && query.edge_cap.is_none();
    let graph = state.provenance.graph(run_id, limits, use_default_limits)?;
    Ok(Json(graph))
}

/// Query parameters for `provenance_why`.
#[derive(Debug, Deserialize)]
pub struct ProvenanceWhyQuery {
    /// Maximum BFS depth from artifact roots.
    #[serde(default)]
    pub max_depth: Option<u32>,
    /// Maximum number of paths returned.
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,
}

fn default_max_paths() -> usize {
    10
}

/// Returns up to `max_paths` causal paths from an artifact back to its
/// contributing events.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id`/`artifact_id` are malformed or the
/// store fails.
pub async fn provenance_why(
    State(state): State<AppState>,
    Path((run_id, artifact_id)): Path<(String, String)>,
    Query(query): Query<ProvenanceWhyQuery>,
) -> Result<Json<Vec<Vec<String>>>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    let artifact_id = parse_id("artifact_not_found", &artifact_id)?;
    let defaults = ProvenanceLimits::default();
    let limits = ProvenanceLimits { max_depth: query.max_depth.unwrap_or(defaults.max_depth), ..defaults };
    let paths = state.provenance.why_paths(run_id, artifact_id, limits, query.max_paths)?;
    Ok(Json(paths))
}
