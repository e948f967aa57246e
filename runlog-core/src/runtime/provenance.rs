// runlog-core/src/runtime/provenance.rs
// ============================================================================
// Module: Provenance Service
// Description: Builds and caches a typed node/edge graph from run events,
//              artifacts, and tool correlations; supports bounded "why
//              paths" queries.
// Purpose: Implement §4.9's graph construction, sequence-gated cache, and
//          reverse-BFS why-path search.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The graph is rebuilt from scratch on every cache miss — there is no
//! incremental update — since the cache key is simply `(run_id, last_seq)`:
//! any provenance-affecting write invalidates the row (`EventLog` does this
//! in its post-commit side effects), and the next read recomputes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::RunId;
use crate::core::model::Event;
use crate::core::time::Clock;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

/// Errors raised while computing or reading provenance.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Graph Types
// ============================================================================

/// A provenance graph node's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A committed event.
    Event,
    /// A content-addressed artifact.
    Artifact,
    /// A research source record.
    ResearchSource,
    /// A workflow-scoped node.
    WorkflowNode,
}

/// A typed provenance graph edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `tool_call` -> its outcome event.
    ToolOutcome,
    /// An event -> the artifact it references.
    ArtifactRef,
    /// An artifact -> the event that produced it.
    SourceEventArtifact,
    /// An artifact -> the `tool_call` event indexed by correlation.
    CorrelationArtifact,
    /// A research source -> the tool call that produced it.
    ResearchSourceFromTool,
    /// A research report -> a cited source or artifact.
    Citation,
    /// A workflow node -> its triggering event.
    WorkflowEvent,
    /// A `workflow_node_completed` event -> its output artifact.
    OutputsRef,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node type.
    pub node_type: NodeType,
    /// Node id (event id, artifact id, etc, as its string form).
    pub id: String,
}

/// A graph edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Source node id.
    pub from: String,
    /// Destination node id.
    pub to: String,
    /// Edge kind.
    pub kind: EdgeKind,
    /// Edge-specific metadata, canonicalised for ordering.
    pub meta: Value,
}

/// A computed (or cached) provenance graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceGraph {
    /// Nodes, sorted by `(type, id)`.
    pub nodes: Vec<GraphNode>,
    /// Edges, sorted by `(from, to, kind, canonical(meta))`.
    pub edges: Vec<GraphEdge>,
    /// True if `node_cap`/`edge_cap` dropped content.
    pub truncated: bool,
    /// The run `seq` this graph reflects.
    pub last_seq: u64,
}

/// Bounds on graph construction, per §4.9 steps 7-8.
#[derive(Debug, Clone, Copy)]
pub struct ProvenanceLimits {
    /// Maximum BFS depth from artifact roots.
    pub max_depth: u32,
    /// Maximum nodes retained.
    pub node_cap: usize,
    /// Maximum edges retained.
    pub edge_cap: usize,
}

impl Default for ProvenanceLimits {
    fn default() -> Self {
        Self {
            max_depth: 6,
            node_cap: 2_000,
            edge_cap: 4_000,
        }
    }
}

// ============================================================================
// SECTION: Provenance Service
// ============================================================================

/// Builds and caches the provenance graph for a run.
pub struct ProvenanceService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ProvenanceService {
    /// Creates a new ProvenanceService.
    #[must_use]
    pub const fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the provenance graph for `run_id`, using the cache when the
    /// query uses default parameters and the cache's `last_seq` matches the
    /// run's current high-water mark.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError`] on store failure.
    pub fn graph(
        &self,
        run_id: RunId,
        limits: ProvenanceLimits,
        use_cache: bool,
    ) -> Result<ProvenanceGraph, ProvenanceError> {
        let current_seq = self.store.run_last_seq(run_id)?;

        if use_cache {
            if let Some(cached) = self.store.get_provenance_cache(run_id)? {
                if cached.last_seq == current_seq {
                    self.store.increment_counter("provenance_cache.hit_count", 1)?;
                    let graph: ProvenanceGraph = serde_json::from_value(cached.graph_blob)
                        .unwrap_or(ProvenanceGraph {
                            nodes: Vec::new(),
                            edges: Vec::new(),
                            truncated: false,
                            last_seq: cached.last_seq,
                        });
                    return Ok(graph);
                }
            }
            self.store.increment_counter("provenance_cache.miss_count", 1)?;
        }

        let graph = self.compute(run_id, limits, current_seq)?;

        if use_cache {
            self.store.increment_counter("provenance_cache.recompute_count", 1)?;
            let blob = serde_json::to_value(&graph).unwrap_or(Value::Null);
            self.store.put_provenance_cache(crate::core::model::ProvenanceCacheRow {
                run_id,
                last_seq: current_seq,
                graph_blob: blob,
                computed_at: self.clock.now(),
            })?;
        }

        Ok(graph)
    }

    /// Computes the graph from scratch, per §4.9 steps 1-9.
    fn compute(
        &self,
        run_id: RunId,
        limits: ProvenanceLimits,
        current_seq: u64,
    ) -> Result<ProvenanceGraph, ProvenanceError> {
        let events = self.store.list_events(run_id, 0)?;

        let mut call_by_correlation: BTreeMap<String, &Event> = BTreeMap::new();
        let mut outcome_by_correlation: BTreeMap<String, &Event> = BTreeMap::new();
        for event in &events {
            if let Some(correlation_id) = event.correlation_id {
                let key = correlation_id.to_string();
                if event.kind == "tool_call" {
                    call_by_correlation.entry(key).or_insert(event);
                } else if event.kind == "tool_result" || event.kind == "tool_error" {
                    outcome_by_correlation.insert(key, event);
                }
            }
        }

        let mut nodes: BTreeSet<GraphNode> = BTreeSet::new();
        let mut edges: Vec<GraphEdge> = Vec::new();

        for event in &events {
            nodes.insert(GraphNode {
                node_type: NodeType::Event,
                id: event.event_id.to_string(),
            });
            if event.kind.starts_with("workflow_") {
                nodes.insert(GraphNode {
                    node_type: NodeType::WorkflowNode,
                    id: event.event_id.to_string(),
                });
                edges.push(GraphEdge {
                    from: event.event_id.to_string(),
                    to: event.event_id.to_string(),
                    kind: EdgeKind::WorkflowEvent,
                    meta: Value::Null,
                });
            }
            if event.kind == "research_source_created" {
                nodes.insert(GraphNode {
                    node_type: NodeType::ResearchSource,
                    id: event.event_id.to_string(),
                });
                if let Some(correlation_id) = event.correlation_id {
                    if let Some(call) = call_by_correlation.get(&correlation_id.to_string()) {
                        edges.push(GraphEdge {
                            from: event.event_id.to_string(),
                            to: call.event_id.to_string(),
                            kind: EdgeKind::ResearchSourceFromTool,
                            meta: Value::Null,
                        });
                    }
                }
            }
            if event.kind == "research_report_created" {
                if let Some(citations) = event.payload.get("citations").and_then(Value::as_array) {
                    for citation in citations {
                        if let Some(target) = citation.as_str() {
                            edges.push(GraphEdge {
                                from: event.event_id.to_string(),
                                to: target.to_string(),
                                kind: EdgeKind::Citation,
                                meta: Value::Null,
                            });
                        }
                    }
                }
            }
        }

        for (correlation_key, call_event) in &call_by_correlation {
            if let Some(outcome_event) = outcome_by_correlation.get(correlation_key) {
                edges.push(GraphEdge {
                    from: call_event.event_id.to_string(),
                    to: outcome_event.event_id.to_string(),
                    kind: EdgeKind::ToolOutcome,
                    meta: Value::Null,
                });
            }
        }

        let links = self.store.list_run_artifact_links(run_id)?;
        if links.is_empty() {
            self.legacy_artifact_scan(&events, &mut nodes, &mut edges);
        } else {
            for link in &links {
                let artifact_id_str = link.artifact_id.to_string();
                nodes.insert(GraphNode {
                    node_type: NodeType::Artifact,
                    id: artifact_id_str.clone(),
                });
                edges.push(GraphEdge {
                    from: link.event_id.to_string(),
                    to: artifact_id_str.clone(),
                    kind: EdgeKind::ArtifactRef,
                    meta: Value::Null,
                });
                if let Some(source_event_id) = link.source_event_id {
                    edges.push(GraphEdge {
                        from: artifact_id_str.clone(),
                        to: source_event_id.to_string(),
                        kind: EdgeKind::SourceEventArtifact,
                        meta: Value::Null,
                    });
                }
                if let Some(correlation_id) = link.correlation_id {
                    if let Some(call) = call_by_correlation.get(&correlation_id.to_string()) {
                        edges.push(GraphEdge {
                            from: artifact_id_str.clone(),
                            to: call.event_id.to_string(),
                            kind: EdgeKind::CorrelationArtifact,
                            meta: Value::Null,
                        });
                    }
                }
            }
        }

        for event in &events {
            if event.kind == "workflow_node_completed" {
                if let Some(artifact_id) = event
                    .payload
                    .get("outputs_ref")
                    .and_then(Value::as_str)
                    .and_then(|raw| ArtifactId::parse(raw).ok())
                {
                    let artifact_id_str = artifact_id.to_string();
                    nodes.insert(GraphNode {
                        node_type: NodeType::Artifact,
                        id: artifact_id_str.clone(),
                    });
                    edges.push(GraphEdge {
                        from: event.event_id.to_string(),
                        to: artifact_id_str,
                        kind: EdgeKind::OutputsRef,
                        meta: Value::Null,
                    });
                }
            }
        }

        let (mut nodes, mut edges) = bfs_bound(nodes, edges, limits.max_depth);
        let mut truncated = false;
        if nodes.len() > limits.node_cap {
            nodes = nodes.into_iter().take(limits.node_cap).collect();
            truncated = true;
        }
        if edges.len() > limits.edge_cap {
            edges.truncate(limits.edge_cap);
            truncated = true;
        }

        edges.sort_by(|a, b| {
            (&a.from, &a.to, a.kind, a.meta.to_string()).cmp(&(&b.from, &b.to, b.kind, b.meta.to_string()))
        });

        Ok(ProvenanceGraph {
            nodes: nodes.into_iter().collect(),
            edges,
            truncated,
            last_seq: current_seq,
        })
    }

    /// Legacy fallback: scan `artifact_ref` events directly when no
    /// structured `artifact_links` rows exist for the run.
    fn legacy_artifact_scan(
        &self,
        events: &[Event],
        nodes: &mut BTreeSet<GraphNode>,
        edges: &mut Vec<GraphEdge>,
    ) {
        let mut scanned = 0_u64;
        for event in events {
            if event.kind != "artifact_ref" {
                continue;
            }
            if let Some(artifact_id) = event
                .payload
                .get("artifact_id")
                .and_then(Value::as_str)
                .and_then(|raw| ArtifactId::parse(raw).ok())
            {
                scanned += 1;
                let artifact_id_str = artifact_id.to_string();
                nodes.insert(GraphNode {
                    node_type: NodeType::Artifact,
                    id: artifact_id_str.clone(),
                });
                edges.push(GraphEdge {
                    from: event.event_id.to_string(),
                    to: artifact_id_str,
                    kind: EdgeKind::ArtifactRef,
                    meta: Value::Null,
                });
            }
        }
        if scanned > 0 {
            let _ = self.store.increment_counter("provenance.legacy_scan_count", i64::try_from(scanned).unwrap_or(i64::MAX));
        }
    }

    /// Reverse BFS from an artifact node along incoming edges, stopping at
    /// nodes of type event/research_source/workflow_node or `max_depth`,
    /// per §4.9's "why paths".
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError`] on store failure.
    pub fn why_paths(
        &self,
        run_id: RunId,
        artifact_id: ArtifactId,
        limits: ProvenanceLimits,
        max_paths: usize,
    ) -> Result<Vec<Vec<String>>, ProvenanceError> {
        let graph = self.graph(run_id, limits, true)?;
        let mut incoming: BTreeMap<&str, Vec<&GraphEdge>> = BTreeMap::new();
        for edge in &graph.edges {
            incoming.entry(edge.to.as_str()).or_default().push(edge);
        }
        let node_types: BTreeMap<&str, NodeType> =
            graph.nodes.iter().map(|n| (n.id.as_str(), n.node_type)).collect();

        let root = artifact_id.to_string();
        let mut paths: Vec<Vec<String>> = Vec::new();
        let mut queue: VecDeque<(Vec<String>, u32)> = VecDeque::new();
        queue.push_back((vec![root], 0));

        while let Some((path, depth)) = queue.pop_front() {
            if paths.len() >= max_paths {
                break;
            }
            let Some(last) = path.last() else { continue };
            let is_stop = node_types
                .get(last.as_str())
                .is_some_and(|t| matches!(t, NodeType::Event | NodeType::ResearchSource | NodeType::WorkflowNode));
            if is_stop || depth >= limits.max_depth {
                paths.push(path);
                continue;
            }
            let Some(edges) = incoming.get(last.as_str()) else {
                paths.push(path);
                continue;
            };
            for edge in edges {
                let mut next = path.clone();
                next.push(edge.from.clone());
                queue.push_back((next, depth + 1));
            }
        }

        paths.sort_by(|a, b| (a.len(), a.as_slice()).cmp(&(b.len(), b.as_slice())));
        paths.truncate(max_paths);
        Ok(paths)
    }
}

/// Bidirectional BFS rooted at artifact nodes up to `max_depth`, keeping
/// only reached nodes and edges, per §4.9 step 7.
fn bfs_bound(
    nodes: BTreeSet<GraphNode>,
    edges: Vec<GraphEdge>,
    max_depth: u32,
) -> (BTreeSet<GraphNode>, Vec<GraphEdge>) {
    let roots: Vec<&str> = nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Artifact)
        .map(|n| n.id.as_str())
        .collect();
    if roots.is_empty() {
        return (nodes, edges);
    }

    let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in &edges {
        adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        adjacency.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
    }

    let mut reached: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<(&str, u32)> = VecDeque::new();
    for root in roots {
        reached.insert(root.to_string());
        queue.push_back((root, 0));
    }
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        if let Some(neighbors) = adjacency.get(node) {
            for &next in neighbors {
                if reached.insert(next.to_string()) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
    }

    let kept_nodes: BTreeSet<GraphNode> = nodes.into_iter().filter(|n| reached.contains(&n.id)).collect();
    let kept_edges: Vec<GraphEdge> = edges
        .into_iter()
        .filter(|e| reached.contains(&e.from) && reached.contains(&e.to))
        .collect();
    (kept_nodes, kept_edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_node_ordering_is_by_type_then_id() {
        let a = GraphNode { node_type: NodeType::Event, id: "b".to_string() };
        let b = GraphNode { node_type: NodeType::Artifact, id: "a".to_string() };
        assert!(b < a, "Artifact < Event per enum declaration order");
    }

    #[test]
    fn bfs_bound_keeps_nodes_unreachable_filtered_out() {
        let nodes: BTreeSet<GraphNode> = [
            GraphNode { node_type: NodeType::Artifact, id: "art1".to_string() },
            GraphNode { node_type: NodeType::Event, id: "evt1".to_string() },
            GraphNode { node_type: NodeType::Event, id: "evt2".to_string() },
        ]
        .into_iter()
        .collect();
        let edges = vec![GraphEdge {
            from: "evt1".to_string(),
            to: "art1".to_string(),
            kind: EdgeKind::ArtifactRef,
            meta: Value::Null,
        }];
        let (kept_nodes, _) = bfs_bound(nodes, edges, 6);
        assert!(kept_nodes.iter().any(|n| n.id == "evt1"));
        assert!(!kept_nodes.iter().any(|n| n.id == "evt2"));
    }
}
