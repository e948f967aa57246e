// runlog-core/src/core/model.rs
// ============================================================================
// Module: Run Event Substrate Domain Model
// Description: Persistent entities shared by EventLog, QuotaGuard,
//              PolicyEngine, ApprovalLedger, NotificationRouter, and
//              ProvenanceService.
// Purpose: Give every runtime component a single, typed vocabulary for the
//          rows the Store persists.
// Dependencies: crate::core::{identifiers, time, hashing}, serde_json
// ============================================================================

//! ## Overview
//! These types mirror the data model: dynamic, heterogeneous event payloads
//! are represented as canonical JSON [`serde_json::Value`] validated at the
//! boundary by `runlog-contract`'s schema registry, never as an open-ended
//! dynamic bag threaded through typed code.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ApprovalId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::NotificationId;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ThreadId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Project & Thread
// ============================================================================

/// A project: owns threads and scope grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project identifier.
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// A thread: either project-owned or user-owned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Thread identifier.
    pub thread_id: ThreadId,
    /// Owning project, if project-scoped.
    pub project_id: Option<ProjectId>,
    /// Owning user, if uncategorised.
    pub owner_user_id: Option<UserId>,
    /// Display title.
    pub title: String,
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Lifecycle state of a [`Run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepting events.
    Running,
    /// Finished successfully.
    Completed,
    /// Terminated by the caller.
    Cancelled,
    /// Terminated by an unrecoverable error.
    Failed,
    /// Blocked on a pending [`Approval`].
    WaitingApproval,
}

impl RunStatus {
    /// Returns true if this status represents a run-terminal state, as used
    /// by the `run_status` terminal-kind check in event commit step 3.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Frozen configuration snapshot captured at run start and copied onto
/// every event (model config, tool versions, executor version).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pins {
    /// Model configuration snapshot, opaque to the substrate.
    pub model_config: Option<Value>,
    /// Tool id/version pins at run start, keyed by `tool_id`.
    pub tool_versions: BTreeMap<String, String>,
    /// Executor version at run start.
    pub executor_version: String,
}

/// A bounded execution scope inside a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run identifier.
    pub run_id: RunId,
    /// Owning thread.
    pub thread_id: ThreadId,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// The user who created the run.
    pub created_by_user_id: UserId,
    /// Configuration snapshot frozen at run start.
    pub pins: Pins,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// Who originated an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// A human user.
    User,
    /// The assistant model.
    Assistant,
    /// A tool invocation.
    Tool,
    /// The substrate itself.
    System,
}

/// Privacy classification carried on an event, opaque to the substrate
/// beyond storage and pass-through to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    /// Visible to all project members.
    Standard,
    /// Visible only to the actor and project owners.
    Restricted,
}

/// A caller-supplied intent to append an event, before `seq`/`ts` assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIntent {
    /// Target run.
    pub run_id: RunId,
    /// Event kind, used to select the payload schema.
    pub kind: String,
    /// Canonical JSON payload, validated against the kind's schema.
    pub payload: Value,
    /// Event originator.
    pub actor: Actor,
    /// Causal parent, if any.
    pub parent_event_id: Option<EventId>,
    /// Correlation group, if any (tool call/outcome linkage).
    pub correlation_id: Option<CorrelationId>,
    /// Privacy classification.
    pub privacy: Privacy,
    /// Configuration snapshot copied onto the event.
    pub pins: Pins,
    /// Caller-assigned id, for idempotent assistant streaming.
    pub event_id: Option<EventId>,
    /// Caller-assigned timestamp override, for replays.
    pub ts: Option<Timestamp>,
}

/// The stored, immutable envelope returned by [`crate::runtime::eventlog::EventLog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub event_id: EventId,
    /// Owning run.
    pub run_id: RunId,
    /// Owning thread, denormalised for read convenience.
    pub thread_id: ThreadId,
    /// Owning project, denormalised for read convenience.
    pub project_id: Option<ProjectId>,
    /// Per-run monotonic sequence number.
    pub seq: u64,
    /// Commit timestamp.
    pub ts: Timestamp,
    /// Event kind.
    pub kind: String,
    /// Canonical JSON payload.
    pub payload: Value,
    /// Causal parent, if any.
    pub parent_event_id: Option<EventId>,
    /// Correlation group, if any.
    pub correlation_id: Option<CorrelationId>,
    /// Event originator.
    pub actor: Actor,
    /// Privacy classification.
    pub privacy: Privacy,
    /// Configuration snapshot copied at append time.
    pub pins: Pins,
}

/// Event kinds recognised as "provenance-affecting" (invalidate the
/// [`ProvenanceCache`] row for their run). The prefix `workflow_` is
/// matched separately by callers via [`is_provenance_affecting`].
pub const PROVENANCE_AFFECTING_KINDS: &[&str] = &[
    "artifact_ref",
    "tool_call",
    "tool_result",
    "tool_error",
    "research_source_created",
    "research_report_created",
];

/// Returns true if `kind` invalidates the provenance cache: one of
/// [`PROVENANCE_AFFECTING_KINDS`] or prefixed with `workflow_`.
#[must_use]
pub fn is_provenance_affecting(kind: &str) -> bool {
    PROVENANCE_AFFECTING_KINDS.contains(&kind) || kind.starts_with("workflow_")
}

/// Run-terminal `run_status` payload values, per event commit step 3.
pub const RUN_STATUS_TERMINAL_VALUES: &[&str] = &["complete", "completed", "denied", "failed"];

// ============================================================================
// SECTION: Artifacts
// ============================================================================

/// Coarse classification of an artifact's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Content-hash identifier.
    pub artifact_id: ArtifactId,
    /// Domain-level kind (e.g. `"image"`, `"document"`).
    pub kind: String,
    /// IANA media type.
    pub media_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 content hash, also the basis of `artifact_id`.
    pub content_hash: String,
    /// Opaque pointer into blob storage.
    pub storage_ref: String,
    /// The user who created the artifact.
    pub created_by: UserId,
}

/// A structured provenance link between a run event and an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactLink {
    /// Owning run.
    pub run_id: RunId,
    /// Event the link was recorded against.
    pub event_id: EventId,
    /// Linked artifact.
    pub artifact_id: ArtifactId,
    /// The event that produced the artifact, if different from `event_id`.
    pub source_event_id: Option<EventId>,
    /// Correlation group, if produced by a tool call.
    pub correlation_id: Option<CorrelationId>,
    /// Producing tool, if any.
    pub tool_id: Option<String>,
    /// Human-readable purpose (e.g. `"output"`, `"attachment"`).
    pub purpose: String,
}

// ============================================================================
// SECTION: Tools
// ============================================================================

/// Links a `tool_call` event to its eventual outcome event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCorrelation {
    /// `tool_call` event, if observed.
    pub tool_call_event_id: Option<EventId>,
    /// `tool_result`/`tool_error` event, if observed; last-write-wins.
    pub tool_outcome_event_id: Option<EventId>,
}

/// Binding mechanism a [`ToolManifest`] dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingType {
    /// In-process, workspace-constrained function call.
    InprocSafe,
    /// Isolated subprocess with timeout and output cap.
    SandboxJob,
    /// Remote MCP server call.
    McpRemote,
    /// Remote OpenAPI-described HTTP call.
    OpenapiProxy,
}

/// Dispatch target for a [`ToolManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolBindingSpec {
    /// Binding mechanism.
    pub binding_type: BindingType,
    /// Binding-specific entrypoint (function name, command, or URL).
    pub entrypoint: String,
}

/// Risk classification consulted by [`crate::runtime::policy::PolicyEngine`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Scopes the invoking project must hold.
    pub scopes_required: Vec<String>,
    /// Whether the tool performs external writes.
    pub external_write: bool,
    /// Whether the tool performs network egress.
    pub network_egress: bool,
}

/// Immutable-once-installed tool manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    /// Tool identifier.
    pub tool_id: String,
    /// Tool version.
    pub version: String,
    /// JSON Schema for inputs.
    pub inputs_schema: Value,
    /// JSON Schema for outputs.
    pub outputs_schema: Value,
    /// Dispatch target.
    pub binding: ToolBindingSpec,
    /// Risk classification.
    pub risk: RiskProfile,
}

/// A named capability a project possesses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeGrant {
    /// Owning project.
    pub project_id: ProjectId,
    /// Granted scope name (e.g. `"read_web"`).
    pub scope: String,
    /// The user who granted it.
    pub granted_by: UserId,
    /// Grant timestamp.
    pub granted_at: Timestamp,
}

// ============================================================================
// SECTION: Approvals
// ============================================================================

/// Decision state of an [`Approval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a human decision.
    Pending,
    /// Authorised to resume.
    Approved,
    /// Rejected; the gated call will not resume.
    Denied,
}

/// A human-authorised unblock of a policy-gated tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    /// Approval identifier.
    pub approval_id: ApprovalId,
    /// Owning run.
    pub run_id: RunId,
    /// Correlation this approval gates.
    pub correlation_id: CorrelationId,
    /// Originating tool.
    pub tool_id: String,
    /// Originating tool version.
    pub tool_version: String,
    /// Frozen inputs, replayed verbatim on approval.
    pub inputs: Value,
    /// Decision state.
    pub status: ApprovalStatus,
    /// The `tool_call` event that produced this approval.
    pub tool_call_event_id: EventId,
}

// ============================================================================
// SECTION: Idempotency
// ============================================================================

/// A stored idempotent response, keyed by `(user_id, endpoint, composite_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// The user who made the original request.
    pub user_id: UserId,
    /// Endpoint name the key is scoped to.
    pub endpoint: String,
    /// `key + ":" + sha256(canonical_request_body)`.
    pub composite_key: String,
    /// The exact response body to replay verbatim.
    pub stored_response: Value,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Provenance Cache
// ============================================================================

/// A cached provenance graph, valid iff `last_seq` matches the run's
/// current high-water mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceCacheRow {
    /// Owning run.
    pub run_id: RunId,
    /// The run's `seq` high-water mark when this graph was computed.
    pub last_seq: u64,
    /// Canonical JSON-encoded graph.
    pub graph_blob: Value,
    /// Computation timestamp.
    pub computed_at: Timestamp,
}

// ============================================================================
// SECTION: Notifications & Activity
// ============================================================================

/// A per-user delivered notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier.
    pub notification_id: NotificationId,
    /// Per-user monotonic sequence.
    pub notification_seq: u64,
    /// Recipient.
    pub user_id: UserId,
    /// Notification kind (mirrors the triggering event/activity kind).
    pub kind: String,
    /// Summary payload.
    pub payload: Value,
    /// Related project, if any.
    pub project_id: Option<ProjectId>,
    /// Related run, if any.
    pub run_id: Option<RunId>,
    /// Read timestamp, if read.
    pub read_at: Option<Timestamp>,
}

/// Per-user notification read-state high-water mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationState {
    /// The user this state belongs to.
    pub user_id: UserId,
    /// Highest `notification_seq` the user has acknowledged; monotonic.
    pub last_seen_notification_seq: u64,
}

/// A project-scoped audit-stream row for UI activity feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Owning project.
    pub project_id: ProjectId,
    /// Per-project monotonic sequence (row-id within the activity table).
    pub activity_seq: u64,
    /// Activity kind (e.g. `"comment_created"`, `"member_added"`).
    pub kind: String,
    /// Referenced entity type.
    pub ref_type: String,
    /// Referenced entity id.
    pub ref_id: String,
    /// The user who performed the action.
    pub actor_id: UserId,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Metrics Aggregates
// ============================================================================

/// Per-run aggregate counters maintained by [`crate::runtime::eventlog::EventLog`]
/// on every insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Total committed events.
    pub event_count: u64,
    /// Total cumulative payload bytes.
    pub bytes_in: u64,
    /// Total cumulative payload bytes from non-user actors.
    pub bytes_out: u64,
    /// Count of `tool_call` events.
    pub tool_calls: u64,
    /// Count of `tool_error` events.
    pub tool_errors: u64,
    /// Count of `artifact_ref` events.
    pub artifacts_count: u64,
    /// Set once, on the first run-terminal event; never overwritten.
    pub completed_at: Option<Timestamp>,
    /// Set once, alongside `completed_at`.
    pub duration_ms: Option<u64>,
}

/// Per-`(tool_id, tool_version)` operational metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetrics {
    /// Total invocations.
    pub calls: u64,
    /// Total `tool_error` outcomes.
    pub errors: u64,
    /// Latency of the most recent call, in milliseconds.
    pub last_latency_ms: Option<u64>,
    /// Error code of the most recent failure, if any.
    pub last_error_code: Option<String>,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provenance_affecting_matches_listed_kinds_and_workflow_prefix() {
        assert!(is_provenance_affecting("tool_call"));
        assert!(is_provenance_affecting("workflow_node_completed"));
        assert!(!is_provenance_affecting("user_message"));
    }

    #[test]
    fn run_status_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::WaitingApproval.is_terminal());
    }
}
