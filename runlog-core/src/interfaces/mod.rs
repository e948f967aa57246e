// runlog-core/src/interfaces/mod.rs
// ============================================================================
// Module: Run Event Substrate Interfaces
// Description: Backend-agnostic contracts for persistence and tool dispatch.
// Purpose: Let runtime components depend on traits instead of a concrete
//          SQLite implementation, so tests can substitute an in-memory Store.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! [`Store`] is the single persistence seam: every runtime component takes
//! `Arc<dyn Store>` at construction rather than threading a database handle
//! implicitly. Implementations must be deterministic and fail closed;
//! `runlog-store-sqlite` is the durable implementation, but an in-memory
//! implementation is used in this crate's own tests (see `tests/`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ApprovalId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::NotificationId;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ThreadId;
use crate::core::identifiers::UserId;
use crate::core::model::Activity;
use crate::core::model::Approval;
use crate::core::model::Artifact;
use crate::core::model::ArtifactLink;
use crate::core::model::Event;
use crate::core::model::IdempotencyRecord;
use crate::core::model::Notification;
use crate::core::model::NotificationState;
use crate::core::model::ProvenanceCacheRow;
use crate::core::model::Run;
use crate::core::model::RunMetrics;
use crate::core::model::ScopeGrant;
use crate::core::model::Thread;
use crate::core::model::ToolCorrelation;
use crate::core::model::ToolManifest;
use crate::core::model::ToolMetrics;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors raised by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The write's exclusive transaction could not be acquired within the
    /// configured retry budget.
    #[error("write contended: {0}")]
    WriteContended(String),
    /// Underlying storage I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Data failed an integrity or shape check.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable record keeper for every substrate entity.
///
/// All mutation goes through this trait; runtime components never cache a
/// mutable copy of a stored entity (the provenance cache is itself a row
/// read and written through this trait, not an in-memory structure).
pub trait Store: Send + Sync {
    // -- Projects & Threads --------------------------------------------

    /// Fetches a thread by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the thread does not exist.
    fn get_thread(&self, thread_id: ThreadId) -> Result<Thread, StoreError>;

    /// Lists scope grants held by a project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_scope_grants(&self, project_id: ProjectId) -> Result<Vec<ScopeGrant>, StoreError>;

    // -- Runs -------------------------------------------------------------

    /// Creates a run and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn create_run(&self, run: Run) -> Result<Run, StoreError>;

    /// Fetches a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the run does not exist.
    fn get_run(&self, run_id: RunId) -> Result<Run, StoreError>;

    /// Updates a run's status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the run does not exist.
    fn update_run_status(
        &self,
        run_id: RunId,
        status: crate::core::model::RunStatus,
    ) -> Result<Run, StoreError>;

    /// Lists runs belonging to a thread, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_runs_in_thread(&self, thread_id: ThreadId) -> Result<Vec<Run>, StoreError>;

    /// Fetches the aggregate metrics row for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the run has no metrics row yet.
    fn get_run_metrics(&self, run_id: RunId) -> Result<RunMetrics, StoreError>;

    // -- Events -------------------------------------------------------------

    /// Returns the current high-water `seq` for a run (0 if no events).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn run_last_seq(&self, run_id: RunId) -> Result<u64, StoreError>;

    /// Opens an exclusive per-run write transaction (`BEGIN IMMEDIATE` in the
    /// SQLite implementation), serialising concurrent writers to the same
    /// run. Callers must read [`RunWriteTransaction::current_seq`] and
    /// [`RunWriteTransaction::current_metrics`] from inside the transaction
    /// before computing the row to commit, so quota checks and `seq`
    /// assignment observe a consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WriteContended`] if the exclusive transaction
    /// could not be acquired within the configured retry budget.
    fn begin_run_write(
        &self,
        run_id: RunId,
    ) -> Result<Box<dyn RunWriteTransaction>, StoreError>;

    /// Lists events for a run with `seq` greater than `after_seq`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_events(&self, run_id: RunId, after_seq: u64) -> Result<Vec<Event>, StoreError>;

    /// Upserts a run's tool correlation row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn put_tool_correlation(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
        correlation: ToolCorrelation,
    ) -> Result<(), StoreError>;

    /// Fetches a run's tool correlation row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_tool_correlation(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
    ) -> Result<Option<ToolCorrelation>, StoreError>;

    /// Updates per-`(tool_id, version)` operational metrics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn upsert_tool_metrics(
        &self,
        tool_id: &str,
        version: &str,
        metrics: ToolMetrics,
    ) -> Result<(), StoreError>;

    /// Lists tool metrics for every installed `(tool_id, version)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_tool_metrics(&self) -> Result<Vec<(String, String, ToolMetrics)>, StoreError>;

    // -- Tools --------------------------------------------------------------

    /// Fetches a tool manifest, `version` defaulting to the project's pin.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no manifest matches.
    fn get_manifest(&self, tool_id: &str, version: Option<&str>)
    -> Result<ToolManifest, StoreError>;

    /// Lists all installed tool manifests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_manifests(&self) -> Result<Vec<ToolManifest>, StoreError>;

    // -- Approvals ------------------------------------------------------

    /// Creates a pending approval.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn create_approval(&self, approval: Approval) -> Result<Approval, StoreError>;

    /// Fetches an approval by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the approval does not exist.
    fn get_approval(&self, approval_id: ApprovalId) -> Result<Approval, StoreError>;

    /// Returns the most recent approval for `(run_id, tool_id, tool_version)`,
    /// used by PolicyEngine rule 2.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn find_latest_approval(
        &self,
        run_id: RunId,
        tool_id: &str,
        tool_version: &str,
    ) -> Result<Option<Approval>, StoreError>;

    /// Transitions an approval's status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the approval does not exist.
    fn set_approval_status(
        &self,
        approval_id: ApprovalId,
        status: crate::core::model::ApprovalStatus,
    ) -> Result<Approval, StoreError>;

    /// Lists approvals for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_approvals(&self, run_id: RunId) -> Result<Vec<Approval>, StoreError>;

    // -- Artifacts ------------------------------------------------------

    /// Inserts an artifact, or returns the existing row if the content hash
    /// already exists (content-addressed dedup).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn put_artifact(&self, artifact: Artifact) -> Result<Artifact, StoreError>;

    /// Fetches an artifact by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the artifact does not exist.
    fn get_artifact(&self, artifact_id: ArtifactId) -> Result<Artifact, StoreError>;

    /// Records a structured provenance link.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn link_artifact(&self, link: ArtifactLink) -> Result<(), StoreError>;

    /// Lists artifact links recorded for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_run_artifact_links(&self, run_id: RunId) -> Result<Vec<ArtifactLink>, StoreError>;

    // -- Idempotency ------------------------------------------------------

    /// Looks up a stored idempotent response.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn find_idempotency_record(
        &self,
        user_id: UserId,
        endpoint: &str,
        composite_key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Stores a new idempotent response.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn put_idempotency_record(&self, record: IdempotencyRecord) -> Result<(), StoreError>;

    // -- Provenance Cache -------------------------------------------------

    /// Fetches the provenance cache row for a run, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_provenance_cache(
        &self,
        run_id: RunId,
    ) -> Result<Option<ProvenanceCacheRow>, StoreError>;

    /// Upserts the provenance cache row for a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn put_provenance_cache(&self, row: ProvenanceCacheRow) -> Result<(), StoreError>;

    /// Deletes the provenance cache row for a run, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn invalidate_provenance_cache(&self, run_id: RunId) -> Result<(), StoreError>;

    // -- Notifications & Activity -----------------------------------------

    /// Inserts a notification with the next per-user sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn append_notification(&self, notification: Notification) -> Result<Notification, StoreError>;

    /// Lists notifications for a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
        after_seq: u64,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Counts notifications of `kind` already emitted for `run_id`, across
    /// all recipients, used by the `notify_tool_errors_max_per_run` knob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn count_run_notifications_by_kind(
        &self,
        run_id: RunId,
        kind: &str,
    ) -> Result<u64, StoreError>;

    /// Fetches or initialises a user's notification read-state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn get_notification_state(&self, user_id: UserId) -> Result<NotificationState, StoreError>;

    /// Advances `last_seen_notification_seq`, never regressing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn advance_notification_state(
        &self,
        user_id: UserId,
        up_to_seq: u64,
    ) -> Result<NotificationState, StoreError>;

    /// Marks specific notifications read by id, without touching the
    /// high-water mark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn mark_notifications_read_by_id(
        &self,
        user_id: UserId,
        ids: &[NotificationId],
    ) -> Result<(), StoreError>;

    /// Appends a project activity row with the next per-project sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn append_activity(&self, activity: Activity) -> Result<Activity, StoreError>;

    /// Lists activity rows for a project with `activity_seq > after_seq`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn list_activity(
        &self,
        project_id: ProjectId,
        after_seq: u64,
    ) -> Result<Vec<Activity>, StoreError>;

    // -- Counters & Gauges --------------------------------------------------

    /// Increments a named integer counter and returns its new value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn increment_counter(&self, name: &str, delta: i64) -> Result<i64, StoreError>;

    /// Sets a named real-valued gauge.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError>;

    /// Snapshots all counters and gauges, for `system_stats`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn snapshot_metrics(&self) -> Result<Value, StoreError>;

    /// Pings the store for liveness, for `system_health`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    fn health_check(&self) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Run Write Transaction
// ============================================================================

/// An open, exclusive per-run write transaction.
///
/// Dropping without calling [`RunWriteTransaction::commit`] rolls back,
/// matching the SQLite implementation's `BEGIN IMMEDIATE` + implicit
/// rollback-on-drop behaviour.
pub trait RunWriteTransaction {
    /// The run's `seq` high-water mark as observed inside this transaction.
    fn current_seq(&self) -> u64;

    /// The run's aggregate metrics as observed inside this transaction.
    fn current_metrics(&self) -> RunMetrics;

    /// Commits the event and its updated aggregate metrics, ending the
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn commit(self: Box<Self>, event: Event, metrics: RunMetrics) -> Result<Event, StoreError>;
}

// ============================================================================
// SECTION: Tool Binding
// ============================================================================

/// Context passed to an `inproc_safe` binding, constraining filesystem
/// access to the invoking project's workspace root.
#[derive(Debug, Clone)]
pub struct InprocContext {
    /// Absolute path to `<workspace_root>/<project_id>`.
    pub workspace_root: std::path::PathBuf,
}

/// Errors raised while dispatching a tool binding.
#[derive(Debug, Error)]
pub enum ToolBindingError {
    /// The resolved path escaped the workspace root or used a blacklisted
    /// token.
    #[error("unsafe path: {0}")]
    UnsafePath(String),
    /// The binding exceeded its wall-clock timeout.
    #[error("timeout after {0}ms")]
    Timeout(u64),
    /// A remote MCP or OpenAPI call failed at the transport layer.
    #[error("mcp error: {0}")]
    McpError(String),
    /// The binding ran but failed for a binding-specific reason.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// A dispatchable tool implementation, registered in a tool registry keyed
/// by `(tool_id, version)`.
pub trait ToolBinding: Send + Sync {
    /// Invokes the binding with validated inputs and returns raw outputs
    /// (still subject to the caller's outputs-schema validation).
    ///
    /// # Errors
    ///
    /// Returns [`ToolBindingError`] when dispatch fails.
    fn invoke(&self, inputs: &Value, ctx: &InprocContext) -> Result<Value, ToolBindingError>;
}
