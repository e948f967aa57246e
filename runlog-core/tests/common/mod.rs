// runlog-core/tests/common/mod.rs
// ============================================================================
// Module: In-Memory Store Test Double
// Description: A non-durable Store implementation for integration tests.
// Purpose: Exercise EventLog/PolicyEngine/ToolExecutor/ProvenanceService
//          without a SQLite backend.
// ============================================================================

#![allow(missing_docs, reason = "test support module, not part of the public API")]
#![allow(clippy::missing_errors_doc, reason = "test support module")]
#![allow(clippy::missing_docs_in_private_items, reason = "test support module")]
#![allow(clippy::unwrap_used, reason = "test support module")]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use runlog_core::core::identifiers::ApprovalId;
use runlog_core::core::identifiers::ArtifactId;
use runlog_core::core::identifiers::CorrelationId;
use runlog_core::core::identifiers::NotificationId;
use runlog_core::core::identifiers::ProjectId;
use runlog_core::core::identifiers::RunId;
use runlog_core::core::identifiers::ThreadId;
use runlog_core::core::identifiers::UserId;
use runlog_core::core::model::Activity;
use runlog_core::core::model::Approval;
use runlog_core::core::model::ApprovalStatus;
use runlog_core::core::model::Artifact;
use runlog_core::core::model::ArtifactLink;
use runlog_core::core::model::Event;
use runlog_core::core::model::IdempotencyRecord;
use runlog_core::core::model::Notification;
use runlog_core::core::model::NotificationState;
use runlog_core::core::model::ProvenanceCacheRow;
use runlog_core::core::model::Run;
use runlog_core::core::model::RunMetrics;
use runlog_core::core::model::RunStatus;
use runlog_core::core::model::ScopeGrant;
use runlog_core::core::model::Thread;
use runlog_core::core::model::ToolCorrelation;
use runlog_core::core::model::ToolManifest;
use runlog_core::core::model::ToolMetrics;
use runlog_core::interfaces::RunWriteTransaction;
use runlog_core::interfaces::Store;
use runlog_core::interfaces::StoreError;
use serde_json::Value;

#[derive(Default)]
struct State {
    threads: BTreeMap<ThreadId, Thread>,
    scope_grants: BTreeMap<ProjectId, Vec<ScopeGrant>>,
    runs: BTreeMap<RunId, Run>,
    run_events: BTreeMap<RunId, Vec<Event>>,
    run_metrics: BTreeMap<RunId, RunMetrics>,
    tool_correlations: BTreeMap<(RunId, CorrelationId), ToolCorrelation>,
    tool_metrics: BTreeMap<(String, String), ToolMetrics>,
    manifests: BTreeMap<(String, String), ToolManifest>,
    approvals: BTreeMap<ApprovalId, Approval>,
    artifacts: BTreeMap<ArtifactId, Artifact>,
    artifact_links: BTreeMap<RunId, Vec<ArtifactLink>>,
    idempotency: BTreeMap<(UserId, String, String), IdempotencyRecord>,
    provenance_cache: BTreeMap<RunId, ProvenanceCacheRow>,
    notifications: BTreeMap<UserId, Vec<Notification>>,
    notification_states: BTreeMap<UserId, NotificationState>,
    activity: BTreeMap<ProjectId, Vec<Activity>>,
    counters: BTreeMap<String, i64>,
    gauges: BTreeMap<String, f64>,
}

/// A non-durable, single-process Store used only by this crate's tests.
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(State::default())),
        })
    }

    pub fn seed_thread(&self, thread: Thread) {
        let mut state = self.state.lock().unwrap();
        state.threads.insert(thread.thread_id, thread);
    }

    pub fn seed_scope_grant(&self, grant: ScopeGrant) {
        let mut state = self.state.lock().unwrap();
        state.scope_grants.entry(grant.project_id).or_default().push(grant);
    }

    pub fn seed_manifest(&self, manifest: ToolManifest) {
        let mut state = self.state.lock().unwrap();
        state
            .manifests
            .insert((manifest.tool_id.clone(), manifest.version.clone()), manifest);
    }
}

struct InMemoryTransaction {
    state: Arc<Mutex<State>>,
    run_id: RunId,
    seq: u64,
    metrics: RunMetrics,
}

impl RunWriteTransaction for InMemoryTransaction {
    fn current_seq(&self) -> u64 {
        self.seq
    }

    fn current_metrics(&self) -> RunMetrics {
        self.metrics.clone()
    }

    fn commit(self: Box<Self>, event: Event, metrics: RunMetrics) -> Result<Event, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.run_events.entry(self.run_id).or_default().push(event.clone());
        state.run_metrics.insert(self.run_id, metrics);
        Ok(event)
    }
}

impl Store for InMemoryStore {
    fn get_thread(&self, thread_id: ThreadId) -> Result<Thread, StoreError> {
        self.state
            .lock()
            .unwrap()
            .threads
            .get(&thread_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(thread_id.to_string()))
    }

    fn list_scope_grants(&self, project_id: ProjectId) -> Result<Vec<ScopeGrant>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .scope_grants
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_run(&self, run: Run) -> Result<Run, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.run_metrics.insert(run.run_id, RunMetrics::default());
        state.runs.insert(run.run_id, run.clone());
        Ok(run)
    }

    fn get_run(&self, run_id: RunId) -> Result<Run, StoreError> {
        self.state
            .lock()
            .unwrap()
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
    }

    fn update_run_status(&self, run_id: RunId, status: RunStatus) -> Result<Run, StoreError> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
        run.status = status;
        Ok(run.clone())
    }

    fn list_runs_in_thread(&self, thread_id: ThreadId) -> Result<Vec<Run>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .runs
            .values()
            .filter(|r| r.thread_id == thread_id)
            .cloned()
            .collect())
    }

    fn get_run_metrics(&self, run_id: RunId) -> Result<RunMetrics, StoreError> {
        self.state
            .lock()
            .unwrap()
            .run_metrics
            .get(&run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
    }

    fn run_last_seq(&self, run_id: RunId) -> Result<u64, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .run_events
            .get(&run_id)
            .and_then(|events| events.last())
            .map_or(0, |e| e.seq))
    }

    fn begin_run_write(&self, run_id: RunId) -> Result<Box<dyn RunWriteTransaction>, StoreError> {
        let state = self.state.lock().unwrap();
        let seq = state
            .run_events
            .get(&run_id)
            .and_then(|events| events.last())
            .map_or(0, |e| e.seq);
        let metrics = state.run_metrics.get(&run_id).cloned().unwrap_or_default();
        drop(state);
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            run_id,
            seq,
            metrics,
        }))
    }

    fn list_events(&self, run_id: RunId, after_seq: u64) -> Result<Vec<Event>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .run_events
            .get(&run_id)
            .map(|events| events.iter().filter(|e| e.seq > after_seq).cloned().collect())
            .unwrap_or_default())
    }

    fn put_tool_correlation(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
        correlation: ToolCorrelation,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .tool_correlations
            .insert((run_id, correlation_id), correlation);
        Ok(())
    }

    fn get_tool_correlation(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
    ) -> Result<Option<ToolCorrelation>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tool_correlations
            .get(&(run_id, correlation_id))
            .cloned())
    }

    fn upsert_tool_metrics(
        &self,
        tool_id: &str,
        version: &str,
        metrics: ToolMetrics,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .tool_metrics
            .insert((tool_id.to_string(), version.to_string()), metrics);
        Ok(())
    }

    fn list_tool_metrics(&self) -> Result<Vec<(String, String, ToolMetrics)>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tool_metrics
            .iter()
            .map(|((tool_id, version), metrics)| (tool_id.clone(), version.clone(), metrics.clone()))
            .collect())
    }

    fn get_manifest(&self, tool_id: &str, version: Option<&str>) -> Result<ToolManifest, StoreError> {
        let state = self.state.lock().unwrap();
        if let Some(version) = version {
            return state
                .manifests
                .get(&(tool_id.to_string(), version.to_string()))
                .cloned()
                .ok_or_else(|| StoreError::NotFound(tool_id.to_string()));
        }
        state
            .manifests
            .iter()
            .find(|((id, _), _)| id == tool_id)
            .map(|(_, manifest)| manifest.clone())
            .ok_or_else(|| StoreError::NotFound(tool_id.to_string()))
    }

    fn list_manifests(&self) -> Result<Vec<ToolManifest>, StoreError> {
        Ok(self.state.lock().unwrap().manifests.values().cloned().collect())
    }

    fn create_approval(&self, approval: Approval) -> Result<Approval, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.approvals.insert(approval.approval_id, approval.clone());
        Ok(approval)
    }

    fn get_approval(&self, approval_id: ApprovalId) -> Result<Approval, StoreError> {
        self.state
            .lock()
            .unwrap()
            .approvals
            .get(&approval_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(approval_id.to_string()))
    }

    fn find_latest_approval(
        &self,
        run_id: RunId,
        tool_id: &str,
        tool_version: &str,
    ) -> Result<Option<Approval>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .approvals
            .values()
            .filter(|a| a.run_id == run_id && a.tool_id == tool_id && a.tool_version == tool_version)
            .last()
            .cloned())
    }

    fn set_approval_status(
        &self,
        approval_id: ApprovalId,
        status: ApprovalStatus,
    ) -> Result<Approval, StoreError> {
        let mut state = self.state.lock().unwrap();
        let approval = state
            .approvals
            .get_mut(&approval_id)
            .ok_or_else(|| StoreError::NotFound(approval_id.to_string()))?;
        approval.status = status;
        Ok(approval.clone())
    }

    fn list_approvals(&self, run_id: RunId) -> Result<Vec<Approval>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .approvals
            .values()
            .filter(|a| a.run_id == run_id)
            .cloned()
            .collect())
    }

    fn put_artifact(&self, artifact: Artifact) -> Result<Artifact, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .artifacts
            .values()
            .find(|a| a.content_hash == artifact.content_hash)
        {
            return Ok(existing.clone());
        }
        state.artifacts.insert(artifact.artifact_id, artifact.clone());
        Ok(artifact)
    }

    fn get_artifact(&self, artifact_id: ArtifactId) -> Result<Artifact, StoreError> {
        self.state
            .lock()
            .unwrap()
            .artifacts
            .get(&artifact_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(artifact_id.to_string()))
    }

    fn link_artifact(&self, link: ArtifactLink) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .artifact_links
            .entry(link.run_id)
            .or_default()
            .push(link);
        Ok(())
    }

    fn list_run_artifact_links(&self, run_id: RunId) -> Result<Vec<ArtifactLink>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .artifact_links
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    fn find_idempotency_record(
        &self,
        user_id: UserId,
        endpoint: &str,
        composite_key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .idempotency
            .get(&(user_id, endpoint.to_string(), composite_key.to_string()))
            .cloned())
    }

    fn put_idempotency_record(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        self.state.lock().unwrap().idempotency.insert(
            (record.user_id, record.endpoint.clone(), record.composite_key.clone()),
            record,
        );
        Ok(())
    }

    fn get_provenance_cache(&self, run_id: RunId) -> Result<Option<ProvenanceCacheRow>, StoreError> {
        Ok(self.state.lock().unwrap().provenance_cache.get(&run_id).cloned())
    }

    fn put_provenance_cache(&self, row: ProvenanceCacheRow) -> Result<(), StoreError> {
        self.state.lock().unwrap().provenance_cache.insert(row.run_id, row);
        Ok(())
    }

    fn invalidate_provenance_cache(&self, run_id: RunId) -> Result<(), StoreError> {
        self.state.lock().unwrap().provenance_cache.remove(&run_id);
        Ok(())
    }

    fn append_notification(&self, mut notification: Notification) -> Result<Notification, StoreError> {
        let mut state = self.state.lock().unwrap();
        let bucket = state.notifications.entry(notification.user_id).or_default();
        notification.notification_seq = bucket.last().map_or(1, |n| n.notification_seq + 1);
        bucket.push(notification.clone());
        Ok(notification)
    }

    fn list_notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
        after_seq: u64,
    ) -> Result<Vec<Notification>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .notifications
            .get(&user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|n| n.notification_seq > after_seq)
                    .filter(|n| !unread_only || n.read_at.is_none())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count_run_notifications_by_kind(&self, run_id: RunId, kind: &str) -> Result<u64, StoreError> {
        let state = self.state.lock().unwrap();
        let count = state
            .notifications
            .values()
            .flatten()
            .filter(|n| n.run_id == Some(run_id) && n.kind == kind)
            .count();
        Ok(count as u64)
    }

    fn get_notification_state(&self, user_id: UserId) -> Result<NotificationState, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .notification_states
            .get(&user_id)
            .cloned()
            .unwrap_or(NotificationState {
                user_id,
                last_seen_notification_seq: 0,
            }))
    }

    fn advance_notification_state(
        &self,
        user_id: UserId,
        up_to_seq: u64,
    ) -> Result<NotificationState, StoreError> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .notification_states
            .entry(user_id)
            .or_insert(NotificationState {
                user_id,
                last_seen_notification_seq: 0,
            });
        entry.last_seen_notification_seq = entry.last_seen_notification_seq.max(up_to_seq);
        Ok(entry.clone())
    }

    fn mark_notifications_read_by_id(
        &self,
        user_id: UserId,
        ids: &[NotificationId],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(rows) = state.notifications.get_mut(&user_id) {
            for row in rows.iter_mut() {
                if ids.contains(&row.notification_id) {
                    row.read_at = Some(runlog_core::core::time::Timestamp::from_millis(0));
                }
            }
        }
        Ok(())
    }

    fn append_activity(&self, mut activity: Activity) -> Result<Activity, StoreError> {
        let mut state = self.state.lock().unwrap();
        let bucket = state.activity.entry(activity.project_id).or_default();
        activity.activity_seq = bucket.last().map_or(1, |a| a.activity_seq + 1);
        bucket.push(activity.clone());
        Ok(activity)
    }

    fn list_activity(&self, project_id: ProjectId, after_seq: u64) -> Result<Vec<Activity>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .activity
            .get(&project_id)
            .map(|rows| rows.iter().filter(|a| a.activity_seq > after_seq).cloned().collect())
            .unwrap_or_default())
    }

    fn increment_counter(&self, name: &str, delta: i64) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let counter = state.counters.entry(name.to_string()).or_insert(0);
        *counter += delta;
        Ok(*counter)
    }

    fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError> {
        self.state.lock().unwrap().gauges.insert(name.to_string(), value);
        Ok(())
    }

    fn snapshot_metrics(&self) -> Result<Value, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(serde_json::json!({
            "counters": state.counters,
            "gauges": state.gauges,
        }))
    }

    fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
