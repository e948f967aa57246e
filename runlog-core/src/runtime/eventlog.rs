// runlog-core/src/runtime/eventlog.rs
// ============================================================================
// Module: Event Log
// Description: The only write path for run events; owns seq assignment,
//              aggregate metrics, provenance invalidation, and the
//              metrics_computed follow-up.
// Purpose: Give every caller (ToolExecutor, HTTP collaborator) one
//          transactionally consistent way to append an event.
// Dependencies: crate::{core, interfaces, runtime::quota}
// ============================================================================

//! ## Overview
//! `EventLog::append` implements §4.1 of the run event substrate: validate,
//! open an exclusive per-run transaction, check quota, assign `seq`, update
//! aggregates, commit, then perform the side effects that only make sense
//! once the row is durable (artifact links, tool correlations, provenance
//! invalidation, the `metrics_computed` follow-up, and the notification
//! fan-out hook).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::core::hashing::canonical_json_bytes;
use crate::core::identifiers::EventId;
use crate::core::model::Actor;
use crate::core::model::Event;
use crate::core::model::EventIntent;
use crate::core::model::RUN_STATUS_TERMINAL_VALUES;
use crate::core::model::RunMetrics;
use crate::core::model::is_provenance_affecting;
use crate::core::model::ArtifactLink;
use crate::core::model::ToolCorrelation;
use crate::core::time::Clock;
use crate::core::time::IdGenerator;
use crate::interfaces::Store;
use crate::interfaces::StoreError;
use crate::runtime::quota::QuotaExceeded;
use crate::runtime::quota::QuotaGuard;
use crate::runtime::quota::QuotaLimits;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while appending an event.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// The run context does not exist.
    #[error("run_not_found: {0}")]
    RunNotFound(String),
    /// The payload did not match the registered schema for `kind`.
    #[error("schema_violation: {0}")]
    SchemaViolation(String),
    /// A configured ceiling would be crossed by this write.
    #[error("quota_exceeded: {0}")]
    QuotaExceeded(#[from] QuotaExceeded),
    /// The retry budget for the per-run exclusive transaction was exhausted.
    #[error("write_contended: run {0}")]
    WriteContended(String),
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EventLogError {
    /// Stable error-kind identifier, matching spec §7.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::RunNotFound(_) => "run_not_found",
            Self::SchemaViolation(_) => "schema_violation",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::WriteContended(_) => "write_contended",
            Self::Store(_) => "store_error",
        }
    }
}

// ============================================================================
// SECTION: Collaborator Traits
// ============================================================================

/// Validates an event payload against the schema registered for its kind.
/// Implemented by `runlog-contract`.
pub trait PayloadValidator: Send + Sync {
    /// Validates `payload` against the schema for `kind`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable violation description on mismatch.
    fn validate(&self, kind: &str, payload: &Value) -> Result<(), String>;
}

/// Observes events after they commit. `NotificationRouter` is the primary
/// implementation; the EventLog invokes it synchronously and swallows any
/// error after logging, since notification delivery must never roll back an
/// already-durable event.
pub trait EventObserver: Send + Sync {
    /// Called once per committed event, after all side effects in this
    /// module have run.
    fn on_event_committed(&self, event: &Event);
}

/// No-op observer, used where no notification fan-out is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl EventObserver for NoopObserver {
    fn on_event_committed(&self, _event: &Event) {}
}

// ============================================================================
// SECTION: EventLog
// ============================================================================

/// Configuration knobs the EventLog needs beyond its collaborators.
#[derive(Debug, Clone, Copy)]
pub struct EventLogConfig {
    /// Per-run quota ceilings.
    pub quota_limits: QuotaLimits,
    /// Maximum `begin_run_write` retries before surfacing `write_contended`.
    pub write_retry_budget: u32,
}

/// The only write path for run events.
pub struct EventLog {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    id_gen: Arc<dyn IdGenerator>,
    validator: Arc<dyn PayloadValidator>,
    observer: Arc<dyn EventObserver>,
    config: EventLogConfig,
}

impl EventLog {
    /// Creates a new EventLog.
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        id_gen: Arc<dyn IdGenerator>,
        validator: Arc<dyn PayloadValidator>,
        observer: Arc<dyn EventObserver>,
        config: EventLogConfig,
    ) -> Self {
        Self {
            store,
            clock,
            id_gen,
            validator,
            observer,
            config,
        }
    }

    /// Appends an event, per §4.1.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] on validation failure, quota rejection, or
    /// exhausted write-contention retries.
    pub fn append(&self, intent: EventIntent) -> Result<Event, EventLogError> {
        self.append_inner(intent, false)
    }

    /// Internal append. `is_system_followup` disables the best-effort quota
    /// audit and the `metrics_computed` follow-up, so this recursive call
    /// path can never grow beyond one extra level.
    fn append_inner(
        &self,
        intent: EventIntent,
        is_system_followup: bool,
    ) -> Result<Event, EventLogError> {
        let run = self
            .store
            .get_run(intent.run_id)
            .map_err(|_| EventLogError::RunNotFound(intent.run_id.to_string()))?;
        let project_id = self.store.get_thread(run.thread_id)?.project_id;

        self.validator
            .validate(&intent.kind, &intent.payload)
            .map_err(EventLogError::SchemaViolation)?;

        let payload_bytes = canonical_json_bytes(&intent.payload)
            .map_err(|err| EventLogError::SchemaViolation(err.to_string()))?;
        let added_bytes = payload_bytes.len() as u64;

        let mut attempt = 0_u32;
        let (event, metrics) = loop {
            let tx = match self.store.begin_run_write(intent.run_id) {
                Ok(tx) => tx,
                Err(StoreError::WriteContended(reason)) => {
                    attempt += 1;
                    if attempt > self.config.write_retry_budget {
                        return Err(EventLogError::WriteContended(reason));
                    }
                    warn!(run_id = %intent.run_id, attempt, "eventlog write contended, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let current_metrics = tx.current_metrics();
            if let Err(quota_err) =
                QuotaGuard::check(&current_metrics, added_bytes, self.config.quota_limits)
            {
                drop(tx);
                if !is_system_followup
                    && quota_err.scope == crate::runtime::quota::QuotaScope::BytesPerRun
                {
                    self.append_best_effort_audit(intent.run_id, &quota_err);
                }
                return Err(quota_err.into());
            }

            let seq = tx.current_seq() + 1;
            let ts = intent.ts.unwrap_or_else(|| self.clock.now());
            let event_id = intent
                .event_id
                .unwrap_or_else(|| EventId::from(self.id_gen.generate()));

            let mut next_metrics = current_metrics;
            next_metrics.event_count += 1;
            match intent.actor {
                Actor::User => next_metrics.bytes_in += added_bytes,
                _ => next_metrics.bytes_out += added_bytes,
            }
            if intent.kind == "tool_call" {
                next_metrics.tool_calls += 1;
            }
            if intent.kind == "tool_error" {
                next_metrics.tool_errors += 1;
            }
            if intent.kind == "artifact_ref" {
                next_metrics.artifacts_count += 1;
            }
            if is_run_terminal_kind(&intent.kind, &intent.payload) && next_metrics.completed_at.is_none()
            {
                next_metrics.completed_at = Some(ts);
                next_metrics.duration_ms = Some(ts.as_millis().saturating_sub(run.created_at.as_millis()));
            }

            let row = Event {
                event_id,
                run_id: intent.run_id,
                thread_id: run.thread_id,
                project_id,
                seq,
                ts,
                kind: intent.kind.clone(),
                payload: intent.payload.clone(),
                parent_event_id: intent.parent_event_id,
                correlation_id: intent.correlation_id,
                actor: intent.actor,
                privacy: intent.privacy,
                pins: intent.pins.clone(),
            };

            match tx.commit(row, next_metrics.clone()) {
                Ok(committed) => break (committed, next_metrics),
                Err(StoreError::WriteContended(reason)) => {
                    attempt += 1;
                    if attempt > self.config.write_retry_budget {
                        return Err(EventLogError::WriteContended(reason));
                    }
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!(run_id = %event.run_id, seq = event.seq, kind = %event.kind, "event committed");

        self.apply_post_commit_side_effects(&event)?;

        if !is_system_followup {
            self.maybe_emit_metrics_computed(&event, &metrics)?;
        }

        self.observer.on_event_committed(&event);

        Ok(event)
    }

    /// Best-effort `quota_exceeded` audit event, per §4.2. Any failure here
    /// is logged and swallowed, never propagated to the caller.
    fn append_best_effort_audit(&self, run_id: crate::core::identifiers::RunId, quota_err: &QuotaExceeded) {
        let payload = serde_json::json!({
            "scope": quota_err.scope.as_str(),
            "limit": quota_err.limit,
            "observed": quota_err.observed,
        });
        let intent = EventIntent {
            run_id,
            kind: "quota_exceeded".to_string(),
            payload,
            actor: Actor::System,
            parent_event_id: None,
            correlation_id: None,
            privacy: crate::core::model::Privacy::Standard,
            pins: crate::core::model::Pins::default(),
            event_id: None,
            ts: None,
        };
        if let Err(err) = self.append_inner(intent, true) {
            warn!(run_id = %run_id, error = %err, "quota_exceeded audit write failed, swallowing");
        }
    }

    /// Conditionally emits the `metrics_computed` follow-up event, per §4.1
    /// step 4. Always allowed once past the event-count ceiling, per the
    /// resolved Open Question (see `DESIGN.md`).
    fn maybe_emit_metrics_computed(
        &self,
        event: &Event,
        metrics: &RunMetrics,
    ) -> Result<(), EventLogError> {
        let is_trigger = event.kind == "workflow_run_completed" || event.kind == "run_status";
        if !is_trigger {
            return Ok(());
        }
        let payload = serde_json::to_value(metrics)
            .unwrap_or_else(|_| serde_json::json!({ "error": "metrics_serialization_failed" }));
        let intent = EventIntent {
            run_id: event.run_id,
            kind: "metrics_computed".to_string(),
            payload,
            actor: Actor::System,
            parent_event_id: Some(event.event_id),
            correlation_id: None,
            privacy: crate::core::model::Privacy::Standard,
            pins: event.pins.clone(),
            event_id: None,
            ts: None,
        };
        match self.append_inner(intent, true) {
            Ok(_) => Ok(()),
            Err(EventLogError::QuotaExceeded(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Artifact link, tool correlation, tool metrics, and provenance
    /// invalidation side effects that only make sense post-commit.
    fn apply_post_commit_side_effects(&self, event: &Event) -> Result<(), EventLogError> {
        if event.kind == "artifact_ref" {
            if let Some(artifact_id) = event
                .payload
                .get("artifact_id")
                .and_then(Value::as_str)
                .and_then(|raw| crate::core::identifiers::ArtifactId::parse(raw).ok())
            {
                let link = ArtifactLink {
                    run_id: event.run_id,
                    event_id: event.event_id,
                    artifact_id,
                    source_event_id: event.parent_event_id,
                    correlation_id: event.correlation_id,
                    tool_id: event
                        .payload
                        .get("tool_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    purpose: event
                        .payload
                        .get("purpose")
                        .and_then(Value::as_str)
                        .unwrap_or("output")
                        .to_string(),
                };
                self.store.link_artifact(link)?;
            }
        }

        if let Some(correlation_id) = event.correlation_id {
            match event.kind.as_str() {
                "tool_call" => {
                    self.store.put_tool_correlation(
                        event.run_id,
                        correlation_id,
                        ToolCorrelation {
                            tool_call_event_id: Some(event.event_id),
                            tool_outcome_event_id: None,
                        },
                    )?;
                }
                "tool_result" | "tool_error" => {
                    let mut correlation = self
                        .store
                        .get_tool_correlation(event.run_id, correlation_id)?
                        .unwrap_or_default();
                    correlation.tool_outcome_event_id = Some(event.event_id);
                    self.store
                        .put_tool_correlation(event.run_id, correlation_id, correlation)?;
                }
                _ => {}
            }
        }

        if is_provenance_affecting(&event.kind) {
            self.store.invalidate_provenance_cache(event.run_id)?;
        }

        Ok(())
    }
}

/// Returns true if this event marks its run as terminal, per §4.1 step 3:
/// `workflow_run_completed`, or `run_status` with a terminal payload status.
fn is_run_terminal_kind(kind: &str, payload: &Value) -> bool {
    if kind == "workflow_run_completed" {
        return true;
    }
    if kind != "run_status" {
        return false;
    }
    payload
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| RUN_STATUS_TERMINAL_VALUES.contains(&status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_terminal_detects_workflow_completion() {
        assert!(is_run_terminal_kind("workflow_run_completed", &Value::Null));
    }

    #[test]
    fn run_terminal_detects_terminal_run_status() {
        let payload = serde_json::json!({ "status": "failed" });
        assert!(is_run_terminal_kind("run_status", &payload));
    }

    #[test]
    fn run_terminal_ignores_non_terminal_status() {
        let payload = serde_json::json!({ "status": "running" });
        assert!(!is_run_terminal_kind("run_status", &payload));
    }

    #[test]
    fn run_terminal_ignores_unrelated_kinds() {
        assert!(!is_run_terminal_kind("user_message", &Value::Null));
    }
}
