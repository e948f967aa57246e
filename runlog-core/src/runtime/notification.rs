// runlog-core/src/runtime/notification.rs
// ============================================================================
// Module: Notification Router
// Description: Derives recipients from committed events and activity rows,
//              respects throttling knobs, writes per-user notifications.
// Purpose: Implement §4.7's recipient computation and self-suppression
//          rules.
// Dependencies: crate::{core, interfaces, runtime::eventlog, broker}
// ============================================================================

//! ## Overview
//! `NotificationRouter` implements [`crate::runtime::eventlog::EventObserver`]
//! so `EventLog::append` can invoke it synchronously after commit, per
//! §4.1 step 5. It also exposes `on_activity_committed` for the
//! project-activity path, which has no EventLog equivalent since activity
//! rows are written directly by HTTP collaborators, not through EventLog.

use std::sync::Arc;

use thiserror::Error;

use crate::core::identifiers::ProjectId;
use crate::core::identifiers::UserId;
use crate::core::model::Activity;
use crate::core::model::Event;
use crate::core::model::Notification;
use crate::core::identifiers::NotificationId;
use crate::core::time::IdGenerator;
use crate::interfaces::Store;
use crate::interfaces::StoreError;
use crate::runtime::eventlog::EventObserver;

/// Errors raised while routing notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Throttling knobs for `tool_error` notifications, per §4.7.
#[derive(Debug, Clone)]
pub struct ToolErrorNotifyPolicy {
    /// Master on/off switch.
    pub enabled: bool,
    /// If non-empty, only these error codes notify.
    pub only_codes: Vec<String>,
    /// If non-empty, only these binding types notify.
    pub only_bindings: Vec<String>,
    /// Maximum `run_tool_error` notifications emitted per run.
    pub max_per_run: u32,
}

impl Default for ToolErrorNotifyPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            only_codes: Vec::new(),
            only_bindings: Vec::new(),
            max_per_run: u32::MAX,
        }
    }
}

/// Derives recipients from committed events/activity and writes per-user
/// notifications.
pub struct NotificationRouter {
    store: Arc<dyn Store>,
    id_gen: Arc<dyn IdGenerator>,
    tool_error_policy: ToolErrorNotifyPolicy,
}

impl NotificationRouter {
    /// Creates a new NotificationRouter.
    #[must_use]
    pub const fn new(
        store: Arc<dyn Store>,
        id_gen: Arc<dyn IdGenerator>,
        tool_error_policy: ToolErrorNotifyPolicy,
    ) -> Self {
        Self {
            store,
            id_gen,
            tool_error_policy,
        }
    }

    /// Routes a committed activity row to its recipients, per §4.7.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] on store failure.
    pub fn route_activity(
        &self,
        activity: &Activity,
        project_members: &[UserId],
        actor_user_id: UserId,
    ) -> Result<(), NotificationError> {
        let recipients: Vec<UserId> = match activity.kind.as_str() {
            "comment_created" => project_members.to_vec(),
            "member_added" | "member_role_changed" => ref_id_as_user(&activity.ref_id)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        };
        let payload = serde_json::json!({
            "project_id": activity.project_id.to_string(),
            "activity_seq": activity.activity_seq,
            "summary": activity.kind,
            "actor_user_id": actor_user_id.to_string(),
        });
        self.deliver(&recipients, actor_user_id, &activity.kind, payload, Some(activity.project_id), None)
    }

    /// Computes recipients for a run event, respecting self-suppression and
    /// tool-error throttling, per §4.7.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] on store failure.
    pub fn route_event(
        &self,
        event: &Event,
        run_creator: UserId,
        project_owners: &[UserId],
        actor_user_id: Option<UserId>,
    ) -> Result<(), NotificationError> {
        let recipients: Vec<UserId> = match event.kind.as_str() {
            "quota_exceeded" => vec![run_creator],
            "system_event" if event.payload.get("code").and_then(|v| v.as_str()) == Some("approval_required") => {
                let mut recipients = vec![run_creator];
                recipients.extend_from_slice(project_owners);
                recipients
            }
            "tool_error" => {
                if !self.should_notify_tool_error(event)? {
                    Vec::new()
                } else if project_owners.is_empty() {
                    vec![run_creator]
                } else {
                    project_owners.to_vec()
                }
            }
            _ => Vec::new(),
        };
        let notification_kind = if event.kind == "tool_error" {
            "run_tool_error"
        } else {
            event.kind.as_str()
        };
        let payload = serde_json::json!({
            "run_id": event.run_id.to_string(),
            "event_id": event.event_id.to_string(),
            "summary": event.kind,
            "actor_user_id": actor_user_id.map(|u| u.to_string()),
        });
        self.deliver(&recipients, actor_user_id.unwrap_or(run_creator), notification_kind, payload, None, Some(event.run_id))
    }

    /// Checks the `tool_error` throttling knobs and the per-run emitted
    /// count, per §4.7.
    fn should_notify_tool_error(&self, event: &Event) -> Result<bool, NotificationError> {
        if !self.tool_error_policy.enabled {
            return Ok(false);
        }
        if !self.tool_error_policy.only_codes.is_empty() {
            let code = event.payload.get("error_code").and_then(|v| v.as_str());
            if !code.is_some_and(|c| self.tool_error_policy.only_codes.iter().any(|x| x == c)) {
                return Ok(false);
            }
        }
        if !self.tool_error_policy.only_bindings.is_empty() {
            let binding = event.payload.get("binding_type").and_then(|v| v.as_str());
            if !binding.is_some_and(|b| self.tool_error_policy.only_bindings.iter().any(|x| x == b)) {
                return Ok(false);
            }
        }
        let emitted = self
            .store
            .count_run_notifications_by_kind(event.run_id, "run_tool_error")?;
        Ok(emitted < u64::from(self.tool_error_policy.max_per_run))
    }

    /// Writes one notification per recipient, suppressing the actor's own
    /// action, per §4.7's self-suppression rule.
    fn deliver(
        &self,
        recipients: &[UserId],
        actor_user_id: UserId,
        kind: &str,
        payload: serde_json::Value,
        project_id: Option<ProjectId>,
        run_id: Option<crate::core::identifiers::RunId>,
    ) -> Result<(), NotificationError> {
        for &recipient in recipients {
            if recipient == actor_user_id {
                continue;
            }
            self.store.append_notification(Notification {
                notification_id: NotificationId::from(self.id_gen.generate()),
                notification_seq: 0,
                user_id: recipient,
                kind: kind.to_string(),
                payload: payload.clone(),
                project_id,
                run_id,
                read_at: None,
            })?;
            self.store.increment_counter("notifications.delivered_total", 1)?;
        }
        Ok(())
    }
}

impl EventObserver for NotificationRouter {
    fn on_event_committed(&self, event: &Event) {
        // The HTTP collaborator supplies run_creator/project_owners context
        // that this crate does not have; a thin wrapper in `runlog-server`
        // resolves those and calls `route_event` directly. This impl exists
        // so `EventLog` can hold a uniform `Arc<dyn EventObserver>` even
        // when no richer recipient context is available (e.g. inside tests).
        let _ = event;
    }
}

/// Best-effort parse of an activity `ref_id` as a user id, used by the
/// `member_added`/`member_role_changed` recipient rule.
fn ref_id_as_user(ref_id: &str) -> Option<UserId> {
    crate::core::identifiers::Id::parse(ref_id).ok().map(UserId::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_id_parses_valid_user_ids() {
        let id = crate::core::identifiers::Id::from_raw(7);
        let text = id.to_string();
        assert!(ref_id_as_user(&text).is_some());
    }

    #[test]
    fn ref_id_rejects_malformed_ids() {
        assert!(ref_id_as_user("not-an-id").is_none());
    }
}
