// runlog-server/src/notify.rs
// ============================================================================
// Module: Notification Fan-out
// Description: Resolves recipients from Store scope grants, then routes and
//              dispatches a committed event or activity row.
// Purpose: Bridge NotificationRouter (which needs recipient lists handed to
//          it) to Store (which only knows ScopeGrant rows), then hand the
//          persisted Notification to CompositeBroker for delivery.
// Dependencies: runlog-broker, runlog-core
// ============================================================================

//! ## Overview
//! [`Store`] has no project-membership table, only per-project
//! [`ScopeGrant`] rows. [`NotificationService`] treats a grant's
//! `scope == "owner"` as project ownership and the deduplicated set of
//! every grant's `granted_by` as project membership, then feeds those
//! lists into [`NotificationRouter`] exactly as spec section 4.7 expects
//! the caller to supply them.

use std::sync::Arc;

use runlog_broker::CompositeBroker;
use runlog_broker::DispatchTarget;
use runlog_core::Activity;
use runlog_core::Event;
use runlog_core::NotificationRouter;
use runlog_core::ProjectId;
use runlog_core::Run;
use runlog_core::Store;
use runlog_core::UserId;
use tracing::warn;

/// Resolves recipients from scope grants, routes, then dispatches.
pub struct NotificationService {
    store: Arc<dyn Store>,
    router: NotificationRouter,
    broker: Arc<CompositeBroker>,
}

impl NotificationService {
    /// Builds a notification service over `store`, `router`, and `broker`.
    #[must_use]
    pub const fn new(store: Arc<dyn Store>, router: NotificationRouter, broker: Arc<CompositeBroker>) -> Self {
        Self { store, router, broker }
    }

    fn project_owners(&self, project_id: ProjectId) -> Vec<UserId> {
        match self.store.list_scope_grants(project_id) {
            Ok(grants) => grants
                .into_iter()
                .filter(|grant| grant.scope == "owner")
                .map(|grant| grant.granted_by)
                .collect(),
            Err(err) => {
                warn!(%project_id, error = %err, "failed to resolve project owners");
                Vec::new()
            }
        }
    }

    fn project_members(&self, project_id: ProjectId) -> Vec<UserId> {
        match self.store.list_scope_grants(project_id) {
            Ok(grants) => {
                let mut members: Vec<UserId> = grants.into_iter().map(|grant| grant.granted_by).collect();
                members.sort();
                members.dedup();
                members
            }
            Err(err) => {
                warn!(%project_id, error = %err, "failed to resolve project members");
                Vec::new()
            }
        }
    }

    /// Routes and dispatches a committed activity row, per section 4.7.
    pub fn notify_activity(&self, activity: &Activity, actor_user_id: UserId) {
        let members = self.project_members(activity.project_id);
        if let Err(err) = self.router.route_activity(activity, &members, actor_user_id) {
            warn!(project_id = %activity.project_id, error = %err, "activity routing failed");
            return;
        }
        self.dispatch_to(&members, Some(activity.project_id), None);
    }

    /// Routes and dispatches a committed run event, per section 4.7.
    ///
    /// `run` supplies the creator and the event's project scope; `actor`
    /// is the event's actor user id, when the actor is a human.
    pub fn notify_event(&self, event: &Event, run: &Run, actor: Option<UserId>) {
        let Some(project_id) = event.project_id else {
            return;
        };
        let owners = self.project_owners(project_id);
        if let Err(err) = self.router.route_event(event, run.created_by_user_id, &owners, actor) {
            warn!(run_id = %event.run_id, error = %err, "event routing failed");
            return;
        }
        let mut recipients = owners;
        recipients.push(run.created_by_user_id);
        recipients.sort();
        recipients.dedup();
        self.dispatch_to(&recipients, Some(project_id), Some(event.run_id));
    }

    /// Looks up the freshest notification the router just persisted for
    /// each candidate recipient and hands it to the broker. `route_event`/
    /// `route_activity` already wrote the rows; this only recovers them
    /// for delivery, since neither method returns what it wrote.
    fn dispatch_to(&self, candidates: &[UserId], project_id: Option<ProjectId>, run_id: Option<runlog_core::RunId>) {
        for &user_id in candidates {
            let notifications = match self.store.list_notifications(user_id, true, 0) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(%user_id, error = %err, "failed to read back notification for dispatch");
                    continue;
                }
            };
            let Some(notification) = notifications
                .into_iter()
                .filter(|row| row.project_id == project_id && row.run_id == run_id)
                .max_by_key(|row| row.notification_seq)
            else {
                continue;
            };
            let target = DispatchTarget { user_id, project_id, run_id };
            let receipts = self.broker.dispatch(target, &notification);
            if receipts.is_empty() {
                warn!(%user_id, "notification dispatch failed on every sink");
            }
        }
    }
}
