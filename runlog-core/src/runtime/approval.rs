// runlog-core/src/runtime/approval.rs
// ============================================================================
// Module: Approval Ledger
// Description: Pending/approved/denied decisions keyed by correlation.
// Purpose: Resume or terminate a policy-gated tool call once a human
//          decides, per §4.5.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! An [`Approval`] is created `pending` by [`crate::runtime::tool_executor::ToolExecutor`]
//! when [`crate::runtime::policy::PolicyEngine`] returns `approval_required`.
//! This module owns the `pending -> approved` / `pending -> denied`
//! transition; it does not itself execute the tool — the caller re-invokes
//! `ToolExecutor` with the frozen inputs after `approve()`.

use std::sync::Arc;

use thiserror::Error;

use crate::core::identifiers::ApprovalId;
use crate::core::identifiers::CorrelationId;
use crate::core::identifiers::EventId;
use crate::core::identifiers::RunId;
use crate::core::model::Approval;
use crate::core::model::ApprovalStatus;
use crate::core::time::IdGenerator;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

/// Errors raised by the approval ledger.
#[derive(Debug, Error)]
pub enum ApprovalLedgerError {
    /// The approval does not exist.
    #[error("approval_not_found: {0}")]
    NotFound(String),
    /// The approval was not `pending` and cannot be transitioned again.
    #[error("approval already decided: {0}")]
    AlreadyDecided(String),
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApprovalLedgerError {
    /// Stable error-kind identifier, matching spec §7.
    #[must_use]
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "approval_not_found",
            Self::AlreadyDecided(_) => "approval_denied",
            Self::Store(_) => "store_error",
        }
    }
}

/// Pending/approved/denied decisions keyed by correlation.
pub struct ApprovalLedger {
    store: Arc<dyn Store>,
    id_gen: Arc<dyn IdGenerator>,
}

impl ApprovalLedger {
    /// Creates a new ApprovalLedger.
    #[must_use]
    pub const fn new(store: Arc<dyn Store>, id_gen: Arc<dyn IdGenerator>) -> Self {
        Self { store, id_gen }
    }

    /// Creates a pending approval for a gated tool call.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalLedgerError`] on store failure.
    pub fn create_pending(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
        tool_id: &str,
        tool_version: &str,
        inputs: serde_json::Value,
        tool_call_event_id: EventId,
    ) -> Result<Approval, ApprovalLedgerError> {
        let approval = Approval {
            approval_id: ApprovalId::from(self.id_gen.generate()),
            run_id,
            correlation_id,
            tool_id: tool_id.to_string(),
            tool_version: tool_version.to_string(),
            inputs,
            status: ApprovalStatus::Pending,
            tool_call_event_id,
        };
        Ok(self.store.create_approval(approval)?)
    }

    /// Lists approvals for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalLedgerError`] on store failure.
    pub fn list_for_run(&self, run_id: RunId) -> Result<Vec<Approval>, ApprovalLedgerError> {
        Ok(self.store.list_approvals(run_id)?)
    }

    /// Transitions a pending approval to `approved`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalLedgerError::NotFound`] if the approval is absent,
    /// or [`ApprovalLedgerError::AlreadyDecided`] if it is not `pending`.
    pub fn approve(&self, approval_id: ApprovalId) -> Result<Approval, ApprovalLedgerError> {
        self.transition(approval_id, ApprovalStatus::Approved)
    }

    /// Transitions a pending approval to `denied`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalLedgerError::NotFound`] if the approval is absent,
    /// or [`ApprovalLedgerError::AlreadyDecided`] if it is not `pending`.
    pub fn deny(&self, approval_id: ApprovalId) -> Result<Approval, ApprovalLedgerError> {
        self.transition(approval_id, ApprovalStatus::Denied)
    }

    fn transition(
        &self,
        approval_id: ApprovalId,
        to: ApprovalStatus,
    ) -> Result<Approval, ApprovalLedgerError> {
        let current = self
            .store
            .get_approval(approval_id)
            .map_err(|_| ApprovalLedgerError::NotFound(approval_id.to_string()))?;
        if current.status != ApprovalStatus::Pending {
            return Err(ApprovalLedgerError::AlreadyDecided(approval_id.to_string()));
        }
        Ok(self.store.set_approval_status(approval_id, to)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_is_stable_per_variant() {
        let not_found = ApprovalLedgerError::NotFound("x".to_string());
        assert_eq!(not_found.error_kind(), "approval_not_found");
    }
}
