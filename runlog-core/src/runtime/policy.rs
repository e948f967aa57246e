// runlog-core/src/runtime/policy.rs
// ============================================================================
// Module: Policy Engine
// Description: Evaluates a tool invocation against scope grants and risk
//              flags, yielding allow | deny | approval_required.
// Purpose: Fold scope and approval checks into one tri-state verdict using
//          runlog_logic's Kleene AND instead of a hand-rolled if/else chain.
// Dependencies: runlog_logic, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The three decision rules map onto [`runlog_logic::TriState`]:
//! `allow = True`, `deny = False`, `approval_required = Unknown`. A missing
//! scope is modelled as a `False` requirement and forces denial even when
//! the approval-gate requirement is `Unknown`, since Kleene AND is
//! fail-closed on any `False` operand.

use std::sync::Arc;

use runlog_logic::Requirement;
use runlog_logic::TriState;
use runlog_logic::evaluate_all;
use thiserror::Error;

use crate::core::identifiers::RunId;
use crate::core::model::RiskProfile;
use crate::interfaces::Store;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while evaluating policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// The three-way policy verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Allowed to proceed.
    Allow,
    /// Denied, with a human-readable reason.
    Deny {
        /// Why the invocation was denied.
        reason: String,
    },
    /// Blocked pending a human approval.
    ApprovalRequired,
}

impl From<TriState> for PolicyDecisionKind {
    fn from(value: TriState) -> Self {
        match value {
            TriState::True => Self::Allow,
            TriState::False => Self::Deny,
            TriState::Unknown => Self::ApprovalRequired,
        }
    }
}

/// Verdict without the deny reason, used internally to match on
/// [`TriState`] before re-attaching context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PolicyDecisionKind {
    Allow,
    Deny,
    ApprovalRequired,
}

// ============================================================================
// SECTION: Policy Engine
// ============================================================================

/// Evaluates tool invocations against project scope grants and risk flags.
pub struct PolicyEngine {
    store: Arc<dyn Store>,
}

impl PolicyEngine {
    /// Creates a new PolicyEngine.
    #[must_use]
    pub const fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Evaluates a `(run, manifest risk, remote-binding flags)` tuple, per
    /// §4.3.
    ///
    /// `is_remote_binding` and `allow_remote` implement the remote-call
    /// addendum: remote bindings additionally require the `mcp_call` scope
    /// and, for non-loopback endpoints, the `allow_remote` operational flag.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] on store failure.
    pub fn evaluate(
        &self,
        run_id: RunId,
        project_id: crate::core::identifiers::ProjectId,
        tool_id: &str,
        tool_version: &str,
        risk: &RiskProfile,
        is_remote_binding: bool,
        is_loopback: bool,
        allow_remote: bool,
    ) -> Result<PolicyDecision, PolicyError> {
        let grants = self.store.list_scope_grants(project_id)?;
        let granted: std::collections::HashSet<&str> =
            grants.iter().map(|g| g.scope.as_str()).collect();

        let mut requirements: Vec<Requirement> = risk
            .scopes_required
            .iter()
            .map(|scope| Requirement::new(format!("scope:{scope}"), granted.contains(scope.as_str()).into()))
            .collect();

        if is_remote_binding {
            requirements.push(Requirement::new(
                "scope:mcp_call",
                granted.contains("mcp_call").into(),
            ));
            if !is_loopback {
                requirements.push(Requirement::new("flag:allow_remote", allow_remote.into()));
            }
        }

        let scope_verdict = evaluate_all(&requirements);
        if scope_verdict.verdict.is_false() {
            let missing = scope_verdict
                .failed
                .first()
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());
            return Ok(PolicyDecision::Deny {
                reason: format!("missing scope: {missing}"),
            });
        }

        let needs_approval = risk.external_write || risk.network_egress;
        let approval_value = if needs_approval {
            let has_prior_approval = self
                .store
                .find_latest_approval(run_id, tool_id, tool_version)?
                .is_some_and(|a| a.status == crate::core::model::ApprovalStatus::Approved);
            // A missing approval is Unknown (approval_required), never False:
            // rule 2 never denies outright for this condition.
            if has_prior_approval { TriState::True } else { TriState::Unknown }
        } else {
            TriState::True
        };
        let approval_requirement = Requirement::new("approval", approval_value);

        let final_verdict = {
            use runlog_logic::TriLogic;
            runlog_logic::KleeneLogic.and(scope_verdict.verdict, approval_requirement.value)
        };

        Ok(match PolicyDecisionKind::from(final_verdict) {
            PolicyDecisionKind::Allow => PolicyDecision::Allow,
            // scope_verdict is already non-False above, and Kleene AND of two
            // non-False operands is never False.
            PolicyDecisionKind::Deny => unreachable!("scope_verdict is non-False here, so the Kleene AND cannot be False"),
            PolicyDecisionKind::ApprovalRequired => PolicyDecision::ApprovalRequired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_kind_maps_tristate_correctly() {
        assert_eq!(PolicyDecisionKind::from(TriState::True), PolicyDecisionKind::Allow);
        assert_eq!(PolicyDecisionKind::from(TriState::False), PolicyDecisionKind::Deny);
        assert_eq!(
            PolicyDecisionKind::from(TriState::Unknown),
            PolicyDecisionKind::ApprovalRequired
        );
    }
}
