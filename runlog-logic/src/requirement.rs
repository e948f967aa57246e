// runlog-logic/src/requirement.rs
// ============================================================================
// Module: Scope Requirements
// Description: Named tri-state predicates combined by conjunction.
// Purpose: Give PolicyEngine a small, testable vocabulary for "all of these
//          conditions must hold" without hand-rolled if/else chains.
// Dependencies: crate::tristate
// ============================================================================

//! ## Overview
//! A [`Requirement`] names a single tri-state fact ("scope X is granted",
//! "a prior approval exists"). [`evaluate_all`] folds a set of requirements
//! with Kleene AND and reports which ones were not definitively true, so
//! callers can build a human-readable deny reason.

use crate::tristate::KleeneLogic;
use crate::tristate::TriLogic;
use crate::tristate::TriState;

/// A single named tri-state fact.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Human-readable name used in deny reasons (e.g. `"scope:read_web"`).
    pub name: String,
    /// The fact's truth value.
    pub value: TriState,
}

impl Requirement {
    /// Creates a new requirement.
    #[must_use]
    pub fn new(name: impl Into<String>, value: TriState) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Outcome of evaluating a set of requirements.
#[derive(Debug, Clone)]
pub struct RequirementOutcome {
    /// The conjunction of all requirement values.
    pub verdict: TriState,
    /// Names of requirements that evaluated to `False`, in input order.
    pub failed: Vec<String>,
    /// Names of requirements that evaluated to `Unknown`, in input order.
    pub unknown: Vec<String>,
}

/// Evaluates a list of requirements with Kleene AND.
///
/// Unlike [`crate::tristate::all_true`], this does not short-circuit: every
/// requirement is inspected so that `failed`/`unknown` are complete, which
/// PolicyEngine needs to build its `deny(reason="missing scope: <name>")`
/// message deterministically (first missing scope, not just "a" scope).
#[must_use]
pub fn evaluate_all(requirements: &[Requirement]) -> RequirementOutcome {
    let logic = KleeneLogic;
    let mut verdict = TriState::True;
    let mut failed = Vec::new();
    let mut unknown = Vec::new();
    for req in requirements {
        verdict = logic.and(verdict, req.value);
        match req.value {
            TriState::False => failed.push(req.name.clone()),
            TriState::Unknown => unknown.push(req.name.clone()),
            TriState::True => {}
        }
    }
    RequirementOutcome {
        verdict,
        failed,
        unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_scope_wins_over_pending_approval() {
        let reqs = vec![
            Requirement::new("scope:read_web", TriState::False),
            Requirement::new("approval", TriState::Unknown),
        ];
        let outcome = evaluate_all(&reqs);
        assert_eq!(outcome.verdict, TriState::False);
        assert_eq!(outcome.failed, vec!["scope:read_web".to_string()]);
    }

    #[test]
    fn all_granted_and_no_pending_approval_allows() {
        let reqs = vec![
            Requirement::new("scope:read_web", TriState::True),
            Requirement::new("approval", TriState::True),
        ];
        let outcome = evaluate_all(&reqs);
        assert_eq!(outcome.verdict, TriState::True);
        assert!(outcome.failed.is_empty());
        assert!(outcome.unknown.is_empty());
    }

    #[test]
    fn pending_approval_alone_is_unknown() {
        let reqs = vec![
            Requirement::new("scope:read_web", TriState::True),
            Requirement::new("approval", TriState::Unknown),
        ];
        let outcome = evaluate_all(&reqs);
        assert_eq!(outcome.verdict, TriState::Unknown);
        assert_eq!(outcome.unknown, vec!["approval".to_string()]);
    }

    #[test]
    fn no_requirements_allows() {
        let outcome = evaluate_all(&[]);
        assert_eq!(outcome.verdict, TriState::True);
    }
}
