// runlog-logic/src/tristate.rs
// ============================================================================
// Module: Tri-State Logic
// Description: Tri-state truth values and configurable logic tables.
// Purpose: Provide deterministic tri-state evaluation for policy gates.
// Dependencies: serde::{Deserialize, Serialize}
// ============================================================================

//! ## Overview
//! Defines tri-state truth values (`true`/`false`/`unknown`) and logic tables
//! that can be swapped to match domain needs. The default logic is strong
//! Kleene, which fails closed (toward `False`) whenever any operand is
//! definitively false, and otherwise propagates `Unknown` when evidence is
//! incomplete.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Tri-State Value
// ============================================================================

/// Tri-state truth value for policy evaluation.
///
/// # Invariants
/// - Represents a closed set of truth values: true, false, or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriState {
    /// Definitively true (maps to `allow`).
    True,
    /// Definitively false (maps to `deny`).
    False,
    /// Indeterminate pending a side channel (maps to `approval_required`).
    Unknown,
}

impl TriState {
    /// Returns true if the value is `True`.
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Returns true if the value is `False`.
    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::False)
    }

    /// Returns true if the value is `Unknown`.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

// ============================================================================
// SECTION: Logic Tables
// ============================================================================

/// Tri-state logic tables for composable evaluation.
pub trait TriLogic {
    /// Logical AND for tri-state values.
    fn and(&self, lhs: TriState, rhs: TriState) -> TriState;

    /// Logical OR for tri-state values.
    fn or(&self, lhs: TriState, rhs: TriState) -> TriState;
}

/// Strong Kleene logic (default).
///
/// # Invariants
/// - Zero-sized marker type; carries no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct KleeneLogic;

impl TriLogic for KleeneLogic {
    fn and(&self, lhs: TriState, rhs: TriState) -> TriState {
        match (lhs, rhs) {
            (TriState::False, _) | (_, TriState::False) => TriState::False,
            (TriState::True, TriState::True) => TriState::True,
            _ => TriState::Unknown,
        }
    }

    fn or(&self, lhs: TriState, rhs: TriState) -> TriState {
        match (lhs, rhs) {
            (TriState::True, _) | (_, TriState::True) => TriState::True,
            (TriState::False, TriState::False) => TriState::False,
            _ => TriState::Unknown,
        }
    }
}

/// Folds an iterator of tri-state values with Kleene AND, short-circuiting
/// as soon as a `False` is observed.
///
/// An empty iterator evaluates to `True` (vacuous conjunction), matching
/// the "no required scopes" case in policy evaluation.
pub fn all_true<I: IntoIterator<Item = TriState>>(values: I) -> TriState {
    let logic = KleeneLogic;
    let mut acc = TriState::True;
    for v in values {
        acc = logic.and(acc, v);
        if acc.is_false() {
            return TriState::False;
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_is_fail_closed_on_false() {
        let logic = KleeneLogic;
        assert_eq!(
            logic.and(TriState::False, TriState::Unknown),
            TriState::False
        );
        assert_eq!(
            logic.and(TriState::Unknown, TriState::False),
            TriState::False
        );
    }

    #[test]
    fn and_propagates_unknown_without_false() {
        let logic = KleeneLogic;
        assert_eq!(
            logic.and(TriState::True, TriState::Unknown),
            TriState::Unknown
        );
    }

    #[test]
    fn all_true_short_circuits_on_false() {
        let values = vec![TriState::True, TriState::False, TriState::Unknown];
        assert_eq!(all_true(values), TriState::False);
    }

    #[test]
    fn all_true_of_empty_is_true() {
        assert_eq!(all_true(Vec::new()), TriState::True);
    }

    #[test]
    fn all_true_propagates_unknown() {
        let values = vec![TriState::True, TriState::Unknown];
        assert_eq!(all_true(values), TriState::Unknown);
    }
}
