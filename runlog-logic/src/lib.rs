// runlog-logic/src/lib.rs
// ============================================================================
// Module: Run Event Substrate Tri-State Logic
// Description: Public API surface for the tri-state policy logic crate.
// Purpose: Expose TriState, logic tables, and requirement evaluation helpers.
// Dependencies: crate::{tristate, requirement}
// ============================================================================

//! ## Overview
//! A small, backend-agnostic tri-state boolean algebra. PolicyEngine uses it
//! to fold "is every required scope granted" and "is there a pending
//! approval gate" into a single `allow | deny | approval_required` verdict
//! without hand-rolled conditionals.

pub mod requirement;
pub mod tristate;

pub use requirement::Requirement;
pub use requirement::RequirementOutcome;
pub use requirement::evaluate_all;
pub use tristate::KleeneLogic;
pub use tristate::TriLogic;
pub use tristate::TriState;
pub use tristate::all_true;
