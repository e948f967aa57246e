// runlog-contract/src/lib.rs
// ============================================================================
// Module: Run Event Substrate Contracts
// Description: Canonical JSON Schema definitions for event-kind payloads,
//              tool manifests, and the system_config snapshot.
// Purpose: Implement the PayloadValidator boundary runlog-core calls before
//          any event is committed.
// Dependencies: runlog_core, jsonschema
// ============================================================================

//! ## Overview
//! `runlog-contract` is the single source of truth for what a payload must
//! look like before it is allowed to become a durable event. [`schemas`]
//! builds the JSON Schema documents; [`ContractRegistry`] compiles them once
//! and implements `runlog_core::runtime::eventlog::PayloadValidator`.

pub mod schemas;

mod registry;

pub use registry::ContractError;
pub use registry::ContractRegistry;
