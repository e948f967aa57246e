// runlog-config/src/lib.rs
// ============================================================================
// Module: Run Event Substrate Config Library
// Description: Canonical config model, validation, and artifact generation.
// Purpose: Single source of truth for the operator-facing environment/TOML
//          configuration surface.
// Dependencies: runlog-contract, serde, toml
// ============================================================================

//! ## Overview
//! `runlog-config` defines the canonical configuration model for the Run
//! Event Substrate: an environment- and TOML-sourced struct, fail-closed
//! validation, and deterministic generators for its JSON schema and
//! operator-facing docs table.

pub mod config;
pub mod docs;
pub mod schema;

pub use config::ConfigError;
pub use config::RunlogConfig;
pub use docs::config_docs_markdown;
pub use schema::config_schema;
