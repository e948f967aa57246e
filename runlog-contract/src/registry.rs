// runlog-contract/src/registry.rs
// ============================================================================
// Module: Contract Registry
// Description: Compiles every registered schema once and validates payloads
//              against it at the event-append boundary.
// Purpose: Implement `runlog_core::runtime::eventlog::PayloadValidator`.
// Dependencies: runlog-core, jsonschema
// ============================================================================

//! ## Overview
//! [`ContractRegistry::new`] compiles every schema in
//! [`crate::schemas::REGISTERED_KINDS`], plus the tool manifest and
//! `system_config` schemas, into a [`jsonschema::Validator`] up front, so a
//! malformed schema is caught at startup rather than on the first payload
//! that hits it. [`ContractRegistry`] implements
//! `runlog_core::runtime::eventlog::PayloadValidator`, the trait the
//! EventLog calls before any event is written.

use std::collections::BTreeMap;

use jsonschema::Draft;
use jsonschema::Validator;
use runlog_core::PayloadValidator;
use serde_json::Value;
use thiserror::Error;

use crate::schemas;

/// Raised when a registered schema fails to compile.
#[derive(Debug, Error)]
pub enum ContractError {
    /// A schema failed to compile as draft 2020-12.
    #[error("schema for {label} failed to compile: {message}")]
    Compile {
        /// The schema's label (an event kind, `tool_manifest`, or `system_config`).
        label: String,
        /// The compiler's error message.
        message: String,
    },
}

/// Compiles `schema` as draft 2020-12, tagging failures with `label`.
fn compile(label: &str, schema: &Value) -> Result<Validator, ContractError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| ContractError::Compile {
            label: label.to_string(),
            message: err.to_string(),
        })
}

/// Runs `payload` through `validator`, joining every violation into one
/// message.
fn run_validator(validator: &Validator, payload: &Value) -> Result<(), String> {
    let messages: Vec<String> = validator.iter_errors(payload).map(|err| err.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages.join("; "))
    }
}

/// Holds one compiled [`Validator`] per registered event kind, plus the
/// tool manifest and `system_config` validators.
pub struct ContractRegistry {
    /// Compiled validators keyed by event kind.
    kinds: BTreeMap<String, Validator>,
    /// Validator for `runlog_core::core::model::ToolManifest`.
    manifest: Validator,
    /// Validator for the `system_config` operational snapshot.
    system_config: Validator,
}

impl ContractRegistry {
    /// Compiles every registered schema.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError`] if any registered schema fails to compile.
    pub fn new() -> Result<Self, ContractError> {
        let mut kinds = BTreeMap::new();
        for (kind, schema) in schemas::all_kind_schemas() {
            kinds.insert(kind.to_string(), compile(kind, &schema)?);
        }
        let manifest = compile("tool_manifest", &schemas::tool_manifest_schema())?;
        let system_config = compile("system_config", &schemas::system_config_schema())?;
        Ok(Self {
            kinds,
            manifest,
            system_config,
        })
    }

    /// Validates a `ToolManifest` (as JSON) before it is installed into a
    /// tool registry.
    ///
    /// # Errors
    ///
    /// Returns a joined list of schema violations on mismatch.
    pub fn validate_manifest(&self, manifest: &Value) -> Result<(), String> {
        run_validator(&self.manifest, manifest)
    }

    /// Validates an operator-facing `system_config` snapshot.
    ///
    /// # Errors
    ///
    /// Returns a joined list of schema violations on mismatch.
    pub fn validate_system_config(&self, config: &Value) -> Result<(), String> {
        run_validator(&self.system_config, config)
    }
}

impl PayloadValidator for ContractRegistry {
    fn validate(&self, kind: &str, payload: &Value) -> Result<(), String> {
        let Some(validator) = self.kinds.get(kind) else {
            return Err(format!("unregistered event kind: {kind}"));
        };
        run_validator(validator, payload)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::missing_docs_in_private_items,
        clippy::missing_panics_doc,
        missing_docs,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn every_registered_schema_compiles() {
        ContractRegistry::new().expect("all registered schemas compile");
    }

    #[test]
    fn unregistered_kind_fails_closed() {
        let registry = ContractRegistry::new().expect("registry builds");
        let err = registry.validate("not_a_real_kind", &serde_json::json!({})).unwrap_err();
        assert!(err.contains("unregistered"));
    }

    #[test]
    fn valid_tool_call_payload_passes() {
        let registry = ContractRegistry::new().expect("registry builds");
        let payload = serde_json::json!({
            "tool_id": "file.read",
            "version": "1.0.0",
            "inputs": { "path": "a.txt" },
            "binding_type": "inproc_safe",
            "correlation_id": "abc123",
        });
        registry.validate("tool_call", &payload).expect("payload matches schema");
    }

    #[test]
    fn tool_call_missing_field_fails() {
        let registry = ContractRegistry::new().expect("registry builds");
        let payload = serde_json::json!({
            "tool_id": "file.read",
            "version": "1.0.0",
            "inputs": {},
        });
        let err = registry.validate("tool_call", &payload).unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn user_message_allows_extra_fields() {
        let registry = ContractRegistry::new().expect("registry builds");
        let payload = serde_json::json!({ "text": "hi", "attachments": [], "trace_id": "xyz" });
        registry.validate("user_message", &payload).expect("additional properties are permitted");
    }

    #[test]
    fn valid_system_config_passes() {
        let registry = ContractRegistry::new().expect("registry builds");
        let config = serde_json::json!({
            "max_events_per_run": 10_000,
            "max_bytes_per_run": 50_000_000,
            "sse_heartbeat_seconds": 15,
            "sse_poll_interval_seconds": 1,
            "sse_max_replay": 500,
            "sse_max_duration_seconds": 3600,
            "sse_idle_timeout_seconds": 120,
            "sse_max_concurrent_per_user": 4,
            "notify_tool_errors": true,
            "notify_tool_errors_only_codes": [],
            "notify_tool_errors_only_bindings": [],
            "notify_tool_errors_max_per_run": 20,
            "session_ttl_seconds": 86_400,
            "session_sliding_enabled": true,
            "session_sliding_window_seconds": 3600,
            "artifact_max_bytes": 10_000_000,
            "artifact_part_size": 1_000_000,
            "allow_remote_mcp": false,
            "workspace_root": "/var/runlog/workspace",
            "registry_root": "/var/runlog/registry",
        });
        registry.validate_system_config(&config).expect("config matches schema");
    }

    #[test]
    fn valid_manifest_passes() {
        let registry = ContractRegistry::new().expect("registry builds");
        let manifest = serde_json::json!({
            "tool_id": "file.read",
            "version": "1.0.0",
            "inputs_schema": { "type": "object" },
            "outputs_schema": { "type": "object" },
            "binding": { "binding_type": "inproc_safe", "entrypoint": "read_file" },
            "risk": { "scopes_required": [], "external_write": false, "network_egress": false },
        });
        registry.validate_manifest(&manifest).expect("manifest matches schema");
    }
}
