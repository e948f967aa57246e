// runlog-contract/src/schemas.rs
// ============================================================================
// Module: Event Payload Schemas
// Description: JSON Schema builders for every registered event kind, the
//              tool manifest shape, and the operator-visible system config
//              snapshot.
// Purpose: Provide the canonical, machine-readable shape each payload must
//          satisfy before an event is ever written.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Every function here returns a JSON Schema (draft 2020-12) `Value`. Kinds
//! constructed only by `runlog-core` itself (`tool_call`, `tool_result`,
//! `tool_error`, `system_event`, `quota_exceeded`, `metrics_computed`) get a
//! closed (`additionalProperties: false`) schema mirroring the exact payload
//! the core builds. Kinds an external producer authors (`user_message`,
//! `artifact_ref`, `run_status`, and the rest) are validated loosely: the
//! fields the core reads out of the payload are required and typed, other
//! fields are left open.

use serde_json::Map;
use serde_json::Value;
use serde_json::json;

/// Every event kind this contract registers a schema for.
pub const REGISTERED_KINDS: &[&str] = &[
    "user_message",
    "assistant_message",
    "tool_call",
    "tool_result",
    "tool_error",
    "system_event",
    "quota_exceeded",
    "metrics_computed",
    "artifact_ref",
    "run_status",
    "workflow_run_completed",
    "research_source_created",
    "research_report_created",
    "auth_csrf_failed",
];

/// Builds every `(kind, schema)` pair in [`REGISTERED_KINDS`], in order.
/// The single source of truth both [`schema_for_kind`] and
/// `ContractRegistry::new` build from, so the two can never fall out of
/// sync with each other.
#[must_use]
pub fn all_kind_schemas() -> Vec<(&'static str, Value)> {
    vec![
        ("user_message", user_message_schema()),
        ("assistant_message", assistant_message_schema()),
        ("tool_call", tool_call_schema()),
        ("tool_result", tool_result_schema()),
        ("tool_error", tool_error_schema()),
        ("system_event", system_event_schema()),
        ("quota_exceeded", quota_exceeded_schema()),
        ("metrics_computed", metrics_computed_schema()),
        ("artifact_ref", artifact_ref_schema()),
        ("run_status", run_status_schema()),
        ("workflow_run_completed", workflow_run_completed_schema()),
        ("research_source_created", research_source_created_schema()),
        ("research_report_created", research_report_created_schema()),
        ("auth_csrf_failed", auth_csrf_failed_schema()),
    ]
}

/// Returns the schema registered for `kind`, or `None` if `kind` is not one
/// of [`REGISTERED_KINDS`].
#[must_use]
pub fn schema_for_kind(kind: &str) -> Option<Value> {
    all_kind_schemas().into_iter().find(|(name, _)| *name == kind).map(|(_, schema)| schema)
}

/// A chat-style message authored by the end user.
fn user_message_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/user_message.schema.json",
        "title": "user_message",
        "type": "object",
        "required": ["text"],
        "properties": {
            "text": { "type": "string" },
            "attachments": { "type": "array" }
        },
        "additionalProperties": true
    })
}

/// A chat-style message authored by the assistant.
fn assistant_message_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/assistant_message.schema.json",
        "title": "assistant_message",
        "type": "object",
        "required": ["text"],
        "properties": {
            "text": { "type": "string" }
        },
        "additionalProperties": true
    })
}

/// The exact payload `ToolExecutor::invoke` writes before dispatch.
fn tool_call_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/tool_call.schema.json",
        "title": "tool_call",
        "type": "object",
        "required": ["tool_id", "version", "inputs", "binding_type", "correlation_id"],
        "properties": {
            "tool_id": { "type": "string", "minLength": 1 },
            "version": { "type": "string", "minLength": 1 },
            "inputs": {},
            "binding_type": {
                "type": "string",
                "enum": ["inproc_safe", "sandbox_job", "mcp_remote", "openapi_proxy"]
            },
            "correlation_id": { "type": "string", "minLength": 1 }
        },
        "additionalProperties": false
    })
}

/// The exact payload `ToolExecutor::invoke` writes on a successful binding call.
fn tool_result_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/tool_result.schema.json",
        "title": "tool_result",
        "type": "object",
        "required": ["outputs", "correlation_id"],
        "properties": {
            "outputs": {},
            "correlation_id": { "type": "string", "minLength": 1 }
        },
        "additionalProperties": false
    })
}

/// The exact payload `ToolExecutor::invoke` writes on policy denial or binding failure.
fn tool_error_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/tool_error.schema.json",
        "title": "tool_error",
        "type": "object",
        "required": ["error_code", "message", "correlation_id", "binding_type"],
        "properties": {
            "error_code": { "type": "string", "minLength": 1 },
            "message": { "type": "string" },
            "correlation_id": { "type": "string", "minLength": 1 },
            "binding_type": {
                "type": "string",
                "enum": ["inproc_safe", "sandbox_job", "mcp_remote", "openapi_proxy"]
            }
        },
        "additionalProperties": false
    })
}

/// The `{code, details}` shape every `system_event` carries.
fn system_event_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/system_event.schema.json",
        "title": "system_event",
        "type": "object",
        "required": ["code", "details"],
        "properties": {
            "code": { "type": "string", "minLength": 1 },
            "details": { "type": "string" }
        },
        "additionalProperties": false
    })
}

/// The `{scope, limit, observed}` shape the best-effort quota audit writes.
fn quota_exceeded_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/quota_exceeded.schema.json",
        "title": "quota_exceeded",
        "type": "object",
        "required": ["scope", "limit", "observed"],
        "properties": {
            "scope": { "type": "string", "enum": ["events_per_run", "bytes_per_run"] },
            "limit": { "type": "integer", "minimum": 0 },
            "observed": { "type": "integer", "minimum": 0 }
        },
        "additionalProperties": false
    })
}

/// Mirrors `runlog_core::core::model::RunMetrics`, serialized verbatim as
/// the `metrics_computed` follow-up payload.
fn metrics_computed_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/metrics_computed.schema.json",
        "title": "metrics_computed",
        "type": "object",
        "required": [
            "event_count",
            "bytes_in",
            "bytes_out",
            "tool_calls",
            "tool_errors",
            "artifacts_count"
        ],
        "properties": {
            "event_count": { "type": "integer", "minimum": 0 },
            "bytes_in": { "type": "integer", "minimum": 0 },
            "bytes_out": { "type": "integer", "minimum": 0 },
            "tool_calls": { "type": "integer", "minimum": 0 },
            "tool_errors": { "type": "integer", "minimum": 0 },
            "artifacts_count": { "type": "integer", "minimum": 0 },
            "completed_at": { "oneOf": [{ "type": "null" }, { "type": "integer" }] },
            "duration_ms": { "oneOf": [{ "type": "null" }, { "type": "integer", "minimum": 0 }] }
        },
        "additionalProperties": false
    })
}

/// The fields `EventLog::apply_post_commit_side_effects` reads to build an
/// `ArtifactLink` row; other fields (e.g. a human-readable description) are
/// left open.
fn artifact_ref_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/artifact_ref.schema.json",
        "title": "artifact_ref",
        "type": "object",
        "required": ["artifact_id"],
        "properties": {
            "artifact_id": { "type": "string", "minLength": 1 },
            "tool_id": { "type": "string" },
            "purpose": { "type": "string" }
        },
        "additionalProperties": true
    })
}

/// `status` is read by `is_run_terminal_kind`; any non-empty string is
/// accepted, since non-terminal progress statuses are also valid.
fn run_status_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/run_status.schema.json",
        "title": "run_status",
        "type": "object",
        "required": ["status"],
        "properties": {
            "status": { "type": "string", "minLength": 1 }
        },
        "additionalProperties": true
    })
}

/// Always run-terminal; carries an optional free-form summary.
fn workflow_run_completed_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/workflow_run_completed.schema.json",
        "title": "workflow_run_completed",
        "type": "object",
        "properties": {
            "summary": { "type": "string" }
        },
        "additionalProperties": true
    })
}

/// A research source discovered mid-run; provenance indexes these by
/// `source_id`.
fn research_source_created_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/research_source_created.schema.json",
        "title": "research_source_created",
        "type": "object",
        "required": ["source_id"],
        "properties": {
            "source_id": { "type": "string", "minLength": 1 },
            "url": { "type": "string" },
            "title": { "type": "string" }
        },
        "additionalProperties": true
    })
}

/// `citations` is read by the provenance graph builder to add `citation`
/// edges.
fn research_report_created_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/research_report_created.schema.json",
        "title": "research_report_created",
        "type": "object",
        "required": ["citations"],
        "properties": {
            "citations": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "additionalProperties": true
    })
}

/// Best-effort audit event for a rejected CSRF token.
fn auth_csrf_failed_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/auth_csrf_failed.schema.json",
        "title": "auth_csrf_failed",
        "type": "object",
        "properties": {
            "reason": { "type": "string" }
        },
        "additionalProperties": true
    })
}

/// Schema for a `runlog_core::core::model::ToolManifest`, validated when a
/// manifest is installed into the tool registry.
#[must_use]
pub fn tool_manifest_schema() -> Value {
    let mut defs = Map::new();
    defs.insert(
        "RiskProfile".to_string(),
        json!({
            "type": "object",
            "required": ["scopes_required", "external_write", "network_egress"],
            "properties": {
                "scopes_required": { "type": "array", "items": { "type": "string" } },
                "external_write": { "type": "boolean" },
                "network_egress": { "type": "boolean" }
            },
            "additionalProperties": false
        }),
    );
    defs.insert(
        "ToolBindingSpec".to_string(),
        json!({
            "type": "object",
            "required": ["binding_type", "entrypoint"],
            "properties": {
                "binding_type": {
                    "type": "string",
                    "enum": ["inproc_safe", "sandbox_job", "mcp_remote", "openapi_proxy"]
                },
                "entrypoint": { "type": "string", "minLength": 1 }
            },
            "additionalProperties": false
        }),
    );
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/tool_manifest.schema.json",
        "title": "ToolManifest",
        "type": "object",
        "required": ["tool_id", "version", "inputs_schema", "outputs_schema", "binding", "risk"],
        "properties": {
            "tool_id": { "type": "string", "minLength": 1 },
            "version": { "type": "string", "minLength": 1 },
            "inputs_schema": { "type": "object" },
            "outputs_schema": { "type": "object" },
            "binding": { "$ref": "#/$defs/ToolBindingSpec" },
            "risk": { "$ref": "#/$defs/RiskProfile" }
        },
        "additionalProperties": false,
        "$defs": defs
    })
}

/// Schema for the admin-gated `system_config` snapshot, per the
/// environment-sourced configuration list.
#[must_use]
pub fn system_config_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://contract/schemas/system_config.schema.json",
        "title": "system_config",
        "type": "object",
        "required": [
            "max_events_per_run",
            "max_bytes_per_run",
            "sse_heartbeat_seconds",
            "sse_poll_interval_seconds",
            "sse_max_replay",
            "sse_max_duration_seconds",
            "sse_idle_timeout_seconds",
            "sse_max_concurrent_per_user",
            "notify_tool_errors",
            "notify_tool_errors_only_codes",
            "notify_tool_errors_only_bindings",
            "notify_tool_errors_max_per_run",
            "session_ttl_seconds",
            "session_sliding_enabled",
            "session_sliding_window_seconds",
            "artifact_max_bytes",
            "artifact_part_size",
            "allow_remote_mcp",
            "workspace_root",
            "registry_root"
        ],
        "properties": {
            "max_events_per_run": { "type": "integer", "minimum": 0 },
            "max_bytes_per_run": { "type": "integer", "minimum": 0 },
            "sse_heartbeat_seconds": { "type": "integer", "minimum": 1 },
            "sse_poll_interval_seconds": { "type": "integer", "minimum": 1 },
            "sse_max_replay": { "type": "integer", "minimum": 0 },
            "sse_max_duration_seconds": { "type": "integer", "minimum": 1 },
            "sse_idle_timeout_seconds": { "type": "integer", "minimum": 1 },
            "sse_max_concurrent_per_user": { "type": "integer", "minimum": 1 },
            "notify_tool_errors": { "type": "boolean" },
            "notify_tool_errors_only_codes": { "type": "array", "items": { "type": "string" } },
            "notify_tool_errors_only_bindings": { "type": "array", "items": { "type": "string" } },
            "notify_tool_errors_max_per_run": { "type": "integer", "minimum": 0 },
            "session_ttl_seconds": { "type": "integer", "minimum": 1 },
            "session_sliding_enabled": { "type": "boolean" },
            "session_sliding_window_seconds": { "type": "integer", "minimum": 1 },
            "artifact_max_bytes": { "type": "integer", "minimum": 0 },
            "artifact_part_size": { "type": "integer", "minimum": 1 },
            "allow_remote_mcp": { "type": "boolean" },
            "workspace_root": { "type": "string", "minLength": 1 },
            "registry_root": { "type": "string", "minLength": 1 }
        },
        "additionalProperties": false
    })
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
    fn every_registered_kind_resolves_to_a_schema() {
        for kind in REGISTERED_KINDS {
            assert!(schema_for_kind(kind).is_some(), "missing schema for {kind}");
        }
    }

    #[test]
    fn unregistered_kind_resolves_to_none() {
        assert!(schema_for_kind("not_a_real_kind").is_none());
    }

    #[test]
    fn every_schema_carries_a_stable_id() {
        for kind in REGISTERED_KINDS {
            let schema = schema_for_kind(kind).expect("schema exists");
            assert!(schema.get("$id").and_then(Value::as_str).is_some());
        }
    }
}
