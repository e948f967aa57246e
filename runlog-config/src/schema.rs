// runlog-config/src/schema.rs
// ============================================================================
// Module: Config Schema
// Description: JSON Schema builder for the RunlogConfig TOML/env surface.
// Purpose: Provide a canonical validation schema for config file tooling,
//          distinct from (but a superset of) the system_config contract
//          schema runlog-contract exposes at the HTTP boundary.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`config_schema`] describes every field [`crate::config::RunlogConfig`]
//! accepts, including the storage-layer knobs (`write_retry_budget`,
//! `sqlite_busy_timeout_ms`) that sit below the admin-visible `system_config`
//! surface `runlog-contract` validates at the HTTP boundary.

use serde_json::json;
use serde_json::Value;

/// Returns the JSON Schema for the `RunlogConfig` TOML/env surface.
#[must_use]
pub fn config_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "runlog://config/schemas/runlog_config.schema.json",
        "title": "RunlogConfig",
        "description": "Environment- and TOML-sourced configuration for the Run Event Substrate.",
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
            "registry_root",
            "write_retry_budget",
            "sqlite_busy_timeout_ms"
        ],
        "properties": {
            "max_events_per_run": { "type": "integer", "minimum": 0, "description": "Per-run event count ceiling." },
            "max_bytes_per_run": { "type": "integer", "minimum": 0, "description": "Per-run cumulative byte ceiling." },
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
            "registry_root": { "type": "string", "minLength": 1 },
            "write_retry_budget": {
                "type": "integer",
                "minimum": 1,
                "description": "Maximum begin_run_write retries before surfacing write_contended."
            },
            "sqlite_busy_timeout_ms": {
                "type": "integer",
                "minimum": 1,
                "description": "Busy timeout applied to every pooled SQLite connection."
            }
        },
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunlogConfig;

    #[test]
    fn schema_compiles() {
        jsonschema::validator_for(&config_schema()).expect("schema compiles");
    }

    #[test]
    fn default_config_matches_its_own_schema() {
        let config = serde_json::to_value(RunlogConfig::default()).expect("serializes");
        let validator = jsonschema::validator_for(&config_schema()).expect("schema compiles");
        assert!(validator.is_valid(&config), "{:?}", validator.iter_errors(&config).collect::<Vec<_>>());
    }
}
