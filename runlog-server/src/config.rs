// runlog-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Operator-facing knobs validated against the system_config
//              contract schema.
// Purpose: Give every route handler and the StreamBroker one typed source
//          for the ceilings and timers spec section 4 names.
// Dependencies: runlog-contract, serde_json
// ============================================================================

//! ## Overview
//! [`ServerConfig`] mirrors `runlog_contract::schemas::system_config_schema`
//! field for field; [`ServerConfig::to_json`] is what `system_config`
//! returns and what a deploy-time config file is validated against before
//! being trusted.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Operator-facing knobs, validated against the `system_config` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Per-run event count ceiling.
    pub max_events_per_run: u64,
    /// Per-run cumulative byte ceiling.
    pub max_bytes_per_run: u64,
    /// Seconds between `: heartbeat` comments on an idle live stream.
    pub sse_heartbeat_seconds: u64,
    /// Seconds between Store polls on a live stream.
    pub sse_poll_interval_seconds: u64,
    /// Maximum rows replayed on stream open.
    pub sse_max_replay: u64,
    /// Maximum lifetime of one stream connection.
    pub sse_max_duration_seconds: u64,
    /// Maximum time a stream may go without a new row before closing.
    pub sse_idle_timeout_seconds: u64,
    /// Maximum concurrent streams of one kind, per user.
    pub sse_max_concurrent_per_user: u32,
    /// Master on/off switch for `tool_error` notifications.
    pub notify_tool_errors: bool,
    /// If non-empty, only these error codes notify.
    pub notify_tool_errors_only_codes: Vec<String>,
    /// If non-empty, only these binding types notify.
    pub notify_tool_errors_only_bindings: Vec<String>,
    /// Maximum `run_tool_error` notifications emitted per run.
    pub notify_tool_errors_max_per_run: u32,
    /// Maximum artifact size accepted by `create_artifact`/`finalize_upload`.
    pub artifact_max_bytes: u64,
    /// Maximum size of one multipart upload part.
    pub artifact_part_size: u64,
    /// Whether non-loopback remote tool bindings are permitted.
    pub allow_remote_mcp: bool,
    /// Root directory artifact blobs are written under.
    pub workspace_root: PathBuf,
    /// Root directory tool manifests are installed from.
    pub registry_root: PathBuf,
    /// Maximum `begin_run_write` retries before surfacing `write_contended`.
    /// Not part of the `system_config` contract schema; a storage-layer
    /// knob carried alongside it for convenience.
    #[serde(default = "default_write_retry_budget")]
    pub write_retry_budget: u32,
    /// Origins allowed to make cross-origin requests. Not part of the
    /// `system_config` contract schema; an HTTP-layer knob carried
    /// alongside it for convenience.
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
    /// `Host` header values the server accepts requests for.
    #[serde(default = "default_trusted_hosts")]
    pub trusted_hosts: Vec<String>,
}

fn default_write_retry_budget() -> u32 {
    8
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:8000".to_string(),
        "http://localhost:4173".to_string(),
        "http://localhost:8080".to_string(),
    ]
}

fn default_trusted_hosts() -> Vec<String> {
    vec!["localhost".to_string(), "127.0.0.1".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_events_per_run: 10_000,
            max_bytes_per_run: 50_000_000,
            sse_heartbeat_seconds: 15,
            sse_poll_interval_seconds: 1,
            sse_max_replay: 500,
            sse_max_duration_seconds: 3600,
            sse_idle_timeout_seconds: 120,
            sse_max_concurrent_per_user: 4,
            notify_tool_errors: true,
            notify_tool_errors_only_codes: Vec::new(),
            notify_tool_errors_only_bindings: Vec::new(),
            notify_tool_errors_max_per_run: 20,
            artifact_max_bytes: 10_000_000,
            artifact_part_size: 1_000_000,
            allow_remote_mcp: false,
            workspace_root: PathBuf::from("/var/runlog/workspace"),
            registry_root: PathBuf::from("/var/runlog/registry"),
            write_retry_budget: default_write_retry_budget(),
            cors_allowed_origins: default_cors_allowed_origins(),
            trusted_hosts: default_trusted_hosts(),
        }
    }
}

impl ServerConfig {
    /// Renders this config as the `system_config` JSON document, the shape
    /// `runlog_contract::ContractRegistry::validate_system_config` checks.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "max_events_per_run": self.max_events_per_run,
            "max_bytes_per_run": self.max_bytes_per_run,
            "sse_heartbeat_seconds": self.sse_heartbeat_seconds,
            "sse_poll_interval_seconds": self.sse_poll_interval_seconds,
            "sse_max_replay": self.sse_max_replay,
            "sse_max_duration_seconds": self.sse_max_duration_seconds,
            "sse_idle_timeout_seconds": self.sse_idle_timeout_seconds,
            "sse_max_concurrent_per_user": self.sse_max_concurrent_per_user,
            "notify_tool_errors": self.notify_tool_errors,
            "notify_tool_errors_only_codes": self.notify_tool_errors_only_codes,
            "notify_tool_errors_only_bindings": self.notify_tool_errors_only_bindings,
            "notify_tool_errors_max_per_run": self.notify_tool_errors_max_per_run,
            "session_ttl_seconds": 86_400,
            "session_sliding_enabled": true,
            "session_sliding_window_seconds": 3600,
            "artifact_max_bytes": self.artifact_max_bytes,
            "artifact_part_size": self.artifact_part_size,
            "allow_remote_mcp": self.allow_remote_mcp,
            "workspace_root": self.workspace_root.to_string_lossy(),
            "registry_root": self.registry_root.to_string_lossy(),
        })
    }
}

impl From<runlog_config::RunlogConfig> for ServerConfig {
    fn from(config: runlog_config::RunlogConfig) -> Self {
        Self {
            max_events_per_run: config.max_events_per_run,
            max_bytes_per_run: config.max_bytes_per_run,
            sse_heartbeat_seconds: config.sse_heartbeat_seconds,
            sse_poll_interval_seconds: config.sse_poll_interval_seconds,
            sse_max_replay: config.sse_max_replay,
            sse_max_duration_seconds: config.sse_max_duration_seconds,
            sse_idle_timeout_seconds: config.sse_idle_timeout_seconds,
            sse_max_concurrent_per_user: config.sse_max_concurrent_per_user,
            notify_tool_errors: config.notify_tool_errors,
            notify_tool_errors_only_codes: config.notify_tool_errors_only_codes,
            notify_tool_errors_only_bindings: config.notify_tool_errors_only_bindings,
            notify_tool_errors_max_per_run: config.notify_tool_errors_max_per_run,
            artifact_max_bytes: config.artifact_max_bytes,
            artifact_part_size: config.artifact_part_size,
            allow_remote_mcp: config.allow_remote_mcp,
            workspace_root: config.workspace_root,
            registry_root: config.registry_root,
            write_retry_budget: config.write_retry_budget,
            cors_allowed_origins: config.cors_allowed_origins,
            trusted_hosts: config.trusted_hosts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_system_config_schema() {
        let registry = runlog_contract::ContractRegistry::new().expect("registry compiles");
        registry
            .validate_system_config(&ServerConfig::default().to_json())
            .expect("default config matches the system_config schema");
    }
}
