// runlog-config/src/config.rs
// ============================================================================
// Module: Config Model
// Description: RunlogConfig struct, environment/TOML loading, fail-closed
//              validation.
// Purpose: One typed source for every operator-facing knob named in the
//          system's Configuration section, plus the storage-layer knobs
//          (write_retry_budget, sqlite_busy_timeout_ms) that sit below the
//          admin-visible system_config surface.
// Dependencies: serde, toml, std::env
// ============================================================================

//! ## Overview
//! [`RunlogConfig`] is the canonical configuration struct. [`RunlogConfig::load`]
//! reads a TOML file (if present) and then overlays environment variables,
//! so deployments can mix a checked-in base file with per-environment
//! overrides. [`RunlogConfig::validate`] fails closed: a config that doesn't
//! pass is never allowed to start a server.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while loading or validating a [`RunlogConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML override file could not be read.
    #[error("failed to read config file {path}: {reason}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error, rendered.
        reason: String,
    },
    /// The TOML override file did not parse.
    #[error("failed to parse config file {path}: {reason}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying TOML error, rendered.
        reason: String,
    },
    /// An environment variable held a value of the wrong type.
    #[error("environment variable {name} has an invalid value: {value}")]
    InvalidEnvValue {
        /// The variable name.
        name: String,
        /// The value that failed to parse.
        value: String,
    },
    /// The assembled config failed a cross-field or range check.
    #[error("config validation failed: {0}")]
    Invalid(String),
}

/// The canonical, environment- and TOML-sourced configuration model.
///
/// Field names match the system's Configuration knob list exactly, so
/// `RunlogConfig`'s admin-visible subset serializes to the same shape the
/// `system_config` contract schema checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunlogConfig {
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
    /// Session lifetime, end to end.
    pub session_ttl_seconds: u64,
    /// Whether a session's TTL slides forward on activity.
    pub session_sliding_enabled: bool,
    /// The sliding window applied when `session_sliding_enabled`.
    pub session_sliding_window_seconds: u64,
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
    pub write_retry_budget: u32,
    /// Busy timeout applied to every pooled `SQLite` connection.
    pub sqlite_busy_timeout_ms: u64,
    /// Origins allowed to make cross-origin requests. Never `"*"`; an empty
    /// list also means no cross-origin requests are permitted.
    pub cors_allowed_origins: Vec<String>,
    /// `Host` header values the server accepts requests for.
    pub trusted_hosts: Vec<String>,
}

impl Default for RunlogConfig {
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
            session_ttl_seconds: 86_400,
            session_sliding_enabled: true,
            session_sliding_window_seconds: 3600,
            artifact_max_bytes: 10_000_000,
            artifact_part_size: 1_000_000,
            allow_remote_mcp: false,
            workspace_root: PathBuf::from("/var/runlog/workspace"),
            registry_root: PathBuf::from("/var/runlog/registry"),
            write_retry_budget: 8,
            sqlite_busy_timeout_ms: 5_000,
            cors_allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8000".to_string(),
                "http://localhost:4173".to_string(),
                "http://localhost:8080".to_string(),
            ],
            trusted_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

macro_rules! overlay_env_u64 {
    ($config:expr, $field:ident, $name:literal) => {
        if let Some(value) = env_var($name) {
            $config.$field = parse_env(&value, $name)?;
        }
    };
}

macro_rules! overlay_env_bool {
    ($config:expr, $field:ident, $name:literal) => {
        if let Some(value) = env_var($name) {
            $config.$field = parse_env(&value, $name)?;
        }
    };
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvValue { name: name.to_string(), value: value.to_string() })
}

impl RunlogConfig {
    /// Loads a config: defaults, then an optional TOML file, then
    /// environment variable overrides (`RUNLOG_` prefixed), then validates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file can't be read/parsed, an
    /// environment variable holds a malformed value, or the assembled
    /// config fails [`RunlogConfig::validate`].
    pub fn load(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match toml_path {
            Some(path) if path.exists() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        config.overlay_env()?;
        config.validate()?;
        Ok(config)
    }

    fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|err| ConfigError::Read { path: path.to_path_buf(), reason: err.to_string() })?;
        toml::from_str(&text).map_err(|err| ConfigError::Parse { path: path.to_path_buf(), reason: err.to_string() })
    }

    fn overlay_env(&mut self) -> Result<(), ConfigError> {
        overlay_env_u64!(self, max_events_per_run, "RUNLOG_MAX_EVENTS_PER_RUN");
        overlay_env_u64!(self, max_bytes_per_run, "RUNLOG_MAX_BYTES_PER_RUN");
        overlay_env_u64!(self, sse_heartbeat_seconds, "RUNLOG_SSE_HEARTBEAT_SECONDS");
        overlay_env_u64!(self, sse_poll_interval_seconds, "RUNLOG_SSE_POLL_INTERVAL_SECONDS");
        overlay_env_u64!(self, sse_max_replay, "RUNLOG_SSE_MAX_REPLAY");
        overlay_env_u64!(self, sse_max_duration_seconds, "RUNLOG_SSE_MAX_DURATION_SECONDS");
        overlay_env_u64!(self, sse_idle_timeout_seconds, "RUNLOG_SSE_IDLE_TIMEOUT_SECONDS");
        if let Some(value) = env_var("RUNLOG_SSE_MAX_CONCURRENT_PER_USER") {
            self.sse_max_concurrent_per_user = parse_env(&value, "RUNLOG_SSE_MAX_CONCURRENT_PER_USER")?;
        }
        overlay_env_bool!(self, notify_tool_errors, "RUNLOG_NOTIFY_TOOL_ERRORS");
        if let Some(value) = env_var("RUNLOG_NOTIFY_TOOL_ERRORS_ONLY_CODES") {
            self.notify_tool_errors_only_codes = split_csv(&value);
        }
        if let Some(value) = env_var("RUNLOG_NOTIFY_TOOL_ERRORS_ONLY_BINDINGS") {
            self.notify_tool_errors_only_bindings = split_csv(&value);
        }
        if let Some(value) = env_var("RUNLOG_NOTIFY_TOOL_ERRORS_MAX_PER_RUN") {
            self.notify_tool_errors_max_per_run = parse_env(&value, "RUNLOG_NOTIFY_TOOL_ERRORS_MAX_PER_RUN")?;
        }
        overlay_env_u64!(self, session_ttl_seconds, "RUNLOG_SESSION_TTL_SECONDS");
        overlay_env_bool!(self, session_sliding_enabled, "RUNLOG_SESSION_SLIDING_ENABLED");
        overlay_env_u64!(self, session_sliding_window_seconds, "RUNLOG_SESSION_SLIDING_WINDOW_SECONDS");
        overlay_env_u64!(self, artifact_max_bytes, "RUNLOG_ARTIFACT_MAX_BYTES");
        overlay_env_u64!(self, artifact_part_size, "RUNLOG_ARTIFACT_PART_SIZE");
        overlay_env_bool!(self, allow_remote_mcp, "RUNLOG_ALLOW_REMOTE_MCP");
        if let Some(value) = env_var("RUNLOG_WORKSPACE_ROOT") {
            self.workspace_root = PathBuf::from(value);
        }
        if let Some(value) = env_var("RUNLOG_REGISTRY_ROOT") {
            self.registry_root = PathBuf::from(value);
        }
        if let Some(value) = env_var("RUNLOG_WRITE_RETRY_BUDGET") {
            self.write_retry_budget = parse_env(&value, "RUNLOG_WRITE_RETRY_BUDGET")?;
        }
        overlay_env_u64!(self, sqlite_busy_timeout_ms, "RUNLOG_SQLITE_BUSY_TIMEOUT_MS");
        if let Some(value) = env_var("RUNLOG_CORS_ALLOWED_ORIGINS") {
            self.cors_allowed_origins = split_csv(&value);
        }
        if let Some(value) = env_var("RUNLOG_TRUSTED_HOSTS") {
            self.trusted_hosts = split_csv(&value);
        }
        Ok(())
    }

    /// Fails closed: a config that doesn't pass these checks must never be
    /// allowed to start a server.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first failing check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sse_poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid("sse_poll_interval_seconds must be at least 1".to_string()));
        }
        if self.sse_heartbeat_seconds == 0 {
            return Err(ConfigError::Invalid("sse_heartbeat_seconds must be at least 1".to_string()));
        }
        if self.sse_max_duration_seconds == 0 {
            return Err(ConfigError::Invalid("sse_max_duration_seconds must be at least 1".to_string()));
        }
        if self.sse_idle_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("sse_idle_timeout_seconds must be at least 1".to_string()));
        }
        if self.sse_max_concurrent_per_user == 0 {
            return Err(ConfigError::Invalid("sse_max_concurrent_per_user must be at least 1".to_string()));
        }
        if self.session_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("session_ttl_seconds must be at least 1".to_string()));
        }
        if self.session_sliding_window_seconds == 0 {
            return Err(ConfigError::Invalid("session_sliding_window_seconds must be at least 1".to_string()));
        }
        if self.artifact_part_size == 0 {
            return Err(ConfigError::Invalid("artifact_part_size must be at least 1".to_string()));
        }
        if self.artifact_part_size > self.artifact_max_bytes {
            return Err(ConfigError::Invalid("artifact_part_size must not exceed artifact_max_bytes".to_string()));
        }
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("workspace_root must not be empty".to_string()));
        }
        if self.registry_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("registry_root must not be empty".to_string()));
        }
        if self.write_retry_budget == 0 {
            return Err(ConfigError::Invalid("write_retry_budget must be at least 1".to_string()));
        }
        if self.sqlite_busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid("sqlite_busy_timeout_ms must be at least 1".to_string()));
        }
        if self.cors_allowed_origins.iter().any(|origin| origin == "*") {
            return Err(ConfigError::Invalid("cors_allowed_origins must not include wildcard '*'".to_string()));
        }
        Ok(())
    }

    /// Renders the admin-visible subset as the `system_config` JSON
    /// document, the shape `runlog_contract::ContractRegistry::validate_system_config`
    /// checks. `write_retry_budget`/`sqlite_busy_timeout_ms` are
    /// storage-layer knobs, not part of that contract, and are omitted.
    #[must_use]
    pub fn to_system_config_json(&self) -> serde_json::Value {
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
            "session_ttl_seconds": self.session_ttl_seconds,
            "session_sliding_enabled": self.session_sliding_enabled,
            "session_sliding_window_seconds": self.session_sliding_window_seconds,
            "artifact_max_bytes": self.artifact_max_bytes,
            "artifact_part_size": self.artifact_part_size,
            "allow_remote_mcp": self.allow_remote_mcp,
            "workspace_root": self.workspace_root.to_string_lossy(),
            "registry_root": self.registry_root.to_string_lossy(),
        })
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_validates() {
        RunlogConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn default_config_matches_the_system_config_schema() {
        let registry = runlog_contract::ContractRegistry::new().expect("registry compiles");
        registry
            .validate_system_config(&RunlogConfig::default().to_system_config_json())
            .expect("default config matches the system_config schema");
    }

    #[test]
    fn part_size_larger_than_max_bytes_is_rejected() {
        let mut config = RunlogConfig::default();
        config.artifact_part_size = config.artifact_max_bytes + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn wildcard_cors_origin_is_rejected() {
        let mut config = RunlogConfig::default();
        config.cors_allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    #[allow(unsafe_code, reason = "std::env::set_var is unsafe; this test owns the variable for its duration")]
    fn env_overlay_overrides_defaults() {
        unsafe {
            env::set_var("RUNLOG_MAX_EVENTS_PER_RUN", "42");
        }
        let mut config = RunlogConfig::default();
        config.overlay_env().expect("overlay parses");
        assert_eq!(config.max_events_per_run, 42);
        unsafe {
            env::remove_var("RUNLOG_MAX_EVENTS_PER_RUN");
        }
    }

    #[test]
    #[allow(unsafe_code, reason = "std::env::set_var is unsafe; this test owns the variable for its duration")]
    fn malformed_env_value_is_rejected() {
        unsafe {
            env::set_var("RUNLOG_MAX_EVENTS_PER_RUN", "not-a-number");
        }
        let mut config = RunlogConfig::default();
        let result = config.overlay_env();
        unsafe {
            env::remove_var("RUNLOG_MAX_EVENTS_PER_RUN");
        }
        assert!(result.is_err());
    }

    #[test]
    fn toml_file_overrides_load() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "max_events_per_run = 99\nmax_bytes_per_run = 1\nsse_heartbeat_seconds = 1\nsse_poll_interval_seconds = 1\nsse_max_replay = 1\nsse_max_duration_seconds = 1\nsse_idle_timeout_seconds = 1\nsse_max_concurrent_per_user = 1\nnotify_tool_errors = true\nnotify_tool_errors_only_codes = []\nnotify_tool_errors_only_bindings = []\nnotify_tool_errors_max_per_run = 1\nsession_ttl_seconds = 1\nsession_sliding_enabled = true\nsession_sliding_window_seconds = 1\nartifact_max_bytes = 10\nartifact_part_size = 1\nallow_remote_mcp = false\nworkspace_root = \"/tmp/ws\"\nregistry_root = \"/tmp/reg\"\nwrite_retry_budget = 1\nsqlite_busy_timeout_ms = 1\ncors_allowed_origins = []\ntrusted_hosts = []").expect("write");
        let config = RunlogConfig::load(Some(file.path())).expect("loads");
        assert_eq!(config.max_events_per_run, 99);
    }
}
