// runlog-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Durable `Store` implementation backed by SQLite WAL, with a
//              pooled connection per exclusive per-run write transaction.
// Purpose: Give the Run Event Substrate a concrete, production persistence
//          layer without making runtime components depend on rusqlite.
// Dependencies: runlog_core, r2d2, r2d2_sqlite, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! [`SqliteStore`] implements [`runlog_core::Store`] against a single SQLite
//! file in WAL mode. Every row that mixes indexable and opaque fields stores
//! the opaque part as a JSON blob column (payload, pins, manifest, graph) and
//! the indexable part as plain columns. `begin_run_write`
//! checks out a dedicated pooled connection, issues `BEGIN IMMEDIATE`
//! directly, and hands the caller an owned [`RunWriteTransaction`] so the
//! open transaction can cross the `Arc<dyn Store>` trait-object boundary
//! without borrowing from a `Mutex` guard.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use r2d2_sqlite::rusqlite::Connection;
use r2d2_sqlite::rusqlite::Error as SqlError;
use r2d2_sqlite::rusqlite::ErrorCode;
use r2d2_sqlite::rusqlite::OptionalExtension;
use r2d2_sqlite::rusqlite::Row;
use r2d2_sqlite::rusqlite::Transaction;
use r2d2_sqlite::rusqlite::Result as SqlResult;
use r2d2_sqlite::rusqlite::params;
use runlog_core::Activity;
use runlog_core::Approval;
use runlog_core::ApprovalStatus;
use runlog_core::Artifact;
use runlog_core::ArtifactLink;
use runlog_core::Event;
use runlog_core::IdempotencyRecord;
use runlog_core::Notification;
use runlog_core::NotificationState;
use runlog_core::Pins;
use runlog_core::ProvenanceCacheRow;
use runlog_core::Run;
use runlog_core::RunMetrics;
use runlog_core::RunStatus;
use runlog_core::RunWriteTransaction;
use runlog_core::ScopeGrant;
use runlog_core::Store;
use runlog_core::StoreError;
use runlog_core::Thread;
use runlog_core::ToolCorrelation;
use runlog_core::ToolManifest;
use runlog_core::ToolMetrics;
use runlog_core::Timestamp;
use runlog_core::core::identifiers::ApprovalId;
use runlog_core::core::identifiers::ArtifactId;
use runlog_core::core::identifiers::CorrelationId;
use runlog_core::core::identifiers::EventId;
use runlog_core::core::identifiers::NotificationId;
use runlog_core::core::identifiers::ProjectId;
use runlog_core::core::identifiers::RunId;
use runlog_core::core::identifiers::ThreadId;
use runlog_core::core::identifiers::UserId;
use runlog_core::core::model::Actor;
use runlog_core::core::model::Privacy;

use crate::error::SqliteStoreError;
use crate::schema;

/// Default busy timeout applied to every pooled connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default pool size.
const DEFAULT_MAX_POOL_SIZE: u32 = 8;

/// Configuration for [`SqliteStore::new`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout applied to every pooled connection.
    pub busy_timeout_ms: u64,
    /// Maximum number of pooled connections.
    pub max_pool_size: u32,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path` with default pool and timeout
    /// settings.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS, max_pool_size: DEFAULT_MAX_POOL_SIZE }
    }
}

/// `SQLite`-backed [`Store`] with a pooled connection per caller.
#[derive(Clone)]
pub struct SqliteStore {
    /// Connection pool; each `begin_run_write` call checks out its own
    /// connection so the open transaction can outlive the calling stack
    /// frame.
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Opens (or creates) a `SQLite`-backed store at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] if the database cannot be opened,
    /// pooled, or schema-initialised.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let busy_timeout_ms = config.busy_timeout_ms;
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
            )?;
            conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
        });
        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .build(manager)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        {
            let mut conn = pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
            schema::initialize_schema(&mut conn)?;
        }
        Ok(Self { pool })
    }
}

/// Ensures the parent directory of `path` exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

// ============================================================================
// SECTION: Enum <-> TEXT Conversions
// ============================================================================

/// Returns the stored `snake_case` label for a [`RunStatus`].
const fn run_status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Cancelled => "cancelled",
        RunStatus::Failed => "failed",
        RunStatus::WaitingApproval => "waiting_approval",
    }
}

/// Parses a stored run status label.
fn parse_run_status(label: &str) -> Result<RunStatus, SqliteStoreError> {
    match label {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "cancelled" => Ok(RunStatus::Cancelled),
        "failed" => Ok(RunStatus::Failed),
        "waiting_approval" => Ok(RunStatus::WaitingApproval),
        other => Err(SqliteStoreError::Invalid(format!("unknown run status: {other}"))),
    }
}

/// Returns the stored `snake_case` label for an [`Actor`].
const fn actor_label(actor: Actor) -> &'static str {
    match actor {
        Actor::User => "user",
        Actor::Assistant => "assistant",
        Actor::Tool => "tool",
        Actor::System => "system",
    }
}

/// Parses a stored actor label.
fn parse_actor(label: &str) -> Result<Actor, SqliteStoreError> {
    match label {
        "user" => Ok(Actor::User),
        "assistant" => Ok(Actor::Assistant),
        "tool" => Ok(Actor::Tool),
        "system" => Ok(Actor::System),
        other => Err(SqliteStoreError::Invalid(format!("unknown actor: {other}"))),
    }
}

/// Returns the stored `snake_case` label for a [`Privacy`] classification.
const fn privacy_label(privacy: Privacy) -> &'static str {
    match privacy {
        Privacy::Standard => "standard",
        Privacy::Restricted => "restricted",
    }
}

/// Parses a stored privacy label.
fn parse_privacy(label: &str) -> Result<Privacy, SqliteStoreError> {
    match label {
        "standard" => Ok(Privacy::Standard),
        "restricted" => Ok(Privacy::Restricted),
        other => Err(SqliteStoreError::Invalid(format!("unknown privacy: {other}"))),
    }
}

/// Returns the stored `snake_case` label for an [`ApprovalStatus`].
const fn approval_status_label(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Denied => "denied",
    }
}

/// Parses a stored approval status label.
fn parse_approval_status(label: &str) -> Result<ApprovalStatus, SqliteStoreError> {
    match label {
        "pending" => Ok(ApprovalStatus::Pending),
        "approved" => Ok(ApprovalStatus::Approved),
        "denied" => Ok(ApprovalStatus::Denied),
        other => Err(SqliteStoreError::Invalid(format!("unknown approval status: {other}"))),
    }
}

// ============================================================================
// SECTION: Scalar Conversions
// ============================================================================

/// Converts a [`Timestamp`] to a storable `i64`.
fn ts_to_i64(ts: Timestamp) -> Result<i64, SqliteStoreError> {
    i64::try_from(ts.as_millis()).map_err(|_| SqliteStoreError::Invalid("timestamp overflow".to_string()))
}

/// Converts a stored `i64` back to a [`Timestamp`].
fn ts_from_i64(raw: i64) -> Result<Timestamp, SqliteStoreError> {
    let millis = u64::try_from(raw).map_err(|_| SqliteStoreError::Invalid("negative timestamp".to_string()))?;
    Ok(Timestamp::from_millis(millis))
}

/// Converts a `u64` sequence number to a storable `i64`.
fn seq_to_i64(seq: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(seq).map_err(|_| SqliteStoreError::Invalid("sequence overflow".to_string()))
}

/// Converts a stored `i64` sequence number back to `u64`.
fn seq_from_i64(raw: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(raw).map_err(|_| SqliteStoreError::Invalid("negative sequence".to_string()))
}

/// Serializes a value to a JSON string for storage.
fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, SqliteStoreError> {
    serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Deserializes a JSON string column back into a typed value.
fn from_json_text<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, SqliteStoreError> {
    serde_json::from_str(text).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a typed id column, mapping failures to [`SqliteStoreError::Invalid`].
fn parse_id<T>(text: &str, parse: impl Fn(&str) -> Result<T, runlog_core::core::identifiers::IdParseError>) -> Result<T, SqliteStoreError> {
    parse(text).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

// ============================================================================
// SECTION: Store Impl -- Projects & Threads
// ============================================================================

impl Store for SqliteStore {
    fn get_thread(&self, thread_id: ThreadId) -> Result<Thread, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT thread_id, project_id, owner_user_id, title FROM threads WHERE thread_id = ?1",
                params![thread_id.to_string()],
                |row| {
                    let thread_id: String = row.get(0)?;
                    let project_id: Option<String> = row.get(1)?;
                    let owner_user_id: Option<String> = row.get(2)?;
                    let title: String = row.get(3)?;
                    Ok((thread_id, project_id, owner_user_id, title))
                },
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((thread_id_text, project_id, owner_user_id, title)) = row else {
            return Err(SqliteStoreError::NotFound(format!("thread {thread_id}")).into());
        };
        Ok(Thread {
            thread_id: parse_id(&thread_id_text, ThreadId::parse)?,
            project_id: project_id.map(|v| parse_id(&v, ProjectId::parse)).transpose()?,
            owner_user_id: owner_user_id.map(|v| parse_id(&v, UserId::parse)).transpose()?,
            title,
        })
    }

    fn list_scope_grants(&self, project_id: ProjectId) -> Result<Vec<ScopeGrant>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT scope, granted_by, granted_at FROM scope_grants WHERE project_id = ?1")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![project_id.to_string()], |row| {
                let scope: String = row.get(0)?;
                let granted_by: String = row.get(1)?;
                let granted_at: i64 = row.get(2)?;
                Ok((scope, granted_by, granted_at))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut grants = Vec::new();
        for row in rows {
            let (scope, granted_by, granted_at) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            grants.push(ScopeGrant {
                project_id,
                scope,
                granted_by: parse_id(&granted_by, UserId::parse)?,
                granted_at: ts_from_i64(granted_at)?,
            });
        }
        Ok(grants)
    }

    // -- Runs -------------------------------------------------------------

    fn create_run(&self, run: Run) -> Result<Run, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO runs (run_id, thread_id, status, created_by_user_id, pins_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run.run_id.to_string(),
                run.thread_id.to_string(),
                run_status_label(run.status),
                run.created_by_user_id.to_string(),
                to_json_text(&run.pins)?,
                ts_to_i64(run.created_at)?,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        conn.execute(
            "INSERT INTO run_metrics (run_id, metrics_json) VALUES (?1, ?2)",
            params![run.run_id.to_string(), to_json_text(&RunMetrics::default())?],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(run)
    }

    fn get_run(&self, run_id: RunId) -> Result<Run, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Ok(fetch_run(&conn, run_id)?)
    }

    fn update_run_status(&self, run_id: RunId, status: RunStatus) -> Result<Run, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let changed = conn
            .execute(
                "UPDATE runs SET status = ?1 WHERE run_id = ?2",
                params![run_status_label(status), run_id.to_string()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(format!("run {run_id}")).into());
        }
        Ok(fetch_run(&conn, run_id)?)
    }

    fn list_runs_in_thread(&self, thread_id: ThreadId) -> Result<Vec<Run>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT run_id, thread_id, status, created_by_user_id, pins_json, created_at
                 FROM runs WHERE thread_id = ?1 ORDER BY created_at ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![thread_id.to_string()], map_run_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut runs = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            runs.push(build_run(raw)?);
        }
        Ok(runs)
    }

    fn get_run_metrics(&self, run_id: RunId) -> Result<RunMetrics, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Ok(fetch_run_metrics(&conn, run_id)?)
    }

    // -- Events -------------------------------------------------------------

    fn run_last_seq(&self, run_id: RunId) -> Result<u64, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        Ok(fetch_last_seq(&conn, run_id)?)
    }

    fn begin_run_write(&self, run_id: RunId) -> Result<Box<dyn RunWriteTransaction>, StoreError> {
        let mut conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        begin_immediate(&mut conn).map_err(|err| map_busy_to_contended(err, run_id))?;
        let seq = match fetch_last_seq(&conn, run_id) {
            Ok(seq) => seq,
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(err.into());
            }
        };
        let metrics = match fetch_run_metrics(&conn, run_id) {
            Ok(metrics) => metrics,
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(err.into());
            }
        };
        Ok(Box::new(SqliteRunWriteTransaction { conn: Some(conn), run_id, seq, metrics }))
    }

    fn list_events(&self, run_id: RunId, after_seq: u64) -> Result<Vec<Event>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT event_id, run_id, thread_id, project_id, seq, ts, kind, payload_json,
                        parent_event_id, correlation_id, actor, privacy, pins_json
                 FROM events WHERE run_id = ?1 AND seq > ?2 ORDER BY seq ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![run_id.to_string(), seq_to_i64(after_seq)?], map_event_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut events = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            events.push(build_event(raw)?);
        }
        Ok(events)
    }

    fn put_tool_correlation(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
        correlation: ToolCorrelation,
    ) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO tool_correlations (run_id, correlation_id, tool_call_event_id, tool_outcome_event_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(run_id, correlation_id) DO UPDATE SET
                tool_call_event_id = excluded.tool_call_event_id,
                tool_outcome_event_id = excluded.tool_outcome_event_id",
            params![
                run_id.to_string(),
                correlation_id.to_string(),
                correlation.tool_call_event_id.map(|id| id.to_string()),
                correlation.tool_outcome_event_id.map(|id| id.to_string()),
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn get_tool_correlation(
        &self,
        run_id: RunId,
        correlation_id: CorrelationId,
    ) -> Result<Option<ToolCorrelation>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT tool_call_event_id, tool_outcome_event_id FROM tool_correlations
                 WHERE run_id = ?1 AND correlation_id = ?2",
                params![run_id.to_string(), correlation_id.to_string()],
                |row| {
                    let call: Option<String> = row.get(0)?;
                    let outcome: Option<String> = row.get(1)?;
                    Ok((call, outcome))
                },
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((call, outcome)) = row else {
            return Ok(None);
        };
        Ok(Some(ToolCorrelation {
            tool_call_event_id: call.map(|v| parse_id(&v, EventId::parse)).transpose()?,
            tool_outcome_event_id: outcome.map(|v| parse_id(&v, EventId::parse)).transpose()?,
        }))
    }

    fn upsert_tool_metrics(&self, tool_id: &str, version: &str, metrics: ToolMetrics) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO tool_metrics (tool_id, version, metrics_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(tool_id, version) DO UPDATE SET metrics_json = excluded.metrics_json",
            params![tool_id, version, to_json_text(&metrics)?],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn list_tool_metrics(&self) -> Result<Vec<(String, String, ToolMetrics)>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT tool_id, version, metrics_json FROM tool_metrics")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![], |row| {
                let tool_id: String = row.get(0)?;
                let version: String = row.get(1)?;
                let metrics_json: String = row.get(2)?;
                Ok((tool_id, version, metrics_json))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let (tool_id, version, metrics_json) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            out.push((tool_id, version, from_json_text(&metrics_json)?));
        }
        Ok(out)
    }

    // -- Tools --------------------------------------------------------------

    fn get_manifest(&self, tool_id: &str, version: Option<&str>) -> Result<ToolManifest, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let manifest_json: Option<String> = if let Some(version) = version {
            conn.query_row(
                "SELECT manifest_json FROM tool_manifests WHERE tool_id = ?1 AND version = ?2",
                params![tool_id, version],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        } else {
            conn.query_row(
                "SELECT manifest_json FROM tool_manifests WHERE tool_id = ?1 ORDER BY version DESC LIMIT 1",
                params![tool_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?
        };
        let Some(manifest_json) = manifest_json else {
            return Err(SqliteStoreError::NotFound(format!("manifest {tool_id}")).into());
        };
        Ok(from_json_text(&manifest_json)?)
    }

    fn list_manifests(&self) -> Result<Vec<ToolManifest>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT manifest_json FROM tool_manifests ORDER BY tool_id, version")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let manifest_json = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            out.push(from_json_text(&manifest_json)?);
        }
        Ok(out)
    }

    // -- Approvals ------------------------------------------------------

    fn create_approval(&self, approval: Approval) -> Result<Approval, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO approvals
                (approval_id, run_id, correlation_id, tool_id, tool_version, inputs_json, status, tool_call_event_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                approval.approval_id.to_string(),
                approval.run_id.to_string(),
                approval.correlation_id.to_string(),
                approval.tool_id,
                approval.tool_version,
                to_json_text(&approval.inputs)?,
                approval_status_label(approval.status),
                approval.tool_call_event_id.to_string(),
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(approval)
    }

    fn get_approval(&self, approval_id: ApprovalId) -> Result<Approval, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT approval_id, run_id, correlation_id, tool_id, tool_version, inputs_json,
                        status, tool_call_event_id
                 FROM approvals WHERE approval_id = ?1",
                params![approval_id.to_string()],
                map_approval_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some(raw) = row else {
            return Err(SqliteStoreError::NotFound(format!("approval {approval_id}")).into());
        };
        Ok(build_approval(raw)?)
    }

    fn find_latest_approval(
        &self,
        run_id: RunId,
        tool_id: &str,
        tool_version: &str,
    ) -> Result<Option<Approval>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT approval_id, run_id, correlation_id, tool_id, tool_version, inputs_json,
                        status, tool_call_event_id
                 FROM approvals WHERE run_id = ?1 AND tool_id = ?2 AND tool_version = ?3
                 ORDER BY rowid DESC LIMIT 1",
                params![run_id.to_string(), tool_id, tool_version],
                map_approval_row,
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        row.map(build_approval).transpose().map_err(Into::into)
    }

    fn set_approval_status(&self, approval_id: ApprovalId, status: ApprovalStatus) -> Result<Approval, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let changed = conn
            .execute(
                "UPDATE approvals SET status = ?1 WHERE approval_id = ?2",
                params![approval_status_label(status), approval_id.to_string()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(format!("approval {approval_id}")).into());
        }
        self.get_approval(approval_id)
    }

    fn list_approvals(&self, run_id: RunId) -> Result<Vec<Approval>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT approval_id, run_id, correlation_id, tool_id, tool_version, inputs_json,
                        status, tool_call_event_id
                 FROM approvals WHERE run_id = ?1 ORDER BY rowid ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![run_id.to_string()], map_approval_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(build_approval(row.map_err(|err| SqliteStoreError::Db(err.to_string()))?)?);
        }
        Ok(out)
    }

    // -- Artifacts ------------------------------------------------------

    fn put_artifact(&self, artifact: Artifact) -> Result<Artifact, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let result = conn.execute(
            "INSERT INTO artifacts (artifact_id, kind, media_type, size, content_hash, storage_ref, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                artifact.artifact_id.to_string(),
                artifact.kind,
                artifact.media_type,
                i64::try_from(artifact.size).map_err(|_| SqliteStoreError::Invalid("artifact size overflow".to_string()))?,
                artifact.content_hash,
                artifact.storage_ref,
                artifact.created_by.to_string(),
            ],
        );
        match result {
            Ok(_) => Ok(artifact),
            Err(SqlError::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                let existing: (String, String, String, i64, String, String, String) = conn
                    .query_row(
                        "SELECT artifact_id, kind, media_type, size, content_hash, storage_ref, created_by
                         FROM artifacts WHERE content_hash = ?1",
                        params![artifact.content_hash],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?)),
                    )
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                Ok(Artifact {
                    artifact_id: parse_id(&existing.0, ArtifactId::parse)?,
                    kind: existing.1,
                    media_type: existing.2,
                    size: u64::try_from(existing.3).map_err(|_| SqliteStoreError::Invalid("negative artifact size".to_string()))?,
                    content_hash: existing.4,
                    storage_ref: existing.5,
                    created_by: parse_id(&existing.6, UserId::parse)?,
                })
            }
            Err(err) => Err(SqliteStoreError::Db(err.to_string()).into()),
        }
    }

    fn get_artifact(&self, artifact_id: ArtifactId) -> Result<Artifact, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT artifact_id, kind, media_type, size, content_hash, storage_ref, created_by
                 FROM artifacts WHERE artifact_id = ?1",
                params![artifact_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((id, kind, media_type, size, content_hash, storage_ref, created_by)) = row else {
            return Err(SqliteStoreError::NotFound(format!("artifact {artifact_id}")).into());
        };
        Ok(Artifact {
            artifact_id: parse_id(&id, ArtifactId::parse)?,
            kind,
            media_type,
            size: u64::try_from(size).map_err(|_| SqliteStoreError::Invalid("negative artifact size".to_string()))?,
            content_hash,
            storage_ref,
            created_by: parse_id(&created_by, UserId::parse)?,
        })
    }

    fn link_artifact(&self, link: ArtifactLink) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO artifact_links (run_id, event_id, artifact_id, source_event_id, correlation_id, tool_id, purpose)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                link.run_id.to_string(),
                link.event_id.to_string(),
                link.artifact_id.to_string(),
                link.source_event_id.map(|id| id.to_string()),
                link.correlation_id.map(|id| id.to_string()),
                link.tool_id,
                link.purpose,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn list_run_artifact_links(&self, run_id: RunId) -> Result<Vec<ArtifactLink>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT run_id, event_id, artifact_id, source_event_id, correlation_id, tool_id, purpose
                 FROM artifact_links WHERE run_id = ?1 ORDER BY rowid ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![run_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let (run_id, event_id, artifact_id, source_event_id, correlation_id, tool_id, purpose) =
                row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            out.push(ArtifactLink {
                run_id: parse_id(&run_id, RunId::parse)?,
                event_id: parse_id(&event_id, EventId::parse)?,
                artifact_id: parse_id(&artifact_id, ArtifactId::parse)?,
                source_event_id: source_event_id.map(|v| parse_id(&v, EventId::parse)).transpose()?,
                correlation_id: correlation_id.map(|v| parse_id(&v, CorrelationId::parse)).transpose()?,
                tool_id,
                purpose,
            });
        }
        Ok(out)
    }

    // -- Idempotency ------------------------------------------------------

    fn find_idempotency_record(
        &self,
        user_id: UserId,
        endpoint: &str,
        composite_key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT stored_response_json, created_at FROM idempotency_records
                 WHERE user_id = ?1 AND endpoint = ?2 AND composite_key = ?3",
                params![user_id.to_string(), endpoint, composite_key],
                |row| {
                    let response: String = row.get(0)?;
                    let created_at: i64 = row.get(1)?;
                    Ok((response, created_at))
                },
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((response, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(IdempotencyRecord {
            user_id,
            endpoint: endpoint.to_string(),
            composite_key: composite_key.to_string(),
            stored_response: from_json_text(&response)?,
            created_at: ts_from_i64(created_at)?,
        }))
    }

    fn put_idempotency_record(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO idempotency_records (user_id, endpoint, composite_key, stored_response_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id.to_string(),
                record.endpoint,
                record.composite_key,
                to_json_text(&record.stored_response)?,
                ts_to_i64(record.created_at)?,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    // -- Provenance Cache -------------------------------------------------

    fn get_provenance_cache(&self, run_id: RunId) -> Result<Option<ProvenanceCacheRow>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let row = conn
            .query_row(
                "SELECT last_seq, graph_blob_json, computed_at FROM provenance_cache WHERE run_id = ?1",
                params![run_id.to_string()],
                |row| {
                    let last_seq: i64 = row.get(0)?;
                    let graph_blob: String = row.get(1)?;
                    let computed_at: i64 = row.get(2)?;
                    Ok((last_seq, graph_blob, computed_at))
                },
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let Some((last_seq, graph_blob, computed_at)) = row else {
            return Ok(None);
        };
        Ok(Some(ProvenanceCacheRow {
            run_id,
            last_seq: seq_from_i64(last_seq)?,
            graph_blob: from_json_text(&graph_blob)?,
            computed_at: ts_from_i64(computed_at)?,
        }))
    }

    fn put_provenance_cache(&self, row: ProvenanceCacheRow) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO provenance_cache (run_id, last_seq, graph_blob_json, computed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(run_id) DO UPDATE SET
                last_seq = excluded.last_seq,
                graph_blob_json = excluded.graph_blob_json,
                computed_at = excluded.computed_at",
            params![
                row.run_id.to_string(),
                seq_to_i64(row.last_seq)?,
                to_json_text(&row.graph_blob)?,
                ts_to_i64(row.computed_at)?,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn invalidate_provenance_cache(&self, run_id: RunId) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute("DELETE FROM provenance_cache WHERE run_id = ?1", params![run_id.to_string()])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    // -- Notifications & Activity -----------------------------------------

    fn append_notification(&self, notification: Notification) -> Result<Notification, StoreError> {
        let mut conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let tx = conn.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let next_seq = next_counter(&tx, "notification_seq_counters", "user_id", &notification.user_id.to_string())?;
        tx.execute(
            "INSERT INTO notifications
                (notification_id, notification_seq, user_id, kind, payload_json, project_id, run_id, read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.notification_id.to_string(),
                seq_to_i64(next_seq)?,
                notification.user_id.to_string(),
                notification.kind,
                to_json_text(&notification.payload)?,
                notification.project_id.map(|id| id.to_string()),
                notification.run_id.map(|id| id.to_string()),
                notification.read_at.map(ts_to_i64).transpose()?,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(Notification { notification_seq: next_seq, ..notification })
    }

    fn list_notifications(&self, user_id: UserId, unread_only: bool, after_seq: u64) -> Result<Vec<Notification>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let sql = if unread_only {
            "SELECT notification_id, notification_seq, user_id, kind, payload_json, project_id, run_id, read_at
             FROM notifications WHERE user_id = ?1 AND notification_seq > ?2 AND read_at IS NULL
             ORDER BY notification_seq ASC"
        } else {
            "SELECT notification_id, notification_seq, user_id, kind, payload_json, project_id, run_id, read_at
             FROM notifications WHERE user_id = ?1 AND notification_seq > ?2
             ORDER BY notification_seq ASC"
        };
        let mut stmt = conn.prepare(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![user_id.to_string(), seq_to_i64(after_seq)?], map_notification_row)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(build_notification(row.map_err(|err| SqliteStoreError::Db(err.to_string()))?)?);
        }
        Ok(out)
    }

    fn count_run_notifications_by_kind(&self, run_id: RunId, kind: &str) -> Result<u64, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM notifications WHERE run_id = ?1 AND kind = ?2",
                params![run_id.to_string(), kind],
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(u64::try_from(count).map_err(|_| SqliteStoreError::Invalid("negative count".to_string()))?)
    }

    fn get_notification_state(&self, user_id: UserId) -> Result<NotificationState, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let seq: Option<i64> = conn
            .query_row(
                "SELECT last_seen_notification_seq FROM notification_state WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(NotificationState {
            user_id,
            last_seen_notification_seq: seq.map(seq_from_i64).transpose()?.unwrap_or(0),
        })
    }

    fn advance_notification_state(&self, user_id: UserId, up_to_seq: u64) -> Result<NotificationState, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO notification_state (user_id, last_seen_notification_seq) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET
                last_seen_notification_seq = MAX(last_seen_notification_seq, excluded.last_seen_notification_seq)",
            params![user_id.to_string(), seq_to_i64(up_to_seq)?],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        self.get_notification_state(user_id)
    }

    fn mark_notifications_read_by_id(&self, user_id: UserId, ids: &[NotificationId]) -> Result<(), StoreError> {
        let mut conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let tx = conn.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        for id in ids {
            tx.execute(
                "UPDATE notifications SET read_at = COALESCE(read_at, ?1) WHERE notification_id = ?2 AND user_id = ?3",
                params![0_i64, id.to_string(), user_id.to_string()],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn append_activity(&self, activity: Activity) -> Result<Activity, StoreError> {
        let mut conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let tx = conn.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let next_seq = next_counter(&tx, "activity_seq_counters", "project_id", &activity.project_id.to_string())?;
        tx.execute(
            "INSERT INTO activity (project_id, activity_seq, kind, ref_type, ref_id, actor_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                activity.project_id.to_string(),
                seq_to_i64(next_seq)?,
                activity.kind,
                activity.ref_type,
                activity.ref_id,
                activity.actor_id.to_string(),
                ts_to_i64(activity.created_at)?,
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(Activity { activity_seq: next_seq, ..activity })
    }

    fn list_activity(&self, project_id: ProjectId, after_seq: u64) -> Result<Vec<Activity>, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT project_id, activity_seq, kind, ref_type, ref_id, actor_id, created_at
                 FROM activity WHERE project_id = ?1 AND activity_seq > ?2 ORDER BY activity_seq ASC",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let rows = stmt
            .query_map(params![project_id.to_string(), seq_to_i64(after_seq)?], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let (project_id, activity_seq, kind, ref_type, ref_id, actor_id, created_at) =
                row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            out.push(Activity {
                project_id: parse_id(&project_id, ProjectId::parse)?,
                activity_seq: seq_from_i64(activity_seq)?,
                kind,
                ref_type,
                ref_id,
                actor_id: parse_id(&actor_id, UserId::parse)?,
                created_at: ts_from_i64(created_at)?,
            });
        }
        Ok(out)
    }

    // -- Counters & Gauges --------------------------------------------------

    fn increment_counter(&self, name: &str, delta: i64) -> Result<i64, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO counters (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = value + excluded.value",
            params![name, delta],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let value: i64 = conn
            .query_row("SELECT value FROM counters WHERE name = ?1", params![name], |row| row.get(0))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(value)
    }

    fn set_gauge(&self, name: &str, value: f64) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.execute(
            "INSERT INTO gauges (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
            params![name, value],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }

    fn snapshot_metrics(&self) -> Result<serde_json::Value, StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        let mut counters = serde_json::Map::new();
        {
            let mut stmt = conn.prepare("SELECT name, value FROM counters").map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            for row in rows {
                let (name, value) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                counters.insert(name, serde_json::Value::from(value));
            }
        }
        let mut gauges = serde_json::Map::new();
        {
            let mut stmt = conn.prepare("SELECT name, value FROM gauges").map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = stmt
                .query_map(params![], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            for row in rows {
                let (name, value) = row.map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                gauges.insert(name, serde_json::Value::from(value));
            }
        }
        Ok(serde_json::json!({ "counters": counters, "gauges": gauges }))
    }

    fn health_check(&self) -> Result<(), StoreError> {
        let conn = self.pool.get().map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        conn.query_row("SELECT 1", params![], |_| Ok(()))
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Mapping Helpers
// ============================================================================

/// Raw columns for a `runs` row, before typed-id/enum parsing.
type RunRow = (String, String, String, String, String, i64);

/// Maps a `runs` row to its raw column tuple.
fn map_run_row(row: &Row<'_>) -> SqlResult<RunRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

/// Builds a typed [`Run`] from its raw column tuple.
fn build_run(raw: RunRow) -> Result<Run, SqliteStoreError> {
    let (run_id, thread_id, status, created_by_user_id, pins_json, created_at) = raw;
    Ok(Run {
        run_id: parse_id(&run_id, RunId::parse)?,
        thread_id: parse_id(&thread_id, ThreadId::parse)?,
        status: parse_run_status(&status)?,
        created_by_user_id: parse_id(&created_by_user_id, UserId::parse)?,
        pins: from_json_text::<Pins>(&pins_json)?,
        created_at: ts_from_i64(created_at)?,
    })
}

/// Fetches a single run by id, or [`SqliteStoreError::NotFound`].
fn fetch_run(conn: &Connection, run_id: RunId) -> Result<Run, SqliteStoreError> {
    let raw = conn
        .query_row(
            "SELECT run_id, thread_id, status, created_by_user_id, pins_json, created_at
             FROM runs WHERE run_id = ?1",
            params![run_id.to_string()],
            map_run_row,
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let Some(raw) = raw else {
        return Err(SqliteStoreError::NotFound(format!("run {run_id}")));
    };
    build_run(raw)
}

/// Fetches a run's aggregate metrics row.
fn fetch_run_metrics(conn: &Connection, run_id: RunId) -> Result<RunMetrics, SqliteStoreError> {
    let metrics_json: Option<String> = conn
        .query_row("SELECT metrics_json FROM run_metrics WHERE run_id = ?1", params![run_id.to_string()], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let Some(metrics_json) = metrics_json else {
        return Err(SqliteStoreError::NotFound(format!("run metrics {run_id}")));
    };
    from_json_text(&metrics_json)
}

/// Fetches the run's current `seq` high-water mark (0 if no events).
fn fetch_last_seq(conn: &Connection, run_id: RunId) -> Result<u64, SqliteStoreError> {
    let max_seq: Option<i64> = conn
        .query_row("SELECT MAX(seq) FROM events WHERE run_id = ?1", params![run_id.to_string()], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    max_seq.map(seq_from_i64).transpose().map(|v| v.unwrap_or(0))
}

/// Raw columns for an `events` row.
#[allow(clippy::type_complexity, reason = "row shape mirrors the events table 1:1")]
type EventRow = (
    String,
    String,
    String,
    Option<String>,
    i64,
    i64,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

/// Maps an `events` row to its raw column tuple.
fn map_event_row(row: &Row<'_>) -> SqlResult<EventRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

/// Builds a typed [`Event`] from its raw column tuple.
fn build_event(raw: EventRow) -> Result<Event, SqliteStoreError> {
    let (event_id, run_id, thread_id, project_id, seq, ts, kind, payload_json, parent_event_id, correlation_id, actor, privacy, pins_json) = raw;
    Ok(Event {
        event_id: parse_id(&event_id, EventId::parse)?,
        run_id: parse_id(&run_id, RunId::parse)?,
        thread_id: parse_id(&thread_id, ThreadId::parse)?,
        project_id: project_id.map(|v| parse_id(&v, ProjectId::parse)).transpose()?,
        seq: seq_from_i64(seq)?,
        ts: ts_from_i64(ts)?,
        kind,
        payload: from_json_text(&payload_json)?,
        parent_event_id: parent_event_id.map(|v| parse_id(&v, EventId::parse)).transpose()?,
        correlation_id: correlation_id.map(|v| parse_id(&v, CorrelationId::parse)).transpose()?,
        actor: parse_actor(&actor)?,
        privacy: parse_privacy(&privacy)?,
        pins: from_json_text(&pins_json)?,
    })
}

/// Raw columns for an `approvals` row.
type ApprovalRow = (String, String, String, String, String, String, String, String);

/// Maps an `approvals` row to its raw column tuple.
fn map_approval_row(row: &Row<'_>) -> SqlResult<ApprovalRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?))
}

/// Builds a typed [`Approval`] from its raw column tuple.
fn build_approval(raw: ApprovalRow) -> Result<Approval, SqliteStoreError> {
    let (approval_id, run_id, correlation_id, tool_id, tool_version, inputs_json, status, tool_call_event_id) = raw;
    Ok(Approval {
        approval_id: parse_id(&approval_id, ApprovalId::parse)?,
        run_id: parse_id(&run_id, RunId::parse)?,
        correlation_id: parse_id(&correlation_id, CorrelationId::parse)?,
        tool_id,
        tool_version,
        inputs: from_json_text(&inputs_json)?,
        status: parse_approval_status(&status)?,
        tool_call_event_id: parse_id(&tool_call_event_id, EventId::parse)?,
    })
}

/// Raw columns for a `notifications` row.
#[allow(clippy::type_complexity, reason = "row shape mirrors the notifications table 1:1")]
type NotificationRow = (String, i64, String, String, String, Option<String>, Option<String>, Option<i64>);

/// Maps a `notifications` row to its raw column tuple.
fn map_notification_row(row: &Row<'_>) -> SqlResult<NotificationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?))
}

/// Builds a typed [`Notification`] from its raw column tuple.
fn build_notification(raw: NotificationRow) -> Result<Notification, SqliteStoreError> {
    let (notification_id, notification_seq, user_id, kind, payload_json, project_id, run_id, read_at) = raw;
    Ok(Notification {
        notification_id: parse_id(&notification_id, NotificationId::parse)?,
        notification_seq: seq_from_i64(notification_seq)?,
        user_id: parse_id(&user_id, UserId::parse)?,
        kind,
        payload: from_json_text(&payload_json)?,
        project_id: project_id.map(|v| parse_id(&v, ProjectId::parse)).transpose()?,
        run_id: run_id.map(|v| parse_id(&v, RunId::parse)).transpose()?,
        read_at: read_at.map(ts_from_i64).transpose()?,
    })
}

/// Allocates the next value from a per-key sequence counter table shaped
/// `(key_column TEXT PRIMARY KEY, next_seq INTEGER)`, starting at 1.
fn next_counter(tx: &Transaction<'_>, table: &str, key_column: &str, key: &str) -> Result<u64, SqliteStoreError> {
    tx.execute(
        &format!(
            "INSERT INTO {table} ({key_column}, next_seq) VALUES (?1, 1)
             ON CONFLICT({key_column}) DO UPDATE SET next_seq = next_seq + 1"
        ),
        params![key],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let next: i64 = tx
        .query_row(&format!("SELECT next_seq FROM {table} WHERE {key_column} = ?1"), params![key], |row| row.get(0))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    seq_from_i64(next)
}

// ============================================================================
// SECTION: Run Write Transaction
// ============================================================================

/// Issues `BEGIN IMMEDIATE`, acquiring SQLite's reserved write lock without
/// waiting on a prior read to finish.
fn begin_immediate(conn: &mut Connection) -> Result<(), SqliteStoreError> {
    conn.execute_batch("BEGIN IMMEDIATE").map_err(|err| SqliteStoreError::Db(err.to_string()))
}

/// Maps a `SQLITE_BUSY`/`SQLITE_LOCKED` failure from [`begin_immediate`] onto
/// [`StoreError::WriteContended`]; any other error passes through unchanged.
fn map_busy_to_contended(err: SqliteStoreError, run_id: RunId) -> StoreError {
    match &err {
        SqliteStoreError::Db(message) if message.to_lowercase().contains("busy") || message.to_lowercase().contains("locked") => {
            StoreError::WriteContended(format!("run {run_id} write lock busy"))
        }
        _ => err.into(),
    }
}

/// An open, exclusive per-run write transaction over a dedicated pooled
/// connection.
struct SqliteRunWriteTransaction {
    /// The checked-out connection, holding the `BEGIN IMMEDIATE` lock.
    /// `None` once [`RunWriteTransaction::commit`] has consumed it.
    conn: Option<r2d2::PooledConnection<SqliteConnectionManager>>,
    /// The run this transaction writes to.
    run_id: RunId,
    /// `seq` observed when the transaction opened.
    seq: u64,
    /// Aggregate metrics observed when the transaction opened.
    metrics: RunMetrics,
}

impl RunWriteTransaction for SqliteRunWriteTransaction {
    fn current_seq(&self) -> u64 {
        self.seq
    }

    fn current_metrics(&self) -> RunMetrics {
        self.metrics.clone()
    }

    fn commit(mut self: Box<Self>, event: Event, metrics: RunMetrics) -> Result<Event, StoreError> {
        let Some(conn) = self.conn.take() else {
            return Err(SqliteStoreError::Io("transaction already closed".to_string()).into());
        };
        let result = commit_event(&conn, self.run_id, &event, &metrics);
        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT").map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                Ok(event)
            }
            Err(err) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(err.into())
            }
        }
    }
}

impl Drop for SqliteRunWriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn.execute_batch("ROLLBACK");
        }
    }
}

/// Inserts the event row and upserts the run's aggregate metrics, inside the
/// caller's already-open `BEGIN IMMEDIATE` transaction.
fn commit_event(conn: &Connection, run_id: RunId, event: &Event, metrics: &RunMetrics) -> Result<(), SqliteStoreError> {
    conn.execute(
        "INSERT INTO events
            (event_id, run_id, thread_id, project_id, seq, ts, kind, payload_json,
             parent_event_id, correlation_id, actor, privacy, pins_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            event.event_id.to_string(),
            event.run_id.to_string(),
            event.thread_id.to_string(),
            event.project_id.map(|id| id.to_string()),
            seq_to_i64(event.seq)?,
            ts_to_i64(event.ts)?,
            event.kind,
            to_json_text(&event.payload)?,
            event.parent_event_id.map(|id| id.to_string()),
            event.correlation_id.map(|id| id.to_string()),
            actor_label(event.actor),
            privacy_label(event.privacy),
            to_json_text(&event.pins)?,
        ],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    conn.execute(
        "UPDATE run_metrics SET metrics_json = ?1 WHERE run_id = ?2",
        params![to_json_text(metrics)?, run_id.to_string()],
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
