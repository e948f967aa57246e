// runlog-store-sqlite/src/schema.rs
// ============================================================================
// Module: Schema
// Description: SQLite DDL and schema-version bootstrap/migration.
// Purpose: Keep table shape and migration logic in one place, away from the
//          Store trait implementation.
// Dependencies: rusqlite
// ============================================================================

use r2d2_sqlite::rusqlite::Connection;
use r2d2_sqlite::rusqlite::OptionalExtension;
use r2d2_sqlite::rusqlite::params;

use crate::error::SqliteStoreError;

/// Current schema version. Bump alongside a migration arm in
/// [`initialize_schema`].
const SCHEMA_VERSION: i64 = 1;

/// Creates the schema on a fresh database, or validates the version of an
/// existing one.
///
/// # Errors
///
/// Returns [`SqliteStoreError`] on any DDL failure or version mismatch.
pub fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            create_tables(&tx)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}

/// Issues every `CREATE TABLE`/`CREATE INDEX` statement for a fresh database.
fn create_tables(tx: &r2d2_sqlite::rusqlite::Transaction<'_>) -> Result<(), SqliteStoreError> {
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS threads (
            thread_id TEXT PRIMARY KEY,
            project_id TEXT,
            owner_user_id TEXT,
            title TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS scope_grants (
            project_id TEXT NOT NULL,
            scope TEXT NOT NULL,
            granted_by TEXT NOT NULL,
            granted_at INTEGER NOT NULL,
            PRIMARY KEY (project_id, scope)
        );
        CREATE TABLE IF NOT EXISTS runs (
            run_id TEXT PRIMARY KEY,
            thread_id TEXT NOT NULL,
            status TEXT NOT NULL,
            created_by_user_id TEXT NOT NULL,
            pins_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_runs_thread ON runs (thread_id);
        CREATE TABLE IF NOT EXISTS run_metrics (
            run_id TEXT PRIMARY KEY,
            metrics_json TEXT NOT NULL,
            FOREIGN KEY (run_id) REFERENCES runs(run_id) ON DELETE CASCADE
        );
        CREATE TABLE IF NOT EXISTS events (
            event_id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            thread_id TEXT NOT NULL,
            project_id TEXT,
            seq INTEGER NOT NULL,
            ts INTEGER NOT NULL,
            kind TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            parent_event_id TEXT,
            correlation_id TEXT,
            actor TEXT NOT NULL,
            privacy TEXT NOT NULL,
            pins_json TEXT NOT NULL,
            UNIQUE (run_id, seq)
        );
        CREATE INDEX IF NOT EXISTS idx_events_run_seq ON events (run_id, seq);
        CREATE TABLE IF NOT EXISTS tool_correlations (
            run_id TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            tool_call_event_id TEXT,
            tool_outcome_event_id TEXT,
            PRIMARY KEY (run_id, correlation_id)
        );
        CREATE TABLE IF NOT EXISTS tool_metrics (
            tool_id TEXT NOT NULL,
            version TEXT NOT NULL,
            metrics_json TEXT NOT NULL,
            PRIMARY KEY (tool_id, version)
        );
        CREATE TABLE IF NOT EXISTS tool_manifests (
            tool_id TEXT NOT NULL,
            version TEXT NOT NULL,
            manifest_json TEXT NOT NULL,
            PRIMARY KEY (tool_id, version)
        );
        CREATE TABLE IF NOT EXISTS approvals (
            approval_id TEXT PRIMARY KEY,
            run_id TEXT NOT NULL,
            correlation_id TEXT NOT NULL,
            tool_id TEXT NOT NULL,
            tool_version TEXT NOT NULL,
            inputs_json TEXT NOT NULL,
            status TEXT NOT NULL,
            tool_call_event_id TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_approvals_run ON approvals (run_id);
        CREATE INDEX IF NOT EXISTS idx_approvals_lookup
            ON approvals (run_id, tool_id, tool_version);
        CREATE TABLE IF NOT EXISTS artifacts (
            artifact_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            media_type TEXT NOT NULL,
            size INTEGER NOT NULL,
            content_hash TEXT NOT NULL UNIQUE,
            storage_ref TEXT NOT NULL,
            created_by TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS artifact_links (
            run_id TEXT NOT NULL,
            event_id TEXT NOT NULL,
            artifact_id TEXT NOT NULL,
            source_event_id TEXT,
            correlation_id TEXT,
            tool_id TEXT,
            purpose TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_artifact_links_run ON artifact_links (run_id);
        CREATE TABLE IF NOT EXISTS idempotency_records (
            user_id TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            composite_key TEXT NOT NULL,
            stored_response_json TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, endpoint, composite_key)
        );
        CREATE TABLE IF NOT EXISTS provenance_cache (
            run_id TEXT PRIMARY KEY,
            last_seq INTEGER NOT NULL,
            graph_blob_json TEXT NOT NULL,
            computed_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS notifications (
            notification_id TEXT PRIMARY KEY,
            notification_seq INTEGER NOT NULL,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            project_id TEXT,
            run_id TEXT,
            read_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user_seq
            ON notifications (user_id, notification_seq);
        CREATE TABLE IF NOT EXISTS notification_state (
            user_id TEXT PRIMARY KEY,
            last_seen_notification_seq INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS notification_seq_counters (
            user_id TEXT PRIMARY KEY,
            next_seq INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS activity (
            project_id TEXT NOT NULL,
            activity_seq INTEGER NOT NULL,
            kind TEXT NOT NULL,
            ref_type TEXT NOT NULL,
            ref_id TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (project_id, activity_seq)
        );
        CREATE TABLE IF NOT EXISTS activity_seq_counters (
            project_id TEXT PRIMARY KEY,
            next_seq INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS gauges (
            name TEXT PRIMARY KEY,
            value REAL NOT NULL
        );",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))
}
