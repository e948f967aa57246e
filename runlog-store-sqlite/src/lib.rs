// runlog-store-sqlite/src/lib.rs
// ============================================================================
// Module: Run Event Substrate SQLite Store
// Description: Public API surface for the SQLite-backed Store implementation.
// Purpose: Expose SqliteStore and its configuration and error types.
// Dependencies: runlog_core, rusqlite, r2d2
// ============================================================================

//! ## Overview
//! `runlog-store-sqlite` implements `runlog_core::Store` against a single
//! `SQLite` database file in WAL mode. Callers depend on `runlog_core::Store`
//! directly; this crate only needs to be linked at the binary's composition
//! root.

mod error;
mod schema;
mod store;

pub use error::SqliteStoreError;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
