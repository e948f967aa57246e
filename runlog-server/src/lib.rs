// runlog-server/src/lib.rs
// ============================================================================
// Module: Run Event Substrate HTTP/SSE Server
// Description: axum surface implementing the external interfaces over the
//              runlog-core runtime.
// Purpose: Crate root; wires config, auth, state, and routes together.
// Dependencies: axum, runlog-core, runlog-broker, runlog-contract
// ============================================================================

//! ## Overview
//! This crate is the HTTP/SSE front door onto `runlog-core`'s runtime.
//! Every handler is thin: it parses the request, calls into
//! `EventLog`/`ToolExecutor`/`ApprovalLedger`/`ProvenanceService`, and maps
//! the result onto the wire contract in [`error`]. The substrate's actual
//! rules live in `runlog-core`; this crate never re-implements them.

pub mod auth;
pub mod blobstore;
pub mod config;
pub mod error;
pub mod notify;
pub mod routes;
pub mod router;
pub mod security;
pub mod sse;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
