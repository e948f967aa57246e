// runlog-server/src/routes/mod.rs
// ============================================================================
// Module: Route Handlers
// Description: One module per external-interface category from section 6.
// Purpose: Thin HTTP/JSON adapters over the runlog-core runtime.
// Dependencies: axum, runlog-core
// ============================================================================

pub mod activity;
pub mod approvals;
pub mod artifacts;
pub mod events;
pub mod provenance;
pub mod runs;
pub mod system;
pub mod tools;

use runlog_core::Id;

use crate::error::ApiError;

/// Parses a 32-hex-digit path segment into a typed id.
///
/// # Errors
///
/// Returns [`ApiError::schema_violation`] when `text` is not a valid id.
pub(crate) fn parse_id<T: From<Id>>(kind: &'static str, text: &str) -> Result<T, ApiError> {
    Id::parse(text)
        .map(T::from)
        .map_err(|_| ApiError::not_found(kind, format!("malformed id: {text}")))
}
