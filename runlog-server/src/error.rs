// runlog-server/src/error.rs
// ============================================================================
// Module: API Error
// Description: Maps every runtime error kind onto the stable error-kind
//              identifiers and an HTTP status.
// Purpose: One IntoResponse conversion every route handler funnels through,
//          so the wire contract of a failure never drifts per-endpoint.
// Dependencies: axum, runlog-core
// ============================================================================

//! ## Overview
//! Every business-rule failure a handler can hit is surfaced here as
//! `{"error": {"kind": "...", "message": "..."}}`; nothing is silently
//! dropped. The only local recovery already happened inside `EventLog`
//! (the `write_contended` retry loop) and `NotificationRouter` (the
//! best-effort `quota_exceeded` audit) before a handler ever sees an error.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use runlog_core::ApprovalLedgerError;
use runlog_core::EventLogError;
use runlog_core::IdempotencyError;
use runlog_core::NotificationError;
use runlog_core::ProvenanceError;
use runlog_core::StoreError;
use runlog_core::ToolExecutorError;
use serde::Serialize;

use crate::blobstore::BlobStoreError;

/// One stable-kind, HTTP-mappable API failure.
#[derive(Debug)]
pub struct ApiError {
    /// Stable error-kind identifier, matching spec section 7.
    kind: &'static str,
    /// Human-readable detail, safe to return to the caller.
    message: String,
    /// HTTP status this kind maps to.
    status: StatusCode,
}

impl ApiError {
    /// Builds an error with an explicit kind, status, and message.
    #[must_use]
    pub fn new(kind: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self { kind, status, message: message.into() }
    }

    /// `unauthenticated`: missing or invalid bearer token.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new("unauthenticated", StatusCode::UNAUTHORIZED, message)
    }

    /// `forbidden`: authenticated but not authorized for this action.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", StatusCode::FORBIDDEN, message)
    }

    /// `csrf_failed`: a same-origin write lacked a valid CSRF token.
    #[must_use]
    pub fn csrf_failed(message: impl Into<String>) -> Self {
        Self::new("csrf_failed", StatusCode::FORBIDDEN, message)
    }

    /// `too_many_concurrent_streams`: the per-user stream semaphore is full.
    #[must_use]
    pub fn too_many_concurrent_streams() -> Self {
        Self::new(
            "too_many_concurrent_streams",
            StatusCode::TOO_MANY_REQUESTS,
            "too many concurrent streams for this user",
        )
    }

    /// Wraps a free-form validation failure as `schema_violation`.
    #[must_use]
    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::new("schema_violation", StatusCode::BAD_REQUEST, message)
    }

    /// `run_not_found` / `artifact_not_found` / similar, for a missing path
    /// parameter that does not map to a [`StoreError`].
    #[must_use]
    pub fn not_found(kind: &'static str, message: impl Into<String>) -> Self {
        Self::new(kind, StatusCode::NOT_FOUND, message)
    }

    /// Stable kind identifier, for tests and logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = ErrorBody {
            error: ErrorDetail { kind: self.kind, message: self.message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => Self::new("run_not_found", StatusCode::NOT_FOUND, msg),
            StoreError::WriteContended(msg) => Self::new("write_contended", StatusCode::CONFLICT, msg),
            StoreError::Io(msg) | StoreError::Invalid(msg) => {
                Self::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

impl From<EventLogError> for ApiError {
    fn from(err: EventLogError) -> Self {
        let kind = err.error_kind();
        let status = match kind {
            "run_not_found" => StatusCode::NOT_FOUND,
            "schema_violation" => StatusCode::BAD_REQUEST,
            "quota_exceeded" => StatusCode::UNPROCESSABLE_ENTITY,
            "write_contended" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(leak_kind(kind), status, err.to_string())
    }
}

impl From<ToolExecutorError> for ApiError {
    fn from(err: ToolExecutorError) -> Self {
        let kind = err.error_kind();
        let status = match kind {
            "tool_not_found" | "pinned_version_missing" => StatusCode::NOT_FOUND,
            "schema_violation" => StatusCode::BAD_REQUEST,
            "policy_error" => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(leak_kind(kind), status, err.to_string())
    }
}

impl From<ApprovalLedgerError> for ApiError {
    fn from(err: ApprovalLedgerError) -> Self {
        let kind = err.error_kind();
        let status = match kind {
            "approval_not_found" => StatusCode::NOT_FOUND,
            "approval_denied" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(leak_kind(kind), status, err.to_string())
    }
}

impl From<ProvenanceError> for ApiError {
    fn from(err: ProvenanceError) -> Self {
        Self::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        Self::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<IdempotencyError> for ApiError {
    fn from(err: IdempotencyError) -> Self {
        Self::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<BlobStoreError> for ApiError {
    fn from(err: BlobStoreError) -> Self {
        match err {
            BlobStoreError::NotFound(msg) => Self::new("artifact_not_found", StatusCode::NOT_FOUND, msg),
            BlobStoreError::UnsafePath(msg) => Self::new("schema_violation", StatusCode::BAD_REQUEST, msg),
            BlobStoreError::Io(msg) => Self::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, msg),
        }
    }
}

/// `error_kind()` on the upstream error types returns `&'static str`
/// already; this just documents that the mapping here never re-labels a
/// kind it did not recognise under a different literal.
const fn leak_kind(kind: &'static str) -> &'static str {
    kind
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let err: ApiError = StoreError::NotFound("run".to_string()).into();
        assert_eq!(err.kind(), "run_not_found");
    }

    #[test]
    fn write_contended_maps_to_409() {
        let err: ApiError = StoreError::WriteContended("run".to_string()).into();
        assert_eq!(err.kind(), "write_contended");
    }
}
