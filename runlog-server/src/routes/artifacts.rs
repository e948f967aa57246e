// runlog-server/src/routes/artifacts.rs
// ============================================================================
// Module: Artifact Routes
// Description: create_artifact, init_upload, put_part, finalize_upload,
//              get_artifact, list_run_artifacts, link_run_artifact.
// Purpose: HTTP surface over LocalDiskBlobStore and the Artifact/ArtifactLink
//          rows, including the single-shot and multipart upload paths.
// Dependencies: axum, base64, runlog-core
// ============================================================================

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use runlog_core::Actor;
use runlog_core::Artifact;
use runlog_core::ArtifactId;
use runlog_core::EventIntent;
use runlog_core::Id;
use runlog_core::Pins;
use runlog_core::Privacy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

/// Body for `create_artifact`.
#[derive(Debug, Deserialize)]
pub struct CreateArtifactRequest {
    /// Base64-encoded artifact bytes.
    pub content: String,
    /// Domain-level kind (e.g. `"image"`, `"document"`).
    pub kind: String,
    /// IANA media type.
    pub media_type: String,
    /// Human-readable title, carried in artifact metadata if the caller
    /// wants it recorded; the substrate itself treats it as opaque.
    #[serde(default)]
    pub title: Option<String>,
}

fn decode_content(content: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(content)
        .map_err(|err| ApiError::schema_violation(format!("content is not valid base64: {err}")))
}

fn check_size(state: &AppState, size: u64) -> Result<(), ApiError> {
    if size > state.config.artifact_max_bytes {
        return Err(ApiError::new(
            "artifact_too_large",
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("artifact of {size} bytes exceeds the {} byte limit", state.config.artifact_max_bytes),
        ));
    }
    Ok(())
}

fn store_bytes(state: &AppState, bytes: &[u8], kind: String, media_type: String, created_by: runlog_core::UserId) -> Result<Artifact, ApiError> {
    check_size(state, bytes.len() as u64)?;
    let content_hash = state.blobstore.put(bytes)?;
    let artifact = Artifact {
        artifact_id: ArtifactId::from(state.id_gen.generate()),
        kind,
        media_type,
        size: bytes.len() as u64,
        content_hash: content_hash.clone(),
        storage_ref: content_hash,
        created_by,
    };
    Ok(state.store.put_artifact(artifact)?)
}

/// Creates an artifact from inline base64 content.
///
/// # Errors
///
/// Returns [`ApiError`] if the content is malformed, too large, or the
/// store fails.
pub async fn create_artifact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateArtifactRequest>,
) -> Result<Json<Artifact>, ApiError> {
    let bytes = decode_content(&body.content)?;
    let artifact = store_bytes(&state, &bytes, body.kind, body.media_type, user.user_id)?;
    Ok(Json(artifact))
}

/// Response from `init_upload`.
#[derive(Debug, Serialize)]
pub struct InitUploadResponse {
    /// Opaque upload session id, passed to `put_part`/`finalize_upload`.
    pub upload_id: String,
    /// Maximum bytes accepted by one `put_part` call.
    pub part_size: u64,
}

/// Opens a multipart upload session.
///
/// # Errors
///
/// Never fails; kept fallible for symmetry with the other upload steps.
pub async fn init_upload(State(state): State<AppState>) -> Result<Json<InitUploadResponse>, ApiError> {
    let upload_id = Id::from(state.id_gen.generate()).to_string();
    state
        .uploads
        .lock()
        .map_err(|_| ApiError::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, "upload registry lock poisoned"))?
        .insert(upload_id.clone(), Vec::new());
    Ok(Json(InitUploadResponse { upload_id, part_size: state.config.artifact_part_size }))
}

/// Body for `put_part`.
#[derive(Debug, Deserialize)]
pub struct PutPartRequest {
    /// Base64-encoded part bytes.
    pub content: String,
}

/// Appends one part's bytes to an open upload session.
///
/// # Errors
///
/// Returns [`ApiError`] if the part is malformed, oversized, or the upload
/// id is unknown.
pub async fn put_part(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    Json(body): Json<PutPartRequest>,
) -> Result<StatusCode, ApiError> {
    let part = decode_content(&body.content)?;
    if part.len() as u64 > state.config.artifact_part_size {
        return Err(ApiError::new(
            "part_too_large",
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("part of {} bytes exceeds the {} byte limit", part.len(), state.config.artifact_part_size),
        ));
    }
    let mut uploads = state
        .uploads
        .lock()
        .map_err(|_| ApiError::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, "upload registry lock poisoned"))?;
    let buffer = uploads
        .get_mut(&upload_id)
        .ok_or_else(|| ApiError::not_found("artifact_not_found", format!("unknown upload id: {upload_id}")))?;
    buffer.extend_from_slice(&part);
    Ok(StatusCode::NO_CONTENT)
}

/// Body for `finalize_upload`.
#[derive(Debug, Deserialize)]
pub struct FinalizeUploadRequest {
    /// Domain-level kind.
    pub kind: String,
    /// IANA media type.
    pub media_type: String,
    /// Hex-encoded SHA-256 the caller expects the assembled bytes to hash
    /// to, for end-to-end integrity checking.
    #[serde(default)]
    pub expected_content_hash: Option<String>,
}

/// Assembles an upload session's parts into one artifact.
///
/// # Errors
///
/// Returns [`ApiError`] if the upload id is unknown, the assembled bytes
/// exceed `artifact_max_bytes`, or `expected_content_hash` does not match.
pub async fn finalize_upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(upload_id): Path<String>,
    Json(body): Json<FinalizeUploadRequest>,
) -> Result<Json<Artifact>, ApiError> {
    let bytes = state
        .uploads
        .lock()
        .map_err(|_| ApiError::new("execution_failed", StatusCode::INTERNAL_SERVER_ERROR, "upload registry lock poisoned"))?
        .remove(&upload_id)
        .ok_or_else(|| ApiError::not_found("artifact_not_found", format!("unknown upload id: {upload_id}")))?;
    if let Some(expected) = body.expected_content_hash {
        let actual = crate::blobstore::hash_bytes(&bytes);
        if actual != expected {
            return Err(ApiError::new(
                "hash_mismatch",
                StatusCode::CONFLICT,
                format!("assembled upload hashes to {actual}, expected {expected}"),
            ));
        }
    }
    let artifact = store_bytes(&state, &bytes, body.kind, body.media_type, user.user_id)?;
    Ok(Json(artifact))
}

/// Fetches an artifact's metadata row by id.
///
/// # Errors
///
/// Returns [`ApiError`] if `artifact_id` is malformed or the artifact does
/// not exist.
pub async fn get_artifact(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
) -> Result<Json<Artifact>, ApiError> {
    let artifact_id = parse_id("artifact_not_found", &artifact_id)?;
    Ok(Json(state.store.get_artifact(artifact_id)?))
}

/// Lists provenance links between a run's events and artifacts.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id` is malformed or the store fails.
pub async fn list_run_artifacts(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<runlog_core::ArtifactLink>>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    Ok(Json(state.store.list_run_artifact_links(run_id)?))
}

/// Body for `link_run_artifact`.
#[derive(Debug, Deserialize)]
pub struct LinkRunArtifactRequest {
    /// The artifact being linked.
    pub artifact_id: String,
    /// Human-readable purpose (e.g. `"output"`, `"attachment"`).
    #[serde(default = "default_purpose")]
    pub purpose: String,
    /// Producing tool, if any.
    #[serde(default)]
    pub tool_id: Option<String>,
}

fn default_purpose() -> String {
    "output".to_string()
}

/// Links an artifact into a run's provenance by appending an `artifact_ref`
/// event; `EventLog`'s post-commit side effects record the structured
/// [`runlog_core::ArtifactLink`] row.
///
/// # Errors
///
/// Returns [`ApiError`] if `run_id`/`artifact_id` are malformed or the
/// append fails.
pub async fn link_run_artifact(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Json(body): Json<LinkRunArtifactRequest>,
) -> Result<Json<runlog_core::Event>, ApiError> {
    let run_id = parse_id("run_not_found", &run_id)?;
    let artifact_id: ArtifactId = parse_id("artifact_not_found", &body.artifact_id)?;
    let event = state.event_log.append(EventIntent {
        run_id,
        kind: "artifact_ref".to_string(),
        payload: json!({
            "artifact_id": artifact_id.to_string(),
            "purpose": body.purpose,
            "tool_id": body.tool_id,
        }),
        actor: Actor::User,
        parent_event_id: None,
        correlation_id: None,
        privacy: Privacy::Standard,
        pins: Pins::default(),
        event_id: None,
        ts: None,
    })?;
    Ok(Json(event))
}
