// runlog-server/src/security.rs
// ============================================================================
// Module: CORS & Trusted Host
// Description: Origin allow-list and Host-header validation for the HTTP
//              surface.
// Purpose: Reject cross-origin and spoofed-Host requests per section 10's
//          CORS + trusted-host posture.
// Dependencies: axum, tower-http
// ============================================================================

//! ## Overview
//! [`cors_layer`] builds a [`tower_http::cors::CorsLayer`] restricted to the
//! configured origin allow-list; an empty list permits no cross-origin
//! requests at all. [`trusted_host_guard`] rejects any request whose `Host`
//! header is not in the configured allow-list with `400 Bad Request`,
//! fail-closed, before it reaches a route handler.

use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::HOST;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use tower_http::cors::AllowHeaders;
use tower_http::cors::AllowMethods;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Builds a `CorsLayer` that permits only the configured origins.
#[must_use]
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins.iter().filter_map(|origin| origin.parse::<HeaderValue>().ok()).collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Rejects any request whose `Host` header is not in
/// [`crate::config::ServerConfig::trusted_hosts`]. A missing `Host` header
/// or a mismatched one is rendered as `400 Bad Request` directly rather
/// than reaching a handler.
pub async fn trusted_host_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let host = request.headers().get(HOST).and_then(|value| value.to_str().ok()).map(|value| {
        value.rsplit_once(':').map_or(value, |(host, _port)| host)
    });
    let is_trusted = host.is_some_and(|host| {
        state.config.trusted_hosts.iter().any(|trusted| trusted.eq_ignore_ascii_case(host))
    });
    if !is_trusted {
        return (StatusCode::BAD_REQUEST, "untrusted host header").into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_builds_from_an_origin_list() {
        let _ = cors_layer(&["http://localhost:5173".to_string()]);
    }

    #[test]
    fn cors_layer_tolerates_an_empty_allow_list() {
        let _ = cors_layer(&[]);
    }
}
