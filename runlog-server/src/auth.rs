// runlog-server/src/auth.rs
// ============================================================================
// Module: Bearer Token Auth
// Description: Resolves an Authorization header into an authenticated user.
// Purpose: Implement the narrow bearer-token check External Interfaces
//          assumes; session issuance/renewal is out of scope.
// Dependencies: axum, runlog-core
// ============================================================================

//! ## Overview
//! [`BearerAuthority`] holds a static map from opaque bearer token to
//! [`UserId`], fingerprinted with sha256 for logging the way a leaked log
//! line never carries the token itself back out.

use std::collections::BTreeMap;

use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use runlog_core::UserId;
use sha2::Digest;
use sha2::Sha256;

use crate::error::ApiError;
use crate::state::AppState;

/// Static bearer-token-to-user map.
#[derive(Debug, Clone, Default)]
pub struct BearerAuthority {
    /// Token to user lookup.
    tokens: BTreeMap<String, UserId>,
    /// True if admin-gated endpoints should accept this user.
    admins: Vec<UserId>,
}

impl BearerAuthority {
    /// Builds an authority from a list of `(token, user_id, is_admin)`.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, UserId, bool)>) -> Self {
        let mut tokens = BTreeMap::new();
        let mut admins = Vec::new();
        for (token, user_id, is_admin) in entries {
            tokens.insert(token, user_id);
            if is_admin {
                admins.push(user_id);
            }
        }
        Self { tokens, admins }
    }

    fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.get(token).copied()
    }

    /// Returns true if `user_id` holds an admin-gated token.
    #[must_use]
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }
}

/// Authenticated caller, attached to request extensions by the extractor.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The resolved user.
    pub user_id: UserId,
    /// sha256 fingerprint of the bearer token, for audit logging.
    pub token_fingerprint: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AppState: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthenticated("missing authorization header"))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthenticated("authorization header is not a bearer token"))?
            .trim();
        if token.is_empty() {
            return Err(ApiError::unauthenticated("empty bearer token"));
        }
        let user_id = app_state
            .auth
            .resolve(token)
            .ok_or_else(|| ApiError::unauthenticated("invalid bearer token"))?;
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let token_fingerprint = hex_encode(&hasher.finalize());
        Ok(Self { user_id, token_fingerprint })
    }
}

/// Requires the caller to additionally hold an admin-gated token, for the
/// operational `system_config` endpoint.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !app_state.auth.is_admin(user.user_id) {
            return Err(ApiError::forbidden("admin token required"));
        }
        Ok(Self(user))
    }
}

/// Hex-encodes a digest without pulling in a dedicated hex crate, matching
/// `runlog_core::core::hashing`'s own manual encoding.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use runlog_core::Id;

    use super::*;

    #[test]
    fn resolves_a_registered_token() {
        let user = UserId::from(Id::from_raw(1));
        let authority = BearerAuthority::new([("tok-a".to_string(), user, false)]);
        assert_eq!(authority.resolve("tok-a"), Some(user));
    }

    #[test]
    fn rejects_an_unknown_token() {
        let authority = BearerAuthority::default();
        assert_eq!(authority.resolve("nope"), None);
    }

    #[test]
    fn admin_flag_is_tracked_per_user() {
        let admin = UserId::from(Id::from_raw(1));
        let member = UserId::from(Id::from_raw(2));
        let authority = BearerAuthority::new([
            ("tok-admin".to_string(), admin, true),
            ("tok-member".to_string(), member, false),
        ]);
        assert!(authority.is_admin(admin));
        assert!(!authority.is_admin(member));
    }
}
