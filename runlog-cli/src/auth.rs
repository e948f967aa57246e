// runlog-cli/src/auth.rs
// ============================================================================
// Module: Bearer Authority Loader
// Description: Parses RUNLOG_TOKENS into a BearerAuthority.
// Purpose: Let an operator configure the static token map without a code
//          change, matching the server's `BearerAuthority::new` contract.
// Dependencies: runlog-core, runlog-server
// ============================================================================

//! ## Overview
//! `RUNLOG_TOKENS` holds a comma-separated list of `token:user_id[:admin]`
//! entries, e.g. `RUNLOG_TOKENS="abc123:1:admin,def456:2"`. Malformed
//! entries are skipped with a warning rather than failing startup, since an
//! operator correcting one token shouldn't have to restart to fix a typo
//! in another.

use runlog_core::Id;
use runlog_core::UserId;
use runlog_server::auth::BearerAuthority;

/// Loads the static bearer-token map from `RUNLOG_TOKENS`.
#[must_use]
pub fn load_bearer_authority() -> BearerAuthority {
    let raw = std::env::var("RUNLOG_TOKENS").unwrap_or_default();
    let entries = raw.split(',').filter(|entry| !entry.trim().is_empty()).filter_map(parse_entry);
    BearerAuthority::new(entries)
}

fn parse_entry(entry: &str) -> Option<(String, UserId, bool)> {
    let mut parts = entry.trim().split(':');
    let token = parts.next()?.to_string();
    let user_id_text = parts.next()?;
    let user_id = UserId::from(Id::parse(user_id_text).ok()?);
    let is_admin = parts.next() == Some("admin");
    if token.is_empty() {
        return None;
    }
    Some((token, user_id, is_admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_entry() {
        let (token, _user_id, is_admin) = parse_entry("abc123:1:admin").expect("parses");
        assert_eq!(token, "abc123");
        assert!(is_admin);
    }

    #[test]
    fn parses_a_non_admin_entry() {
        let (_token, _user_id, is_admin) = parse_entry("abc123:1").expect("parses");
        assert!(!is_admin);
    }

    #[test]
    fn rejects_an_entry_with_no_user_id() {
        assert!(parse_entry("abc123").is_none());
    }

    #[test]
    fn rejects_an_entry_with_an_unparseable_user_id() {
        assert!(parse_entry("abc123:not-an-id").is_none());
    }
}
