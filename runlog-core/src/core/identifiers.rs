// runlog-core/src/core/identifiers.rs
// ============================================================================
// Module: Run Event Substrate Identifiers
// Description: Opaque 128-bit identifiers for runs, events, and related rows.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every entity in the substrate is addressed by an opaque 128-bit id. Ids
//! are generated by [`crate::core::time::IdGenerator`] and serialize as
//! lowercase hex strings; nothing in this module or its callers may rely on
//! an id's bit pattern carrying meaning (ordering is `seq`, not id value).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Raw 128-bit Id
// ============================================================================

/// Raw opaque 128-bit identifier, hex-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(u128);

impl Id {
    /// Wraps a raw 128-bit value.
    #[must_use]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Returns the raw 128-bit value.
    #[must_use]
    pub const fn as_raw(self) -> u128 {
        self.0
    }

    /// Parses a 32-character lowercase hex string into an id.
    ///
    /// # Errors
    ///
    /// Returns [`IdParseError`] when the string is not exactly 32 hex digits.
    pub fn parse(text: &str) -> Result<Self, IdParseError> {
        if text.len() != 32 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::Malformed(text.to_string()));
        }
        u128::from_str_radix(text, 16)
            .map(Self)
            .map_err(|_| IdParseError::Malformed(text.to_string()))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl Serialize for Id {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Error returned when an id fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// The string was not 32 lowercase hex digits.
    #[error("malformed id: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Typed Identifier Macro
// ============================================================================

/// Declares a newtype wrapper around [`Id`] with the standard conversions.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Id);

        impl $name {
            /// Wraps a raw opaque id.
            #[must_use]
            pub const fn new(id: Id) -> Self {
                Self(id)
            }

            /// Returns the underlying opaque id.
            #[must_use]
            pub const fn id(self) -> Id {
                self.0
            }

            /// Parses a 32-character lowercase hex string into this id type.
            ///
            /// # Errors
            ///
            /// Returns [`IdParseError`] when the string is not exactly 32 hex digits.
            pub fn parse(text: &str) -> Result<Self, IdParseError> {
                Id::parse(text).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Id> for $name {
            fn from(id: Id) -> Self {
                Self(id)
            }
        }
    };
}

typed_id!(ProjectId, "Identifier for a [`crate::core::model::Project`].");
typed_id!(ThreadId, "Identifier for a [`crate::core::model::Thread`].");
typed_id!(RunId, "Identifier for a [`crate::core::model::Run`].");
typed_id!(EventId, "Identifier for a [`crate::core::model::Event`].");
typed_id!(ArtifactId, "Content-hash identifier for an [`crate::core::model::Artifact`].");
typed_id!(CorrelationId, "Identifier grouping a `tool_call` with its outcome.");
typed_id!(ApprovalId, "Identifier for an [`crate::core::model::Approval`].");
typed_id!(NotificationId, "Identifier for a [`crate::core::model::Notification`].");
typed_id!(UserId, "Identifier for a user account.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = Id::from_raw(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(Id::parse(&text).unwrap_or_else(|_| panic!("parse")), id);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(Id::parse("too-short").is_err());
        assert!(Id::parse(&"z".repeat(32)).is_err());
    }

    #[test]
    fn typed_ids_serialize_as_plain_strings() {
        let run = RunId::new(Id::from_raw(42));
        let json = serde_json::to_string(&run).unwrap_or_else(|_| panic!("serialize"));
        assert_eq!(json, format!("\"{run}\""));
    }
}
