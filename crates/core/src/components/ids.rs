//! Identifier newtypes.
//!
//! Every persisted entity is keyed by a UUID. Identifiers use one *canonical* textual form,
//! **32 lowercase hexadecimal characters** with no hyphens, which is the value produced by
//! `Uuid::new_v4().simple().to_string()`.
//!
//! Externally supplied identifiers (REST paths, CLI arguments) must be in canonical form;
//! uppercase, hyphenated, wrong-length or non-hex strings are rejected by `parse`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::BackendError;

fn is_canonical(input: &str) -> bool {
    input.len() == 32 && input.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

macro_rules! canonical_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn uuid(&self) -> Uuid {
                self.0
            }

            /// Parses a canonical (32 lowercase hex) identifier.
            pub fn parse(input: &str) -> Result<Self, BackendError> {
                if !is_canonical(input) {
                    return Err(BackendError::InvalidInput(format!(
                        "{} must be 32 lowercase hex characters",
                        $label
                    )));
                }
                Uuid::parse_str(input).map(Self).map_err(|e| {
                    BackendError::InvalidInput(format!("invalid {}: {}", $label, e))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = BackendError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

canonical_id!(
    /// Identity of an incident; fixed once the metadata step has been submitted.
    IncidentId,
    "incident id"
);
canonical_id!(
    /// Identity of a generated clarification question.
    QuestionId,
    "question id"
);
canonical_id!(EnhancedNarrativeId, "enhanced narrative id");
canonical_id!(
    /// Identity of the analysis handoff created by a successful submission.
    HandoffId,
    "handoff id"
);

/// Opaque reference to a stored export document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(String);

impl StorageRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_canonical_and_parses_back() {
        let id = IncidentId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert_eq!(IncidentId::parse(&text).unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_hyphenated_and_uppercase() {
        let uuid = Uuid::new_v4();
        assert!(QuestionId::parse(&uuid.hyphenated().to_string()).is_err());
        assert!(QuestionId::parse(&uuid.simple().to_string().to_uppercase()).is_err());
        assert!(QuestionId::parse("not-an-id").is_err());
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let id = HandoffId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: HandoffId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
