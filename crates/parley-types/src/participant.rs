use std::fmt;

use serde::{Serialize, Serializer};

/// Registry key for a connected identity.
///
/// End-users and administrators share the same underlying id space, so the
/// kind is carried in the type instead of being glued onto the id string.
/// Only the wire rendering (`activeUsers` payloads) prefixes admin keys,
/// and nothing ever parses that prefix back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParticipantKey {
    User(String),
    Admin(String),
}

impl ParticipantKey {
    /// Build a key from connection parameters. `is_admin` comes in as the
    /// literal string `"true"` or is absent.
    pub fn from_connect_params(id: String, is_admin: bool) -> Self {
        if is_admin {
            Self::Admin(id)
        } else {
            Self::User(id)
        }
    }

    /// The un-namespaced identity, used for persistence and message fields.
    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Admin(id) => id,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin(_))
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => f.write_str(id),
            Self::Admin(id) => write!(f, "admin:{}", id),
        }
    }
}

impl Serialize for ParticipantKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
