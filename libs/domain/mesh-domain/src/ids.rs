// [libs/domain/mesh-domain/src/ids.rs]
//! Identifier newtypes shared by every entity in the mesh.
//!
//! A bare `String` or `Uuid` threaded through the whole crate invites mixing
//! up a task id with an agent id at a call site; the newtypes below make
//! that a compile error instead of a 3am bug report.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(TaskId, "Opaque identifier for a [`crate::task::Task`].");
uuid_id!(AgentId, "Opaque identifier for a [`crate::agent::Agent`].");

/// A peer's 128-bit node id, represented as a UUID for convenience but never
/// treated as anything more than an opaque, totally-ordered bit string.
///
/// The bully election rule in the coordination layer compares `NodeId`s
/// lexicographically — the ordering on the wrapped `Uuid` (which itself
/// orders byte-for-byte) is exactly what that comparison needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_hyphenated(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
