//! Permission scopes and the predicates the gateway evaluates them with.
//!
//! Pure functions over small sets — no state, no I/O. Every registered
//! operation declares exactly one required scope; `has_any`/`has_all` exist
//! for callers that compose multi-scope checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four operations a token can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    Create,
    Update,
    Delete,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::Read, Scope::Create, Scope::Update, Scope::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Create => "create",
            Scope::Update => "update",
            Scope::Delete => "delete",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Scope::Read),
            "create" => Ok(Scope::Create),
            "update" => Ok(Scope::Update),
            "delete" => Ok(Scope::Delete),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

/// True iff `required` is in the granted set.
pub fn has_permission(granted: &[Scope], required: Scope) -> bool {
    granted.contains(&required)
}

/// True iff the granted set intersects the required set.
pub fn has_any(granted: &[Scope], required: &[Scope]) -> bool {
    required.iter().any(|s| granted.contains(s))
}

/// True iff every required scope is granted. Vacuously true for an empty
/// required set.
pub fn has_all(granted: &[Scope], required: &[Scope]) -> bool {
    required.iter().all(|s| granted.contains(s))
}
