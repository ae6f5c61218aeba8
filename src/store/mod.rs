//! Token persistence: the record shape, the store contract, and its two
//! implementations (Postgres for deployments, in-memory for tests and
//! `--in-memory` dev runs).

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::scope::Scope;

pub mod memory;
pub mod postgres;

pub use self::memory::MemStore;
pub use self::postgres::PgStore;

/// A persisted token. The plaintext secret is never part of this record;
/// only the 8-char lookup prefix and the salted hash survive issuance.
#[derive(Clone, Serialize)]
pub struct TokenRecord {
    pub id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub secret_prefix: String,
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub scopes: Vec<Scope>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    /// The lifecycle invariant: not revoked, and not past its expiry.
    /// Evaluated fresh against the caller's `now` on every request —
    /// there is no cached "valid" flag anywhere.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.map_or(true, |exp| exp > now)
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("secret_prefix", &self.secret_prefix)
            .field("secret_hash", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .field("revoked_at", &self.revoked_at)
            .finish_non_exhaustive()
    }
}

/// Insert payload for issuance.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub secret_prefix: String,
    pub secret_hash: String,
    pub scopes: Vec<Scope>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Storage contract consumed by the verifier and the management API.
///
/// `find_by_prefix` must be an indexed equality lookup on `secret_prefix`
/// — bounding the candidate set before the hash comparison is a required
/// property, not an optimization. Implementations may pre-filter dead
/// tokens; the verifier re-checks the lifecycle invariant on the match
/// regardless, to close the race against a just-now revocation.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, token: &NewToken) -> anyhow::Result<()>;

    /// All live tokens whose stored `secret_prefix` equals `prefix`.
    /// Normally zero or one row; collisions are tolerated.
    async fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<TokenRecord>>;

    async fn get(&self, id: &str) -> anyhow::Result<Option<TokenRecord>>;

    async fn list_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<TokenRecord>>;

    /// One-way: sets `revoked_at` if unset. Returns false when the token
    /// does not exist. Revoking an already-revoked token is a no-op that
    /// keeps the original timestamp.
    async fn revoke(&self, id: &str) -> anyhow::Result<bool>;

    /// Best-effort `last_used_at` bookkeeping; last writer wins. Never on
    /// the authentication decision path.
    async fn touch_last_used(&self, id: &str) -> anyhow::Result<()>;
}
