use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{NewToken, TokenRecord, TokenStore};

/// DashMap-backed store with the same filtering semantics as `PgStore`.
/// Used by the test suites and `serve --in-memory` dev runs; state does
/// not survive a restart.
#[derive(Default)]
pub struct MemStore {
    tokens: DashMap<String, TokenRecord>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemStore {
    async fn insert(&self, token: &NewToken) -> anyhow::Result<()> {
        if self.tokens.contains_key(&token.id) {
            anyhow::bail!("duplicate token id '{}'", token.id);
        }
        self.tokens.insert(
            token.id.clone(),
            TokenRecord {
                id: token.id.clone(),
                owner_id: token.owner_id,
                name: token.name.clone(),
                secret_prefix: token.secret_prefix.clone(),
                secret_hash: token.secret_hash.clone(),
                scopes: token.scopes.clone(),
                created_at: Utc::now(),
                expires_at: token.expires_at,
                revoked_at: None,
                last_used_at: None,
            },
        );
        Ok(())
    }

    async fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<TokenRecord>> {
        let now = Utc::now();
        Ok(self
            .tokens
            .iter()
            .filter(|entry| entry.secret_prefix == prefix && entry.is_usable(now))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<TokenRecord>> {
        Ok(self.tokens.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<TokenRecord>> {
        let mut records: Vec<TokenRecord> = self
            .tokens
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn revoke(&self, id: &str) -> anyhow::Result<bool> {
        match self.tokens.get_mut(id) {
            Some(mut entry) => {
                if entry.revoked_at.is_none() {
                    entry.revoked_at = Some(Utc::now());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch_last_used(&self, id: &str) -> anyhow::Result<()> {
        if let Some(mut entry) = self.tokens.get_mut(id) {
            entry.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}
