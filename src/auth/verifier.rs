//! Resolves a presented bearer credential to its owning principal.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::scope::Scope;
use super::secret::{self, CREDENTIAL_PREFIX, LOOKUP_PREFIX_LEN};
use crate::errors::AppError;
use crate::store::TokenStore;

/// What a successful verification hands to the rest of the pipeline and,
/// ultimately, to the dispatched operation handler.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub token_id: String,
    pub owner_id: Uuid,
    pub scopes: Vec<Scope>,
}

#[derive(Clone)]
pub struct Verifier {
    store: Arc<dyn TokenStore>,
}

impl Verifier {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Verify a presented credential.
    ///
    /// Strips the fixed prefix, narrows the candidate set via the indexed
    /// `secret_prefix` lookup, then compares the full secret against each
    /// candidate's salted hash in constant time. The lifecycle invariant
    /// is re-checked on the matched record: the store already filters dead
    /// tokens, but a revocation can land between the query and the hash
    /// comparison.
    ///
    /// Externally, "no such token", "wrong secret", "expired" and
    /// "revoked" are all `InvalidCredential` — callers must not be able
    /// to probe which secrets are close to real ones.
    pub async fn verify(&self, presented: &str) -> Result<AuthContext, AppError> {
        let Some(secret) = presented.strip_prefix(CREDENTIAL_PREFIX) else {
            return Err(AppError::MalformedCredential);
        };
        if secret.len() < LOOKUP_PREFIX_LEN || !secret.is_ascii() {
            return Err(AppError::MalformedCredential);
        }

        let candidates = self
            .store
            .find_by_prefix(&secret[..LOOKUP_PREFIX_LEN])
            .await
            .map_err(AppError::Internal)?;

        if candidates.len() > 1 {
            // Collisions are tolerated but rare; a sustained stream of
            // them would mean the prefix index has degraded.
            tracing::debug!(count = candidates.len(), "secret prefix collision");
        }

        let now = Utc::now();
        for candidate in candidates {
            if !secret::verify_secret(secret, &candidate.secret_hash) {
                continue;
            }
            if !candidate.is_usable(now) {
                return Err(AppError::InvalidCredential);
            }

            // Fire-and-forget bookkeeping: last_used_at is advisory and
            // must never affect the authentication result.
            let store = self.store.clone();
            let token_id = candidate.id.clone();
            tokio::spawn(async move {
                if let Err(e) = store.touch_last_used(&token_id).await {
                    tracing::debug!(token_id = %token_id, "failed to update last_used_at: {}", e);
                }
            });

            return Ok(AuthContext {
                token_id: candidate.id,
                owner_id: candidate.owner_id,
                scopes: candidate.scopes,
            });
        }

        Err(AppError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemStore, NewToken};
    use chrono::Duration;

    async fn issue(
        store: &MemStore,
        scopes: Vec<Scope>,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> (String, String, Uuid) {
        let issued = secret::generate();
        let owner = Uuid::new_v4();
        let id = format!("tok_{}", Uuid::new_v4().simple());
        store
            .insert(&NewToken {
                id: id.clone(),
                owner_id: owner,
                name: "test".into(),
                secret_prefix: issued.secret_prefix,
                secret_hash: issued.secret_hash,
                scopes,
                expires_at,
            })
            .await
            .unwrap();
        (id, issued.plaintext, owner)
    }

    #[tokio::test]
    async fn fresh_token_verifies_to_owner_and_scopes() {
        let store = Arc::new(MemStore::new());
        let (id, plaintext, owner) =
            issue(&store, vec![Scope::Read, Scope::Create], None).await;

        let verifier = Verifier::new(store);
        let ctx = verifier.verify(&plaintext).await.unwrap();
        assert_eq!(ctx.token_id, id);
        assert_eq!(ctx.owner_id, owner);
        assert_eq!(ctx.scopes, vec![Scope::Read, Scope::Create]);
    }

    #[tokio::test]
    async fn wrong_prefix_is_malformed() {
        let verifier = Verifier::new(Arc::new(MemStore::new()));
        let err = verifier.verify("sk_live_abcdef1234").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedCredential));

        let err = verifier.verify("sh_live_short").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedCredential));
    }

    #[tokio::test]
    async fn unknown_secret_is_invalid() {
        let verifier = Verifier::new(Arc::new(MemStore::new()));
        let err = verifier
            .verify("sh_live_0123456789abcdef0123456789abcdef01234567")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn revoked_token_stops_verifying() {
        let store = Arc::new(MemStore::new());
        let (id, plaintext, _) = issue(&store, vec![Scope::Read], None).await;

        let verifier = Verifier::new(store.clone());
        verifier.verify(&plaintext).await.unwrap();

        store.revoke(&id).await.unwrap();
        let err = verifier.verify(&plaintext).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn revoked_and_unknown_are_indistinguishable() {
        let store = Arc::new(MemStore::new());
        let (id, plaintext, _) = issue(&store, vec![Scope::Read], None).await;
        store.revoke(&id).await.unwrap();

        let verifier = Verifier::new(store);
        let revoked = verifier.verify(&plaintext).await.unwrap_err();
        let unknown = verifier
            .verify("sh_live_ffffffffffffffffffffffffffffffffffffffff")
            .await
            .unwrap_err();
        assert!(matches!(revoked, AppError::InvalidCredential));
        assert!(matches!(unknown, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn expiry_boundary() {
        let store = Arc::new(MemStore::new());
        let (_, expired, _) = issue(
            &store,
            vec![Scope::Read],
            Some(Utc::now() - Duration::seconds(1)),
        )
        .await;
        let (_, live, _) = issue(
            &store,
            vec![Scope::Read],
            Some(Utc::now() + Duration::hours(1)),
        )
        .await;
        let (_, eternal, _) = issue(&store, vec![Scope::Read], None).await;

        let verifier = Verifier::new(store);
        assert!(matches!(
            verifier.verify(&expired).await.unwrap_err(),
            AppError::InvalidCredential
        ));
        verifier.verify(&live).await.unwrap();
        verifier.verify(&eternal).await.unwrap();
    }

    #[tokio::test]
    async fn last_used_is_updated_after_success() {
        let store = Arc::new(MemStore::new());
        let (id, plaintext, _) = issue(&store, vec![Scope::Read], None).await;

        let verifier = Verifier::new(store.clone());
        verifier.verify(&plaintext).await.unwrap();

        // The update is spawned; give the runtime a moment to run it.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let record = store.get(&id).await.unwrap().unwrap();
        assert!(record.last_used_at.is_some());
    }
}
