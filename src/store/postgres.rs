use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewToken, TokenRecord, TokenStore};
use crate::auth::scope::Scope;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Raw row shape; scopes come back as TEXT[] and are parsed into `Scope`
/// on the way out (unknown strings are dropped with a warning rather than
/// failing the whole token).
#[derive(sqlx::FromRow)]
struct TokenRow {
    id: String,
    owner_id: Uuid,
    name: String,
    secret_prefix: String,
    secret_hash: String,
    scopes: Vec<String>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        let scopes = row
            .scopes
            .iter()
            .filter_map(|s| match s.parse::<Scope>() {
                Ok(scope) => Some(scope),
                Err(_) => {
                    tracing::warn!(token_id = %row.id, scope = %s, "ignoring unknown scope on token");
                    None
                }
            })
            .collect();

        TokenRecord {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            secret_prefix: row.secret_prefix,
            secret_hash: row.secret_hash,
            scopes,
            created_at: row.created_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            last_used_at: row.last_used_at,
        }
    }
}

const TOKEN_COLUMNS: &str = "id, owner_id, name, secret_prefix, secret_hash, scopes, \
     created_at, expires_at, revoked_at, last_used_at";

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert(&self, token: &NewToken) -> anyhow::Result<()> {
        let scopes: Vec<String> = token.scopes.iter().map(|s| s.as_str().to_string()).collect();
        sqlx::query(
            r#"INSERT INTO tokens (id, owner_id, name, secret_prefix, secret_hash, scopes, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&token.id)
        .bind(token.owner_id)
        .bind(&token.name)
        .bind(&token.secret_prefix)
        .bind(&token.secret_hash)
        .bind(&scopes)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<Vec<TokenRecord>> {
        // Indexed equality on secret_prefix (idx_tokens_secret_prefix);
        // dead tokens are filtered here and re-checked by the verifier.
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens \
             WHERE secret_prefix = $1 \
               AND revoked_at IS NULL \
               AND (expires_at IS NULL OR expires_at > NOW())"
        ))
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<TokenRecord>> {
        let row = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TokenRecord::from))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<TokenRecord>> {
        let rows = sqlx::query_as::<_, TokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TokenRecord::from).collect())
    }

    async fn revoke(&self, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE tokens SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Distinguish "already revoked" (true, idempotent) from "no such
        // token" (false) for the management API.
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tokens WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn touch_last_used(&self, id: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE tokens SET last_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
