use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::scope::Scope;
use crate::auth::secret;
use crate::errors::AppError;
use crate::store::NewToken;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub owner_id: Uuid,
    pub name: String,
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenResponse {
    pub id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub secret_prefix: String,
    pub scopes: Vec<Scope>,
    pub expires_at: Option<DateTime<Utc>>,
    /// The full credential. Returned exactly once; the gateway stores only
    /// the prefix and a salted hash, so there is no way to see this again.
    pub token: String,
}

/// `POST /api/v1/tokens`
pub async fn create_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<CreateTokenResponse>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidBody("token name must not be empty".into()));
    }
    if req.scopes.is_empty() {
        return Err(AppError::InvalidBody(
            "token must be granted at least one scope".into(),
        ));
    }
    if let Some(exp) = req.expires_at {
        if exp <= Utc::now() {
            return Err(AppError::InvalidBody("expires_at is in the past".into()));
        }
    }

    let issued = secret::generate();
    let id = format!("tok_{}", Uuid::new_v4().simple());

    state
        .store
        .insert(&NewToken {
            id: id.clone(),
            owner_id: req.owner_id,
            name: req.name.clone(),
            secret_prefix: issued.secret_prefix.clone(),
            secret_hash: issued.secret_hash,
            scopes: req.scopes.clone(),
            expires_at: req.expires_at,
        })
        .await
        .map_err(AppError::Internal)?;

    tracing::info!(token_id = %id, owner_id = %req.owner_id, "token issued");

    Ok((
        StatusCode::CREATED,
        Json(CreateTokenResponse {
            id,
            owner_id: req.owner_id,
            name: req.name,
            secret_prefix: issued.secret_prefix,
            scopes: req.scopes,
            expires_at: req.expires_at,
            token: issued.plaintext,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListTokensQuery {
    pub owner_id: Uuid,
}

/// `GET /api/v1/tokens?owner_id=` — metadata only, never hashes.
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTokensQuery>,
) -> Result<Json<Value>, AppError> {
    let tokens = state
        .store
        .list_for_owner(query.owner_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "tokens": tokens })))
}

/// `DELETE /api/v1/tokens/:id` — one-way revocation.
pub async fn revoke_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let found = state.store.revoke(&id).await.map_err(AppError::Internal)?;
    if found {
        tracing::info!(token_id = %id, "token revoked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}
