//! The gateway entry point: verify → rate-limit → authorize → dispatch.
//!
//! Rate limiting runs after authentication and before authorization, so
//! an invalid token never consumes anyone's budget while a valid token
//! probing for scopes it lacks still pays the rate cost. Every stage
//! short-circuits with a terminal failure; none is re-entered.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::auth::scope;
use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::ratelimit::Decision;
use crate::AppState;

pub mod registry;

pub use self::registry::{OperationRegistry, OperationResult, ToolDescriptor};

/// External tool surface, mounted under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(invoke_tool))
}

/// `GET /v1/tools` — authenticated, rate-limited tool discovery. No scope
/// requirement: knowing which operations exist is not itself an operation.
async fn list_tools(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let ctx = match authenticate(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };

    let decision = state.limiter.check(&ctx.token_id, &state.rate_cfg).await;
    if !decision.allowed {
        return deny_rate_limited(&decision);
    }

    let body = Json(json!({ "tools": state.registry.list() }));
    with_rate_headers(body.into_response(), &decision)
}

/// `POST /v1/tools/:name` — the gateway-mediated operation call.
async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = match authenticate(&state, &headers).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };

    let decision = state.limiter.check(&ctx.token_id, &state.rate_cfg).await;
    if !decision.allowed {
        return deny_rate_limited(&decision);
    }

    let resp = match dispatch(&state, &name, ctx, &body).await {
        Ok(value) => Json(json!({ "result": value })).into_response(),
        Err(e) => e.into_response(),
    };
    with_rate_headers(resp, &decision)
}

/// Stages 3 and 4: authorization against the operation's declared scope,
/// then the handler itself. Runs only after the caller has been charged.
async fn dispatch(
    state: &AppState,
    name: &str,
    ctx: AuthContext,
    body: &Bytes,
) -> Result<Value, AppError> {
    let op = state
        .registry
        .get(name)
        .ok_or_else(|| AppError::UnknownOperation(name.to_string()))?;

    if !scope::has_permission(&ctx.scopes, op.required_scope) {
        tracing::debug!(
            token_id = %ctx.token_id,
            operation = %op.name,
            required = %op.required_scope,
            "scope check failed"
        );
        return Err(AppError::InsufficientScope {
            required: op.required_scope,
        });
    }

    let args: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|e| AppError::InvalidBody(e.to_string()))?
    };

    op.invoke(ctx, args).await
}

/// Stage 1: pull the bearer credential off the request and verify it.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, AppError> {
    let credential = extract_bearer(headers)?;
    state.verifier.verify(credential).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MalformedCredential)?;

    auth.strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AppError::MalformedCredential)
}

fn deny_rate_limited(decision: &Decision) -> Response {
    let err = AppError::RateLimited {
        retry_after_secs: decision.retry_after_secs.unwrap_or(1),
    };
    with_rate_headers(err.into_response(), decision)
}

/// Attach `X-RateLimit-*` to every gateway-mediated response, success or
/// denial, from the single decision already taken for this request.
fn with_rate_headers(mut resp: Response, decision: &Decision) -> Response {
    let headers = resp.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
    resp
}
