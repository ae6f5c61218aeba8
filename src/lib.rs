//! Shiplist external API gateway.
//!
//! Third-party callers (developers and AI agents invoking named tools)
//! authenticate with a long-lived `sh_live_` bearer token, are authorized
//! against the token's granted scope set, and are throttled per token by
//! a fixed-window rate limiter. The directory application's CRUD handlers
//! sit behind this crate as collaborators; the gateway resolves the
//! principal, charges the budget, checks the scope, and dispatches.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod ops;
pub mod ratelimit;
pub mod store;

use auth::Verifier;
use ratelimit::{RateLimitConfig, RateLimiter};
use store::TokenStore;

pub use crate::gateway::OperationRegistry;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub store: Arc<dyn TokenStore>,
    pub verifier: Verifier,
    pub limiter: RateLimiter,
    pub rate_cfg: RateLimitConfig,
    pub registry: OperationRegistry,
    pub config: config::Config,
}

/// Assemble the full application router: health, management API under
/// `/api/v1`, and the gateway-mediated tool surface under `/v1`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api/v1", api::api_router(state.clone()))
        .nest("/v1", gateway::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// Middleware: injects a unique X-Request-Id into every response so
/// callers can correlate errors with gateway logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
