use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::scope::Scope;

/// Gateway error taxonomy.
///
/// `MalformedCredential` and `InvalidCredential` are distinct internally
/// (the first never touches the store) but collapse to a single external
/// `UNAUTHORIZED` code so a caller cannot learn whether a rejected secret
/// corresponds to a real, expired, or revoked token.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed credential")]
    MalformedCredential,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("missing required scope '{required}'")]
    InsufficientScope { required: Scope },

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("upstream returned {status}")]
    Upstream {
        status: u16,
        body: serde_json::Value,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Upstream responses pass through with their original status and
        // body; everything else gets the gateway's structured error shape.
        if let AppError::Upstream { status, body } = &self {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            return (status, Json(body.clone())).into_response();
        }

        let (status, code, msg) = match &self {
            AppError::MalformedCredential | AppError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "invalid or missing credential".to_string(),
            ),
            AppError::InsufficientScope { required } => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                format!("token does not have the '{}' scope", required),
            ),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "rate limit exceeded".to_string(),
            ),
            AppError::UnknownOperation(name) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("unknown operation '{}'", name),
            ),
            AppError::InvalidBody(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("invalid request body: {}", detail),
            ),
            // Handled above; kept as a sane fallback for exhaustiveness.
            AppError::Upstream { .. } => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "upstream error".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": msg,
            }
        }));

        let mut response = (status, body).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("retry-after", val);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_and_invalid_collapse_to_unauthorized() {
        let a = AppError::MalformedCredential.into_response();
        let b = AppError::InvalidCredential.into_response();
        assert_eq!(a.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(b.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let resp = AppError::RateLimited {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get("retry-after").unwrap(), "42");
    }
}
