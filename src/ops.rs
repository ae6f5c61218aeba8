//! Wiring for the directory application's operations.
//!
//! The CRUD handlers themselves live in the Shiplist backend, not here:
//! the gateway forwards each named operation to an internal endpoint and
//! hands over the resolved principal via `X-Gateway-*` headers. The
//! backend is responsible for its own data access and ownership checks.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::auth::scope::Scope;
use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::gateway::registry::{OperationRegistry, OperationResult};

/// Thin HTTP client for the internal directory backend.
pub struct DirectoryBackend {
    client: reqwest::Client,
    base_url: String,
}

impl DirectoryBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn forward(
        &self,
        method: Method,
        path: &str,
        ctx: &AuthContext,
        args: Value,
    ) -> OperationResult {
        let scopes = ctx
            .scopes
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut req = self
            .client
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .header("x-gateway-token-id", &ctx.token_id)
            .header("x-gateway-owner-id", ctx.owner_id.to_string())
            .header("x-gateway-scopes", scopes);
        if !args.is_null() {
            req = req.json(&args);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::error!(%method, path, "directory backend unreachable: {}", e);
            AppError::Internal(anyhow::anyhow!("directory backend unreachable"))
        })?;

        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            Ok(body)
        } else {
            Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Register the directory operations with their declared scopes. Each
/// operation requires exactly one scope.
pub fn register_directory_ops(registry: &mut OperationRegistry, backend: Arc<DirectoryBackend>) {
    let ops: [(&str, Scope, Method, &str); 7] = [
        ("projects.list", Scope::Read, Method::GET, "/internal/projects"),
        ("projects.get", Scope::Read, Method::GET, "/internal/projects/one"),
        ("projects.create", Scope::Create, Method::POST, "/internal/projects"),
        ("projects.update", Scope::Update, Method::PATCH, "/internal/projects"),
        ("projects.delete", Scope::Delete, Method::DELETE, "/internal/projects"),
        ("comments.create", Scope::Create, Method::POST, "/internal/comments"),
        ("likes.toggle", Scope::Update, Method::POST, "/internal/likes/toggle"),
    ];

    for (name, scope, method, path) in ops {
        let backend = backend.clone();
        let path = path.to_string();
        registry.register(name, scope, move |ctx, args| {
            let backend = backend.clone();
            let method = method.clone();
            let path = path.clone();
            async move { backend.forward(method, &path, &ctx, args).await }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_directory_op_declares_one_scope() {
        let mut registry = OperationRegistry::new();
        let backend = Arc::new(DirectoryBackend::new("http://localhost:9999"));
        register_directory_ops(&mut registry, backend);

        assert_eq!(registry.len(), 7);
        assert_eq!(
            registry.get("projects.delete").unwrap().required_scope,
            Scope::Delete
        );
        assert_eq!(
            registry.get("projects.list").unwrap().required_scope,
            Scope::Read
        );
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let backend = DirectoryBackend::new("http://backend:4000/");
        assert_eq!(backend.base_url, "http://backend:4000");
    }
}
