//! Registry of the named operations the gateway can dispatch to.
//!
//! Operations are the out-of-scope collaborators (the directory's CRUD
//! handlers): each one declares exactly one required scope and receives
//! the resolved `AuthContext` plus the caller's JSON arguments. The
//! registry is built once at startup and read-only afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::auth::scope::Scope;
use crate::auth::AuthContext;
use crate::errors::AppError;

pub type OperationResult = Result<Value, AppError>;

type Handler = Arc<dyn Fn(AuthContext, Value) -> BoxFuture<'static, OperationResult> + Send + Sync>;

pub struct Operation {
    pub name: String,
    pub required_scope: Scope,
    handler: Handler,
}

impl Operation {
    pub async fn invoke(&self, ctx: AuthContext, args: Value) -> OperationResult {
        (self.handler)(ctx, args).await
    }
}

/// What tool discovery reports to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub required_scope: Scope,
}

#[derive(Default)]
pub struct OperationRegistry {
    ops: HashMap<String, Operation>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`. Re-registering a name replaces the
    /// previous handler.
    pub fn register<F, Fut>(&mut self, name: &str, required_scope: Scope, f: F)
    where
        F: Fn(AuthContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        self.ops.insert(
            name.to_string(),
            Operation {
                name: name.to_string(),
                required_scope,
                handler: Arc::new(move |ctx, args| Box::pin(f(ctx, args))),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.ops.get(name)
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<ToolDescriptor> = self
            .ops
            .values()
            .map(|op| ToolDescriptor {
                name: op.name.clone(),
                required_scope: op.required_scope,
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx() -> AuthContext {
        AuthContext {
            token_id: "tok_test".into(),
            owner_id: Uuid::new_v4(),
            scopes: vec![Scope::Read],
        }
    }

    #[tokio::test]
    async fn registered_operation_is_invokable() {
        let mut registry = OperationRegistry::new();
        registry.register("echo", Scope::Read, |ctx, args| async move {
            Ok(json!({ "owner": ctx.owner_id, "args": args }))
        });

        let op = registry.get("echo").unwrap();
        assert_eq!(op.required_scope, Scope::Read);
        let out = op.invoke(ctx(), json!({"x": 1})).await.unwrap();
        assert_eq!(out["args"]["x"], 1);
    }

    #[tokio::test]
    async fn list_is_sorted_and_complete() {
        let mut registry = OperationRegistry::new();
        registry.register("b.op", Scope::Delete, |_, _| async { Ok(Value::Null) });
        registry.register("a.op", Scope::Read, |_, _| async { Ok(Value::Null) });

        let tools = registry.list();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "a.op");
        assert_eq!(tools[1].name, "b.op");
    }

    #[test]
    fn unknown_operation_is_absent() {
        let registry = OperationRegistry::new();
        assert!(registry.get("nope").is_none());
        assert!(registry.is_empty());
    }
}
