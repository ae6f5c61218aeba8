//! Fixed-window rate limiting keyed by token id (or, for other limiter
//! instances, whatever identifier the call site chooses).
//!
//! The limiter never raises: a denied call is a normal `Decision`, and a
//! backend failure fails closed (denied), never open. Each `RateLimiter`
//! instance is its own counter namespace, so a stricter login limiter
//! keyed by normalized email shares nothing with the per-token limiter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCounters;
pub use self::redis::RedisCounters;

/// Per-call-site limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub limit: u64,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of a `check` or `status` call.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window resets. Present on every decision
    /// so response headers never need a second (charging) call.
    pub reset_secs: u64,
    /// Set only when denied.
    pub retry_after_secs: Option<u64>,
}

/// Counter snapshot returned by a backend.
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    pub count: u64,
    pub window_remaining: Duration,
}

/// Backend contract: an atomic read-modify-write counter per key.
///
/// `incr` must be atomic with respect to itself for the same key (no lost
/// increments under concurrency) and must not contend across different
/// keys. Both implementations read the clock once per call.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the key's counter, starting a fresh window if none exists
    /// or the previous one has elapsed. Returns the post-increment count.
    async fn incr(&self, key: &str, window: Duration) -> anyhow::Result<Counter>;

    /// Current count without incrementing.
    async fn peek(&self, key: &str, window: Duration) -> anyhow::Result<Counter>;

    /// Drop the counter entirely.
    async fn clear(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RateLimiter {
    counters: Arc<dyn CounterStore>,
    namespace: String,
}

impl RateLimiter {
    /// Process-local sharded counters. Budgets silently reset on restart;
    /// multi-instance deployments want `with_redis` instead.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self {
            counters: Arc::new(MemoryCounters::new()),
            namespace: namespace.into(),
        }
    }

    /// Redis-backed counters (atomic INCR + EXPIRE), shared across
    /// gateway instances.
    pub fn with_redis(namespace: impl Into<String>, conn: ::redis::aio::ConnectionManager) -> Self {
        Self {
            counters: Arc::new(RedisCounters::new(conn)),
            namespace: namespace.into(),
        }
    }

    #[cfg(test)]
    pub fn with_backend(namespace: impl Into<String>, counters: Arc<dyn CounterStore>) -> Self {
        Self {
            counters,
            namespace: namespace.into(),
        }
    }

    fn key(&self, identifier: &str) -> String {
        format!("rl:{}:{}", self.namespace, identifier)
    }

    /// Charge one request against `identifier` and decide.
    pub async fn check(&self, identifier: &str, cfg: &RateLimitConfig) -> Decision {
        let counter = match self.counters.incr(&self.key(identifier), cfg.window).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(identifier, "rate limit backend error, denying: {}", e);
                return Self::denied_closed(cfg);
            }
        };
        Self::decide(counter, cfg)
    }

    /// Current budget without charging — for composing response headers
    /// or dashboards.
    pub async fn status(&self, identifier: &str, cfg: &RateLimitConfig) -> Decision {
        let counter = match self.counters.peek(&self.key(identifier), cfg.window).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(identifier, "rate limit backend error, denying: {}", e);
                return Self::denied_closed(cfg);
            }
        };

        let reset_secs = ceil_secs(counter.window_remaining);
        if counter.count >= cfg.limit {
            Decision {
                allowed: false,
                limit: cfg.limit,
                remaining: 0,
                reset_secs,
                retry_after_secs: Some(reset_secs.max(1)),
            }
        } else {
            Decision {
                allowed: true,
                limit: cfg.limit,
                remaining: cfg.limit - counter.count,
                reset_secs,
                retry_after_secs: None,
            }
        }
    }

    /// Clear the counter. Used by tests and by call sites with their own
    /// bookkeeping (a login limiter resets on a verified-correct password).
    pub async fn reset(&self, identifier: &str) {
        if let Err(e) = self.counters.clear(&self.key(identifier)).await {
            tracing::warn!(identifier, "failed to reset rate limit counter: {}", e);
        }
    }

    fn decide(counter: Counter, cfg: &RateLimitConfig) -> Decision {
        let reset_secs = ceil_secs(counter.window_remaining);
        if counter.count > cfg.limit {
            Decision {
                allowed: false,
                limit: cfg.limit,
                remaining: 0,
                reset_secs,
                retry_after_secs: Some(reset_secs.max(1)),
            }
        } else {
            Decision {
                allowed: true,
                limit: cfg.limit,
                remaining: cfg.limit - counter.count,
                reset_secs,
                retry_after_secs: None,
            }
        }
    }

    fn denied_closed(cfg: &RateLimitConfig) -> Decision {
        let secs = ceil_secs(cfg.window).max(1);
        Decision {
            allowed: false,
            limit: cfg.limit,
            remaining: 0,
            reset_secs: secs,
            retry_after_secs: Some(secs),
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(Duration::from_secs(60)), 60);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }

    struct FailingCounters;

    #[async_trait]
    impl CounterStore for FailingCounters {
        async fn incr(&self, _: &str, _: Duration) -> anyhow::Result<Counter> {
            anyhow::bail!("backend unreachable")
        }
        async fn peek(&self, _: &str, _: Duration) -> anyhow::Result<Counter> {
            anyhow::bail!("backend unreachable")
        }
        async fn clear(&self, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("backend unreachable")
        }
    }

    /// An unreachable backend must deny, never allow.
    #[tokio::test]
    async fn backend_failure_fails_closed() {
        let limiter = RateLimiter::with_backend("t", Arc::new(FailingCounters));
        let cfg = RateLimitConfig::default();

        let decision = limiter.check("tok_x", &cfg).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_secs.unwrap() > 0);

        let status = limiter.status("tok_x", &cfg).await;
        assert!(!status.allowed);
    }
}
