//! Rate limiter contract tests against the in-process backend:
//! monotonicity, isolation, concurrent integrity, reset and status.

use std::time::Duration;

use gateway::ratelimit::{RateLimitConfig, RateLimiter};

fn cfg(limit: u64, window_secs: u64) -> RateLimitConfig {
    RateLimitConfig {
        limit,
        window: Duration::from_secs(window_secs),
    }
}

/// The worked example: limit=100, window=60s. 100 sequential calls are
/// allowed with `remaining` strictly descending 99→0; call #101 is denied
/// with positive retry guidance.
#[tokio::test]
async fn limit_allows_exactly_limit_calls_per_window() {
    let limiter = RateLimiter::in_memory("test");
    let cfg = cfg(100, 60);

    for expected_remaining in (0..100).rev() {
        let d = limiter.check("tok_abc", &cfg).await;
        assert!(d.allowed);
        assert_eq!(d.limit, 100);
        assert_eq!(d.remaining, expected_remaining);
    }

    let d = limiter.check("tok_abc", &cfg).await;
    assert!(!d.allowed);
    assert_eq!(d.remaining, 0);
    assert!(d.retry_after_secs.unwrap() > 0);
    assert!(d.retry_after_secs.unwrap() <= 60);
}

#[tokio::test]
async fn elapsed_window_grants_a_fresh_budget() {
    let limiter = RateLimiter::in_memory("test");
    let cfg = RateLimitConfig {
        limit: 2,
        window: Duration::from_millis(50),
    };

    assert!(limiter.check("tok_a", &cfg).await.allowed);
    assert!(limiter.check("tok_a", &cfg).await.allowed);
    assert!(!limiter.check("tok_a", &cfg).await.allowed);

    tokio::time::sleep(Duration::from_millis(70)).await;

    let d = limiter.check("tok_a", &cfg).await;
    assert!(d.allowed);
    assert_eq!(d.remaining, 1);
}

/// Exhausting one identifier never affects another's budget.
#[tokio::test]
async fn identifiers_are_isolated() {
    let limiter = RateLimiter::in_memory("test");
    let cfg = cfg(5, 60);

    for _ in 0..10 {
        limiter.check("tok_x", &cfg).await;
    }
    assert!(!limiter.check("tok_x", &cfg).await.allowed);

    let d = limiter.check("tok_y", &cfg).await;
    assert!(d.allowed);
    assert_eq!(d.remaining, 4);
}

/// Distinct limiter instances are distinct namespaces even for the same
/// identifier (the login limiter shares nothing with the token limiter).
#[tokio::test]
async fn namespaces_do_not_share_counters() {
    let tokens = RateLimiter::in_memory("gateway");
    let logins = RateLimiter::in_memory("login");
    let cfg = cfg(2, 60);

    tokens.check("alice@example.com", &cfg).await;
    tokens.check("alice@example.com", &cfg).await;
    assert!(!tokens.check("alice@example.com", &cfg).await.allowed);

    assert!(logins.check("alice@example.com", &cfg).await.allowed);
}

/// Under 3×limit concurrent calls for one identifier, exactly `limit`
/// are allowed — no lost increments, no double counting.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_checks_lose_no_increments() {
    let limiter = RateLimiter::in_memory("test");
    let cfg = cfg(50, 60);

    let mut handles = Vec::new();
    for _ in 0..150 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            limiter.check("tok_hot", &cfg).await.allowed
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 50);
}

#[tokio::test]
async fn status_reports_without_charging() {
    let limiter = RateLimiter::in_memory("test");
    let cfg = cfg(10, 60);

    limiter.check("tok_s", &cfg).await;
    limiter.check("tok_s", &cfg).await;

    for _ in 0..20 {
        let d = limiter.status("tok_s", &cfg).await;
        assert!(d.allowed);
        assert_eq!(d.remaining, 8);
        assert!(d.reset_secs > 0);
    }

    let d = limiter.check("tok_s", &cfg).await;
    assert_eq!(d.remaining, 7);
}

#[tokio::test]
async fn status_of_an_unseen_identifier_is_a_full_budget() {
    let limiter = RateLimiter::in_memory("test");
    let cfg = cfg(10, 60);

    let d = limiter.status("tok_new", &cfg).await;
    assert!(d.allowed);
    assert_eq!(d.remaining, 10);
    assert_eq!(d.reset_secs, 60);
}

/// Login-style bookkeeping: a verified-correct password clears the
/// counter so earlier failures stop counting against the caller.
#[tokio::test]
async fn reset_clears_the_counter() {
    let limiter = RateLimiter::in_memory("login");
    let cfg = cfg(3, 600);

    for _ in 0..5 {
        limiter.check("alice@example.com", &cfg).await;
    }
    assert!(!limiter.check("alice@example.com", &cfg).await.allowed);

    limiter.reset("alice@example.com").await;

    let d = limiter.check("alice@example.com", &cfg).await;
    assert!(d.allowed);
    assert_eq!(d.remaining, 2);
}
