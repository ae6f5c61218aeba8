use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Counter, CounterStore};

struct Window {
    started: Instant,
    count: u64,
}

/// In-process counters over a sharded concurrent map. The DashMap entry
/// guard makes the read-modify-write atomic per key while keys on
/// different shards never contend — one token's burst cannot serialize
/// another's.
#[derive(Default)]
pub struct MemoryCounters {
    windows: DashMap<String, Window>,
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounters {
    async fn incr(&self, key: &str, window: Duration) -> anyhow::Result<Counter> {
        // Single clock read per call: a burst straddling the window edge
        // is attributed by this one observation, not re-read mid-decision.
        let now = Instant::now();

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;

        Ok(Counter {
            count: entry.count,
            window_remaining: window.saturating_sub(now.duration_since(entry.started)),
        })
    }

    async fn peek(&self, key: &str, window: Duration) -> anyhow::Result<Counter> {
        let now = Instant::now();
        let counter = match self.windows.get(key) {
            Some(entry) if now.duration_since(entry.started) < window => Counter {
                count: entry.count,
                window_remaining: window.saturating_sub(now.duration_since(entry.started)),
            },
            // Absent or elapsed: the next incr starts a fresh window.
            _ => Counter {
                count: 0,
                window_remaining: window,
            },
        };
        Ok(counter)
    }

    async fn clear(&self, key: &str) -> anyhow::Result<()> {
        self.windows.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_counts_within_a_window() {
        let counters = MemoryCounters::new();
        let window = Duration::from_secs(60);
        for expected in 1..=5 {
            let c = counters.incr("k", window).await.unwrap();
            assert_eq!(c.count, expected);
            assert!(c.window_remaining <= window);
        }
    }

    #[tokio::test]
    async fn elapsed_window_restarts_at_one() {
        let counters = MemoryCounters::new();
        let window = Duration::from_millis(30);
        counters.incr("k", window).await.unwrap();
        counters.incr("k", window).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let c = counters.incr("k", window).await.unwrap();
        assert_eq!(c.count, 1);
    }

    #[tokio::test]
    async fn peek_does_not_charge() {
        let counters = MemoryCounters::new();
        let window = Duration::from_secs(60);
        counters.incr("k", window).await.unwrap();

        for _ in 0..10 {
            let c = counters.peek("k", window).await.unwrap();
            assert_eq!(c.count, 1);
        }
        assert_eq!(counters.incr("k", window).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn peek_of_absent_key_is_zero_with_full_window() {
        let counters = MemoryCounters::new();
        let window = Duration::from_secs(60);
        let c = counters.peek("nope", window).await.unwrap();
        assert_eq!(c.count, 0);
        assert_eq!(c.window_remaining, window);
    }

    #[tokio::test]
    async fn clear_drops_the_counter() {
        let counters = MemoryCounters::new();
        let window = Duration::from_secs(60);
        counters.incr("k", window).await.unwrap();
        counters.clear("k").await.unwrap();
        assert_eq!(counters.incr("k", window).await.unwrap().count, 1);
    }
}
