use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{Counter, CounterStore};

/// Redis-backed counters for multi-instance deployments. INCR and the
/// window TTL are set in one Lua script so concurrent gateways observe
/// the same atomic count; the window clock is Redis's, read once per call
/// inside the script.
pub struct RedisCounters {
    conn: ConnectionManager,
    incr_script: redis::Script,
}

impl RedisCounters {
    pub fn new(conn: ConnectionManager) -> Self {
        let incr_script = redis::Script::new(
            r#"
            local current = redis.call("INCR", KEYS[1])
            if current == 1 then
                redis.call("PEXPIRE", KEYS[1], ARGV[1])
            end
            return {current, redis.call("PTTL", KEYS[1])}
        "#,
        );
        Self { conn, incr_script }
    }

    fn remaining_from_pttl(pttl_ms: i64, window: Duration) -> Duration {
        if pttl_ms > 0 {
            Duration::from_millis(pttl_ms as u64)
        } else {
            // PTTL is -1/-2 when the key lost its expiry or vanished
            // between calls; report a full window rather than zero.
            window
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounters {
    async fn incr(&self, key: &str, window: Duration) -> anyhow::Result<Counter> {
        let mut conn = self.conn.clone();
        let (count, pttl_ms): (u64, i64) = self
            .incr_script
            .key(key)
            .arg(window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;

        Ok(Counter {
            count,
            window_remaining: Self::remaining_from_pttl(pttl_ms, window),
        })
    }

    async fn peek(&self, key: &str, window: Duration) -> anyhow::Result<Counter> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        let pttl_ms: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;

        Ok(Counter {
            count: count.unwrap_or(0),
            window_remaining: Self::remaining_from_pttl(pttl_ms, window),
        })
    }

    async fn clear(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL").arg(key).query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
