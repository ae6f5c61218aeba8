use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// When set, rate-limit counters live in Redis and are shared across
    /// gateway instances. Unset means process-local counters (budgets
    /// reset on restart).
    pub redis_url: Option<String>,
    pub admin_key: String,
    /// Internal directory backend the registered operations forward to.
    pub backend_url: String,
    /// Default per-token rate limit (requests per window).
    pub default_rate_limit: u64,
    /// Window in seconds for the default rate limit.
    pub default_rate_limit_window_secs: u64,
}

const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_ADMIN_KEY";

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let admin_key =
        std::env::var("SHIPLIST_ADMIN_KEY").unwrap_or_else(|_| ADMIN_KEY_PLACEHOLDER.into());

    if admin_key == ADMIN_KEY_PLACEHOLDER {
        let env_mode = std::env::var("SHIPLIST_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "SHIPLIST_ADMIN_KEY is still the insecure placeholder. \
                 Set a proper key before running in production."
            );
        }
        eprintln!(
            "⚠️  SHIPLIST_ADMIN_KEY is not set — using insecure placeholder. Set a real key for production."
        );
    }

    Ok(Config {
        port: std::env::var("SHIPLIST_PORT")
            .unwrap_or_else(|_| "8088".into())
            .parse()
            .unwrap_or(8088),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/shiplist".into()),
        redis_url: std::env::var("REDIS_URL").ok(),
        admin_key,
        backend_url: std::env::var("SHIPLIST_BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4000".into()),
        default_rate_limit: std::env::var("SHIPLIST_DEFAULT_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100),
        default_rate_limit_window_secs: std::env::var("SHIPLIST_DEFAULT_RATE_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60),
    })
}
