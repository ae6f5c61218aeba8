use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use gateway::auth::{secret, Verifier};
use gateway::cli::{Cli, Commands, TokenCommands};
use gateway::ops::{register_directory_ops, DirectoryBackend};
use gateway::OperationRegistry;
use gateway::ratelimit::{RateLimitConfig, RateLimiter};
use gateway::store::{MemStore, NewToken, PgStore, TokenStore};
use gateway::{config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port, in_memory }) => run_server(cfg, port, in_memory).await,
        Some(Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            handle_token_command(&db, command).await
        }
        None => run_server(cfg, None, false).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(
    cfg: config::Config,
    port_override: Option<u16>,
    in_memory: bool,
) -> anyhow::Result<()> {
    let store: Arc<dyn TokenStore> = if in_memory {
        tracing::warn!("running with an in-memory token store — nothing survives a restart");
        Arc::new(MemStore::new())
    } else {
        tracing::info!("connecting to database...");
        let db = PgStore::connect(&cfg.database_url).await?;
        tracing::info!("running migrations...");
        db.migrate().await?;
        Arc::new(db)
    };

    let limiter = match (&cfg.redis_url, in_memory) {
        (Some(url), false) => {
            tracing::info!("connecting to Redis for shared rate-limit counters...");
            let client = redis::Client::open(url.as_str())?;
            let conn = redis::aio::ConnectionManager::new(client).await?;
            RateLimiter::with_redis("gateway", conn)
        }
        _ => RateLimiter::in_memory("gateway"),
    };

    let mut registry = OperationRegistry::new();
    let backend = Arc::new(DirectoryBackend::new(cfg.backend_url.clone()));
    register_directory_ops(&mut registry, backend);
    tracing::info!(operations = registry.len(), "operation registry built");

    let rate_cfg = RateLimitConfig {
        limit: cfg.default_rate_limit,
        window: std::time::Duration::from_secs(cfg.default_rate_limit_window_secs),
    };

    let port = port_override.unwrap_or(cfg.port);
    let state = Arc::new(AppState {
        verifier: Verifier::new(store.clone()),
        store,
        limiter,
        rate_cfg,
        registry,
        config: cfg,
    });

    let app = gateway::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("shiplist gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_token_command(db: &PgStore, command: TokenCommands) -> anyhow::Result<()> {
    match command {
        TokenCommands::Create {
            owner,
            name,
            scopes,
            expires_in_days,
        } => {
            anyhow::ensure!(!scopes.is_empty(), "grant at least one scope");

            let issued = secret::generate();
            let id = format!("tok_{}", Uuid::new_v4().simple());
            let expires_at = expires_in_days.map(|d| Utc::now() + Duration::days(d));

            db.insert(&NewToken {
                id: id.clone(),
                owner_id: owner,
                name,
                secret_prefix: issued.secret_prefix,
                secret_hash: issued.secret_hash,
                scopes,
                expires_at,
            })
            .await?;

            println!(
                "Token created:\n  ID:  {}\n  Use: Authorization: Bearer {}\n\nThis is the only time the credential is shown. Store it now.",
                id, issued.plaintext
            );
        }
        TokenCommands::List { owner } => {
            let tokens = db.list_for_owner(owner).await?;
            if tokens.is_empty() {
                println!("No tokens for owner {}", owner);
            }
            for t in tokens {
                let state = if t.revoked_at.is_some() {
                    "revoked"
                } else if t.expires_at.is_some_and(|e| e <= Utc::now()) {
                    "expired"
                } else {
                    "active"
                };
                let scopes = t
                    .scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                println!(
                    "{}  {}  [{}]  {}…  {}",
                    t.id, state, scopes, t.secret_prefix, t.name
                );
            }
        }
        TokenCommands::Revoke { id } => {
            if db.revoke(&id).await? {
                println!("Token {} revoked", id);
            } else {
                println!("No such token: {}", id);
            }
        }
    }
    Ok(())
}
