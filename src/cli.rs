use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::auth::scope::Scope;

/// Shiplist — external API gateway for the Shiplist startup directory
#[derive(Parser)]
#[command(name = "shiplist-gw", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (overrides SHIPLIST_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Use an in-memory token store and counters (dev only; nothing
        /// survives a restart)
        #[arg(long)]
        in_memory: bool,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new token; the plaintext credential is printed exactly once
    Create {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        name: String,
        /// Comma-separated scopes: read,create,update,delete
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<Scope>,
        /// Optional expiry, in days from now
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// List tokens for an owner
    List {
        #[arg(long)]
        owner: Uuid,
    },
    /// Revoke a token (one-way)
    Revoke {
        #[arg(long)]
        id: String,
    },
}
