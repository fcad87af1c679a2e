//! Users API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace span ─▶ metrics ─▶ router
//!                                                              │
//!                         ┌────────────────────────────────────┘
//!                         ▼
//!                     handlers ──▶ validation (domain)
//!                         │
//!                         ▼
//!                     UserStore ──▶ MongoDB (or in-memory)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use users_api::config;
use users_api::http::HttpServer;
use users_api::lifecycle::Shutdown;
use users_api::observability::{logging, metrics};
use users_api::store::{MemoryUserStore, MongoUserStore, UserStore};

#[derive(Parser, Debug)]
#[command(name = "users-api")]
#[command(about = "HTTP CRUD service for users and their addresses", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "USERS_API_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port (overrides config file and PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// Keep users in process memory instead of MongoDB.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = config::load_from_env(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logging::init_tracing(&config.observability);
    tracing::info!("users-api v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address(),
        database = %config.database.name,
        in_memory = args.in_memory,
        config_file = ?args.config,
        "Configuration loaded"
    );

    let store: Arc<dyn UserStore> = if args.in_memory {
        tracing::warn!("Using in-memory store; data is lost on exit");
        Arc::new(MemoryUserStore::new())
    } else {
        Arc::new(MongoUserStore::connect(&config.database).await?)
    };

    if config.observability.metrics_enabled {
        // Validated at load time.
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = HttpServer::new(config, store);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
