use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use cuebus_core::config::CuebusConfig;
use cuebus_scheduler::{Dispatcher, Engine, OscUdpTransport};
use cuebus_store::SqliteRepository;

mod app;
mod http;
mod ws;

/// Timed OSC cue server.
#[derive(Debug, Parser)]
#[command(name = "cuebus-gateway", version)]
struct Args {
    /// Path to cuebus.toml (falls back to CUEBUS_CONFIG, then ~/.cuebus/cuebus.toml).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cuebus_gateway=info,cuebus_scheduler=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > CUEBUS_CONFIG env > ~/.cuebus/cuebus.toml
    let config_path = args.config.or_else(|| std::env::var("CUEBUS_CONFIG").ok());
    let config = CuebusConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        CuebusConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let repo = Arc::new(SqliteRepository::new(db)?);
    info!("database migrations complete");

    let transport = match OscUdpTransport::bind(&config.transport.bind).await {
        Ok(t) => t,
        Err(e) => {
            error!(bind = %config.transport.bind, error = %e, "failed to bind OSC socket");
            return Err(e.into());
        }
    };

    // the engine is only built once the initial load has completed
    let engine = match Engine::load(
        repo,
        Dispatcher::new(Arc::new(transport)),
        config.scheduler.clone(),
    ) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "failed to load groups and targets");
            return Err(e.into());
        }
    };

    let state = Arc::new(app::AppState::new(config, Arc::clone(&engine)));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("Cuebus gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown();
    info!("Cuebus gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
