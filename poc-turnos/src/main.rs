//! poc-turnos - shift-assignment service
//!
//! Serves the volunteer directory, availability ledger, shift registry
//! and the assignment engine over HTTP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use poc_common::db::init_database;
use poc_turnos::config::{Config, ConfigOverrides};
use poc_turnos::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "poc-turnos")]
#[command(about = "Shift-assignment service for public outreach volunteers")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "POC_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "POC_DATABASE")]
    database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "POC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config,
        database_path: args.database,
        port: args.port,
    })
    .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let default_filter = format!(
        "poc_turnos={level},tower_http={level}",
        level = config.log_level
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting poc-turnos v{}", env!("CARGO_PKG_VERSION"));
    match &config.config_file {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }
    info!("Database path: {}", config.database_path.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    info!(
        db_timeout_ms = config.roster.db_timeout.as_millis() as u64,
        fairness_window_days = config.roster.fairness_window_days,
        default_capacity = config.roster.default_capacity,
        seeded = config.suggestion_seed.is_some(),
        "Engine settings"
    );

    let state = AppState::new(pool, config.roster, config.suggestion_seed);
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("poc-turnos listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
