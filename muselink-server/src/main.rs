//! MuseLink server - Main entry point
//!
//! Resolves configuration, opens (or creates) the database, bootstraps the
//! admin account and serves the HTTP API until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use muselink_common::config::{load_toml_config, CliOverrides, ServerConfig};
use muselink_common::db::init_database;
use muselink_server::services::accounts;
use muselink_server::{build_router, AppState};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when neither RUST_LOG nor the config file sets one
const DEFAULT_LOG_FILTER: &str = "muselink_server=info,muselink_common=info,tower_http=info";

/// Command-line arguments for muselink
#[derive(Parser, Debug)]
#[command(name = "muselink")]
#[command(about = "MuseLink marketplace server")]
#[command(version)]
struct Args {
    /// Folder holding the database
    #[arg(short, long, env = "MUSELINK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "MUSELINK_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "MUSELINK_PORT")]
    port: Option<u16>,

    /// TOML config file
    #[arg(short, long, env = "MUSELINK_CONFIG")]
    config: Option<PathBuf>,

    /// Email of the admin account created at startup
    #[arg(long, env = "MUSELINK_ADMIN_EMAIL")]
    admin_email: Option<String>,

    /// Password of the admin account created at startup
    #[arg(long, env = "MUSELINK_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config file first: it may carry the log level
    let toml_config =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;

    let fallback_filter = toml_config
        .logging
        .level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MuseLink server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::resolve(
        CliOverrides {
            root_folder: args.root_folder,
            host: args.host,
            port: args.port,
            admin_email: args.admin_email,
            admin_password: args.admin_password,
        },
        toml_config,
    )
    .context("Invalid configuration")?;

    config
        .ensure_root_folder()
        .context("Failed to create root folder")?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("✓ Database ready");

    match &config.admin {
        Some(admin) => {
            accounts::ensure_admin(&pool, admin)
                .await
                .context("Failed to bootstrap admin account")?;
        }
        None => info!("No admin credentials configured; admin bootstrap skipped"),
    }

    let app = build_router(AppState::new(pool));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("MuseLink listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

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
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
