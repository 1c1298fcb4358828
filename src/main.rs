//! auth-gate - Credential issuance and session validation service
//!
//! This is the main entry point for the auth-gate application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

use auth_gate::auth::{AuthManager, RevocationPruner, TokenService};
use auth_gate::config::Config;
use auth_gate::database::SqliteDatabase;
use auth_gate::server::{AppState, Server};
use auth_gate::telemetry::init_tracing;

/// auth-gate - Credential issuance and session validation service
#[derive(Parser, Debug)]
#[command(name = "auth-gate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "AUTH_GATE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting auth-gate");

    // Initialize database
    let database = SqliteDatabase::new(&config.database.path).await?;
    let database = Arc::new(database);
    info!(path = %config.database.path, "Database initialized");

    // Initialize token service
    let tokens = TokenService::new(
        &config.auth.jwt_secret,
        config.auth.issuer.clone(),
        config.auth.token_ttl(),
    )?;
    tokens.self_check()?;
    info!(
        issuer = %tokens.issuer(),
        ttl_secs = config.auth.token_ttl_secs,
        "Token service initialized"
    );

    // Initialize authentication manager
    let auth_manager = Arc::new(AuthManager::new(
        Arc::clone(&database),
        tokens,
        config.auth.manager_config(),
    ));
    info!(
        burst = config.auth.rate_limit.burst,
        refill_interval_secs = config.auth.rate_limit.refill_interval_secs,
        "Authentication manager initialized"
    );

    if let Some(admin) = &config.auth.bootstrap_admin {
        let created = auth_manager
            .ensure_admin(&admin.email, &admin.password)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin: {}", e))?;
        if !created {
            info!("Bootstrap admin already exists");
        }
    }

    // Start revocation pruner
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let pruner = RevocationPruner::new(
        Arc::clone(&auth_manager),
        config.auth.prune_interval(),
        shutdown_rx,
    );
    let pruner_handle = tokio::spawn(pruner.run());

    // Create and start the HTTP server
    let state = AppState { auth_manager };
    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    // Stop background tasks
    let _ = shutdown_tx.send(());
    if let Err(e) = pruner_handle.await {
        error!(error = %e, "Revocation pruner task failed");
    }

    info!("auth-gate shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
