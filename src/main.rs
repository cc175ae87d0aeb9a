use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use formguard::config::AppConfig;
use formguard::http::{AppState, HttpServer, LogDispatcher};
use formguard::ratelimit::RateLimiter;

/// Rate limited contact form endpoint.
#[derive(Debug, Parser)]
#[command(name = "formguard", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "FORMGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long, env = "FORMGUARD_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("Starting Formguard contact form service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    info!(
        bind_addr = %config.server.bind_addr,
        cooldown_ms = config.limits.cooldown_ms,
        window_ms = config.limits.window_ms,
        max_per_window = config.limits.max_per_window,
        ban = ?config.limits.ban,
        client_cooldown_ms = config.client_limits.cooldown_ms,
        blocklisted = config.blocklist.len(),
        "Configuration loaded"
    );

    let blocklist = Arc::new(config.build_blocklist());
    let limiter = RateLimiter::with_blocklist(config.limits.clone(), blocklist);
    let sweeper = limiter.sweeper(config.sweeper.interval()).spawn();
    info!("Rate limiter initialized");

    let state = Arc::new(AppState {
        limiter,
        client_limits: config.client_limits.clone(),
        dispatcher: Arc::new(LogDispatcher),
    });

    let server = HttpServer::new(config.server.bind_addr, state);
    let result = server.serve_with_shutdown(shutdown_signal()).await;

    sweeper.shutdown().await;
    result?;

    info!("Formguard contact form service stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
