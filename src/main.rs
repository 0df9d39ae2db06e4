use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mielegw::config;
use mielegw::http::handler::create_router;
use mielegw::protocol::Credentials;
use mielegw::AppState;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "mielegw", about = "Miele local API signing gateway")]
struct Cli {
    /// Path to the YAML configuration file.  Built-in defaults apply when
    /// omitted; credentials always come from the environment.
    #[arg(short, long)]
    config: Option<String>,
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // ---- Config ----
    let config = config::load_config(cli.config.as_deref())?;
    tracing::info!(config_path = ?cli.config, "starting mielegw");

    // ---- Credentials ----
    let credentials = Credentials::from_env(&config.credentials)
        .context("failed to load group credentials from environment")?;
    if credentials.is_placeholder() {
        tracing::warn!(
            "placeholder group credentials in use; export real GROUP_ID/GROUP_KEY values \
             and commission the appliance via /init/<host>"
        );
    }
    tracing::info!(credentials = ?credentials, "credentials loaded");

    // ---- App state ----
    let state = Arc::new(AppState::new(config, credentials)?);

    // ---- HTTP server ----
    let listen_addr: std::net::SocketAddr = state
        .config
        .gateway
        .http_listen
        .parse()
        .context("invalid http_listen address")?;

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("mielegw shut down cleanly");
    Ok(())
}
