//! Relay Daemon
//!
//! Serves the tutor chat and artifact endpoints over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (127.0.0.1:3000, key from THESYS_API_KEY)
//! relay-daemon
//!
//! # Custom address and config file
//! relay-daemon --listen 0.0.0.0:8080 --config ./relay.toml
//!
//! # With verbose logging
//! RUST_LOG=debug relay-daemon
//! ```
//!
//! # Signals
//!
//! - SIGINT/SIGTERM: stop accepting connections and let in-flight requests finish

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use relay_core::RelayConfig;
use relay_daemon::{router, AppState};

/// Streaming completion relay for the tutor and artifact demos
#[derive(Debug, Parser)]
#[command(name = "relay-daemon", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Chat completion base URL for the tutor
    #[arg(long)]
    chat_base_url: Option<String>,

    /// Artifact completion base URL
    #[arg(long)]
    artifact_base_url: Option<String>,

    /// Environment variable holding the upstream API key
    #[arg(long)]
    api_key_env: Option<String>,
}

impl Args {
    fn apply(self, config: &mut RelayConfig) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(url) = self.chat_base_url {
            config.chat_base_url = url;
        }
        if let Some(url) = self.artifact_base_url {
            config.artifact_base_url = url;
        }
        if let Some(var) = self.api_key_env {
            config.api_key_env = var;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("relay_daemon=info".parse()?)
                .add_directive("relay_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let mut config = RelayConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);

    if config.read_api_key().is_err() {
        warn!(
            var = %config.api_key_env,
            "Upstream API key is not set; requests will fail until it is"
        );
    }

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config).context("failed to initialise relay state")?;
    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    info!(
        addr = %listen_addr,
        chat = %state.config().chat_base_url,
        artifact = %state.config().artifact_base_url,
        "Relay daemon listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Relay daemon stopped");
    Ok(())
}
