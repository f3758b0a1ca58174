//! Garden relay daemon
//!
//! Accepts WebSocket connections from config panels, screens and input
//! devices, and relays between them until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (0.0.0.0:8080)
//! gardend
//!
//! # Load a config file, override the port
//! gardend --config garden.toml --listen 127.0.0.1:9000
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gardend::config::{ConfigOverrides, HubConfig};
use gardend::effects::{HubEffects, ScreenFanout};
use gardend::hub::spawn_hub;
use gardend::server::RelayServer;

/// Garden relay daemon
#[derive(Parser, Debug)]
#[command(name = "gardend", version, about)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "GARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket listen address
    #[arg(short, long, env = "GARDEN_LISTEN")]
    listen: Option<SocketAddr>,

    /// Countdown tick period in milliseconds
    #[arg(long = "tick-ms", env = "GARDEN_TICK_MS")]
    tick_ms: Option<u64>,

    /// Delay before a config panel's count announcement, in milliseconds
    #[arg(long = "grace-ms", env = "GARDEN_GRACE_MS")]
    grace_ms: Option<u64>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            listen: self.listen,
            tick_interval_ms: self.tick_ms,
            grace_delay_ms: self.grace_ms,
        }
    }
}

fn load_config(args: &Args) -> Result<HubConfig> {
    let base = match &args.config {
        Some(path) => HubConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HubConfig::default(),
    };

    base.with_overrides(&args.overrides())
        .context("Invalid command-line configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("gardend=info".parse()?)
                .add_directive("garden_core=info".parse()?)
                .add_directive("garden_protocol=info".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        listen = %config.listen,
        tick_ms = config.tick_interval_ms,
        grace_ms = config.grace_delay_ms,
        "Garden relay starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let screens = ScreenFanout::new(config.screen_buffer);
    let hub = spawn_hub(
        config.hub_settings(),
        HubEffects::fanout(&screens),
        cancel_token.clone(),
    );
    info!("Hub started");

    let server = RelayServer::new(config.listen, hub, screens, cancel_token);

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e).context("Relay server failed");
    }

    info!("Garden relay stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
