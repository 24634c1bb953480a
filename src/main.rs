//! compositor-busd - daemon bridging compositor lifecycle signals onto D-Bus.
//!
//! Connects to the compositor's IPC socket, tracks outputs and views, and
//! republishes their lifecycle events as signals on the session bus.

use compositor_busd::bridge::Bridge;
use compositor_busd::bus::DbusPublisher;
use compositor_busd::config::Config;
use compositor_busd::host::{Host, IpcHost};
use compositor_busd::state::{DerivedState, SharedState};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Compositor event bridge for D-Bus.
///
/// Republishes output and view lifecycle signals on the session bus.
#[derive(Parser, Debug)]
#[command(name = "compositor-busd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print incoming host events to stdout.
    #[arg(long)]
    print_events: bool,

    /// Run in oneshot mode: connect, print a few events, then exit.
    #[arg(long)]
    oneshot: bool,

    /// Number of events to capture in oneshot mode.
    #[arg(long, default_value = "5")]
    oneshot_count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("compositor-busd v{} starting", env!("CARGO_PKG_VERSION"));

    // Load config
    let config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    // Show diagnostics
    for diag in IpcHost::get_diagnostics() {
        debug!("{}", diag);
    }

    // Oneshot mode
    if args.oneshot {
        return run_oneshot(&config, args.oneshot_count).await;
    }

    // Normal daemon mode
    run_daemon(config, args.print_events).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("compositor_busd={}", level))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Run in oneshot mode: capture a few host events and exit.
async fn run_oneshot(config: &Config, count: usize) -> Result<()> {
    info!("Running in oneshot mode, capturing {} events", count);

    let mut host = IpcHost::connect(config.socket.as_deref())
        .await
        .context("Failed to connect to compositor")?;

    let mut captured = 0;
    while captured < count {
        match tokio::time::timeout(Duration::from_secs(30), host.next_event()).await {
            Ok(Ok(event)) => {
                captured += 1;
                println!("[{}] {:?}", captured, event);
            }
            Ok(Err(e)) => {
                error!("Host event error: {}", e);
                break;
            }
            Err(_) => {
                warn!("Timeout waiting for host events");
                break;
            }
        }
    }

    info!("Oneshot mode complete, captured {} events", captured);
    Ok(())
}

/// Run the daemon event loop.
async fn run_daemon(config: Config, print_events: bool) -> Result<()> {
    let host = IpcHost::connect(config.socket.as_deref())
        .await
        .context("Failed to connect to compositor")?;

    let state = SharedState::new(DerivedState::from_config(&config));

    // No event bridge without a bus: acquisition failure is fatal
    let publisher = DbusPublisher::acquire(&config.bus_name, state.clone())
        .await
        .context("Failed to acquire bus name")?;

    let mut bridge = Bridge::new(host, publisher, state);
    bridge.startup().await.context("Failed to start bridge")?;

    info!("Bridge started, waiting for host events...");

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        tokio::select! {
            event = bridge.next_event() => {
                match event {
                    Ok(event) => {
                        if print_events {
                            println!("[EVENT] {:?}", event);
                        }
                        bridge.handle_event(event).await;
                    }
                    Err(e) => {
                        error!("Host connection lost: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
                break;
            }
        }
    }

    bridge.shutdown().await;
    Ok(())
}
