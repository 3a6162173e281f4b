// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lux stage-lighting control server.
//!
//! Wires the pieces together: the show store under `DATA_DIR`, the tick
//! engine on its dedicated driver thread, the Art-Net bridge, and the
//! WebSocket gateway. Shutdown (ctrl-c) drains through the driver's stop
//! protocol so the rig blacks out before the process exits.

mod config;
mod gateway;
mod subscribers;
mod sync;

use anyhow::{Context, Result};
use clap::Parser;
use config::Args;
use gateway::GatewayState;
use lux_artnet::{ArtNetBridge, BridgeConfig};
use lux_core::{Engine, FrameSink};
use lux_store::{FsTableStore, ShowStore};
use std::sync::{Arc, Mutex};
use sync::ShowSync;
use tokio::time::{self, Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Interval between show-store change polls.
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let tables = FsTableStore::new(&args.data_dir)
        .with_context(|| format!("opening data dir {}", args.data_dir.display()))?;
    let show = Arc::new(Mutex::new(
        ShowStore::open(Arc::new(tables)).context("loading show tables")?,
    ));

    let bridge = ArtNetBridge::new(&BridgeConfig {
        broadcast: args.artnet_broadcast,
        enabled: args.artnet_enabled,
    })
    .context("opening Art-Net bridge")?;

    let (tap, frames) = gateway::frame_channel();
    let sinks: Vec<Box<dyn FrameSink>> = vec![Box::new(bridge), Box::new(tap)];
    let driver =
        lux_core::spawn(Engine::new(args.tick_hz), sinks).context("starting tick driver")?;
    info!(tick_hz = args.tick_hz, "tick driver running");

    let state = GatewayState::new(driver.commands());

    // Initial show load, then poll for changes.
    let mut show_sync = ShowSync::new(Arc::clone(&show), driver.commands());
    for message in show_sync.sync() {
        state.broadcast(&message).await;
    }
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut ticker = time::interval(SYNC_INTERVAL);
            loop {
                ticker.tick().await;
                for message in show_sync.sync() {
                    state.broadcast(&message).await;
                }
            }
        });
    }
    tokio::spawn(gateway::run_frame_fanout(Arc::clone(&state), frames));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding gateway listener on {}", args.listen))?;
    info!(listen = %args.listen, "gateway listening");

    axum::serve(listener, gateway::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server")?;

    // Completes the current tick, runs the blackout tick, and lets the
    // bridge emit its per-universe blackout packets.
    info!("stopping tick driver");
    tokio::task::spawn_blocking(move || driver.stop())
        .await
        .context("joining tick driver")?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}
