// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Server configuration: CLI flags with environment fallbacks.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Lux stage-lighting control server.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Lux stage-lighting control server")]
pub struct Args {
    /// Engine tick rate in Hz.
    #[arg(long, env = "TICK_HZ", default_value_t = 60.0)]
    pub tick_hz: f64,

    /// Destination address for Art-Net DMX broadcast.
    #[arg(long, env = "ARTNET_BROADCAST", default_value = "2.255.255.255")]
    pub artnet_broadcast: IpAddr,

    /// Whether Art-Net UDP output is transmitted at all.
    #[arg(
        long,
        env = "ARTNET_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub artnet_enabled: bool,

    /// Root directory for persisted show entities.
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// TCP listener for WebSocket clients.
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8900")]
    pub listen: SocketAddr,
}
