// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The Art-Net output bridge.
//!
//! Owns the UDP socket, one persistent 512-byte buffer per touched universe,
//! and the per-universe sequence counters. Only the tick driver thread
//! invokes it, so no locking guards the buffers.
//!
//! Failure policy: a bind failure at startup is fatal (no partial-running
//! mode); everything after that is soft — send errors are counted and
//! logged, fixtures without a resolvable model are dropped and reported back
//! to the engine through [`SinkFeedback`].

use crate::dmx::{apply_bundle, UniverseState};
use crate::packet::{self, ARTNET_PORT, DMX_CHANNELS};
use lux_core::{Frame, FrameSink, Patch, SinkFeedback};
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use thiserror::Error;
use tracing::{debug, warn};

/// Bridge configuration, typically sourced from `ARTNET_*` environment
/// variables by the server.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Destination address for DMX broadcast.
    pub broadcast: IpAddr,
    /// When false, mapping and sequencing still run but no UDP I/O happens
    /// (useful for tests and rig-less development).
    pub enabled: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broadcast: IpAddr::V4(Ipv4Addr::new(2, 255, 255, 255)),
            enabled: true,
        }
    }
}

/// Startup failures of the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The UDP socket could not be bound or configured.
    #[error("failed to open Art-Net socket: {0}")]
    Bind(#[from] std::io::Error),
}

/// Art-Net DMX output sink.
#[derive(Debug)]
pub struct ArtNetBridge {
    socket: Option<UdpSocket>,
    destination: SocketAddr,
    universes: BTreeMap<u16, UniverseState>,
    send_errors: u64,
}

impl ArtNetBridge {
    /// Opens the bridge. Binds an ephemeral UDP socket with broadcast
    /// enabled unless the config disables output.
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let socket = if config.enabled {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
            socket.set_broadcast(true)?;
            Some(socket)
        } else {
            None
        };
        Ok(Self {
            socket,
            destination: SocketAddr::new(config.broadcast, ARTNET_PORT),
            universes: BTreeMap::new(),
            send_errors: 0,
        })
    }

    /// Universes the bridge has ever touched, ascending.
    pub fn universes(&self) -> impl Iterator<Item = u16> + '_ {
        self.universes.keys().copied()
    }

    /// Current channel buffer for a universe.
    #[must_use]
    pub fn universe_data(&self, universe: u16) -> Option<&[u8; DMX_CHANNELS]> {
        self.universes.get(&universe).map(|state| &state.data)
    }

    /// UDP send failures since startup.
    #[must_use]
    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }

    /// Frames and transmits the current buffer of `universe` with the next
    /// sequence byte.
    fn transmit(&mut self, universe: u16) {
        let Some(state) = self.universes.get_mut(&universe) else {
            return;
        };
        let sequence = state.next_sequence();
        let datagram = packet::encode(universe, sequence, &state.data);
        if let Some(socket) = &self.socket {
            if let Err(err) = socket.send_to(&datagram, self.destination) {
                self.send_errors += 1;
                warn!(universe, %err, "Art-Net send failed");
            }
        }
    }
}

impl FrameSink for ArtNetBridge {
    fn frame(&mut self, frame: &Frame, patch: &Patch) -> SinkFeedback {
        let mut feedback = SinkFeedback::default();
        let mut touched: BTreeSet<u16> = BTreeSet::new();

        for (fixture_id, bundle) in &frame.fixtures {
            let Some(fixture) = patch.fixtures.get(fixture_id) else {
                // Fixture disappeared between patch snapshots; skip quietly.
                continue;
            };
            let Some(model) = patch.models.get(&fixture.model_id) else {
                feedback.dropped_fixtures.push(fixture_id.clone());
                continue;
            };
            let state = self.universes.entry(fixture.universe).or_default();
            apply_bundle(&mut state.data, fixture, model, bundle);
            touched.insert(fixture.universe);
        }

        for universe in touched {
            self.transmit(universe);
        }
        feedback
    }

    fn shutdown(&mut self) {
        // One blackout frame per known universe, then close the socket.
        let universes: Vec<u16> = self.universes.keys().copied().collect();
        for universe in &universes {
            if let Some(state) = self.universes.get_mut(universe) {
                state.clear();
            }
        }
        for universe in universes {
            self.transmit(universe);
        }
        debug!(send_errors = self.send_errors, "Art-Net bridge closed");
        self.socket = None;
    }
}
