// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! lux-artnet: DMX-over-Art-Net output for the Lux engine.
//!
//! Renders reduced attribute bundles into per-universe channel buffers via
//! fixture model descriptors and broadcasts one ArtDmx packet per touched
//! universe per frame.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::use_self
)]

mod bridge;
mod dmx;
/// ArtDmx packet framing (constants, encode, decode).
pub mod packet;

pub use bridge::{ArtNetBridge, BridgeConfig, BridgeError};
pub use dmx::{apply_bundle, UniverseState};
pub use packet::{ArtDmx, ARTNET_ID, ARTNET_PORT, DMX_CHANNELS, HEADER_SIZE, OP_DMX, PROTOCOL_VERSION};
