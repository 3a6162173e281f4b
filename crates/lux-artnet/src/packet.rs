// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! ArtDmx packet framing.
//!
//! # Packet Format
//!
//! ```text
//! ArtDmx (530 bytes):
//!   id[8]        = "Art-Net\0"
//!   opcode[2]    = 0x5000 (little-endian)
//!   protver[2]   = 0x000E (big-endian)
//!   sequence[1]  = 1..=255 (0 would disable sequencing; never emitted)
//!   physical[1]  = 0
//!   universe[2]  = little-endian, low 15 bits = logical universe
//!   length[2]    = big-endian, always 512
//!   data[512]    = channel bytes 1..512
//! ```

/// UDP destination port for Art-Net.
pub const ARTNET_PORT: u16 = 6454;

/// Protocol id bytes: "Art-Net" with a trailing NUL.
pub const ARTNET_ID: [u8; 8] = *b"Art-Net\0";

/// ArtDmx opcode.
pub const OP_DMX: u16 = 0x5000;

/// Protocol revision 14.
pub const PROTOCOL_VERSION: u16 = 0x000E;

/// Header size in bytes: id(8) + opcode(2) + protver(2) + sequence(1) +
/// physical(1) + universe(2) + length(2) = 18.
pub const HEADER_SIZE: usize = 18;

/// Channels per universe.
pub const DMX_CHANNELS: usize = 512;

/// A decoded ArtDmx packet (used by tests and diagnostics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    /// Per-universe sequence byte.
    pub sequence: u8,
    /// Logical universe.
    pub universe: u16,
    /// Channel data.
    pub data: [u8; DMX_CHANNELS],
}

/// Encodes one ArtDmx packet.
#[must_use]
pub fn encode(universe: u16, sequence: u8, data: &[u8; DMX_CHANNELS]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + DMX_CHANNELS);
    buf.extend_from_slice(&ARTNET_ID);
    buf.extend_from_slice(&OP_DMX.to_le_bytes());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    buf.push(sequence);
    buf.push(0); // physical
    buf.extend_from_slice(&(universe & 0x7FFF).to_le_bytes());
    buf.extend_from_slice(&(DMX_CHANNELS as u16).to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

/// Decodes an ArtDmx packet. Returns `None` for anything that is not a
/// well-formed full-universe ArtDmx frame.
#[must_use]
pub fn decode(bytes: &[u8]) -> Option<ArtDmx> {
    if bytes.len() != HEADER_SIZE + DMX_CHANNELS {
        return None;
    }
    if bytes[0..8] != ARTNET_ID {
        return None;
    }
    if u16::from_le_bytes([bytes[8], bytes[9]]) != OP_DMX {
        return None;
    }
    if u16::from_be_bytes([bytes[10], bytes[11]]) != PROTOCOL_VERSION {
        return None;
    }
    let sequence = bytes[12];
    let universe = u16::from_le_bytes([bytes[14], bytes[15]]);
    if u16::from_be_bytes([bytes[16], bytes[17]]) as usize != DMX_CHANNELS {
        return None;
    }
    let mut data = [0u8; DMX_CHANNELS];
    data.copy_from_slice(&bytes[HEADER_SIZE..]);
    Some(ArtDmx {
        sequence,
        universe,
        data,
    })
}
