// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Normalized-attribute → DMX channel mapping.
//!
//! A fixture's model maps symbolic roles to 1-based offsets within the
//! fixture's footprint; writes land at absolute offset
//! `start_channel - 1 + offset - 1` in the universe buffer. Attributes absent
//! from a bundle leave the existing bytes untouched, so lower-priority state
//! persists between writes.

use crate::packet::DMX_CHANNELS;
use lux_core::{AttributeBundle, ChannelRole, Fixture, FixtureModel};

/// Per-universe output state: the persistent 512-byte buffer plus the
/// sequence counter cycling `1..=255`.
#[derive(Debug, Clone)]
pub struct UniverseState {
    /// Channel bytes 1..512.
    pub data: [u8; DMX_CHANNELS],
    sequence: u8,
}

impl Default for UniverseState {
    fn default() -> Self {
        Self {
            data: [0u8; DMX_CHANNELS],
            sequence: 0,
        }
    }
}

impl UniverseState {
    /// Advances and returns the next sequence byte. Zero means "sequencing
    /// disabled" on the wire, so the counter wraps 255 → 1.
    pub fn next_sequence(&mut self) -> u8 {
        self.sequence = if self.sequence >= 255 {
            1
        } else {
            self.sequence + 1
        };
        self.sequence
    }

    /// Zeroes the channel buffer (blackout).
    pub fn clear(&mut self) {
        self.data = [0u8; DMX_CHANNELS];
    }
}

/// Sanitizes a normalized `[0, 1]` value into a channel byte. `NaN`/`Inf`
/// coerce to zero before scaling.
fn unit_byte(value: f64) -> u8 {
    let value = if value.is_finite() { value } else { 0.0 };
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Sanitizes a `[-1, 1]` axis into a 16-bit channel value.
fn axis_word(value: f64) -> u16 {
    let value = if value.is_finite() { value } else { 0.0 };
    ((value.clamp(-1.0, 1.0) + 1.0) / 2.0 * 65535.0).round() as u16
}

/// Renders one fixture's bundle into its universe buffer.
///
/// Writes stay inside `[start_channel, start_channel + channel_count - 1]`;
/// offsets that would escape the universe are dropped byte-wise (the store
/// validates footprints, this is the wire-level backstop).
pub fn apply_bundle(
    buffer: &mut [u8; DMX_CHANNELS],
    fixture: &Fixture,
    model: &FixtureModel,
    bundle: &AttributeBundle,
) {
    let base = usize::from(fixture.start_channel.saturating_sub(1));
    let mut write = |role: ChannelRole, byte: u8| {
        if let Some(offset) = model.offset(role) {
            let index = base + usize::from(offset - 1);
            if index < DMX_CHANNELS {
                buffer[index] = byte;
            }
        }
    };

    if let Some(intensity) = bundle.intensity {
        write(ChannelRole::Dimmer, unit_byte(intensity));
    }
    if let Some(color) = bundle.color {
        write(ChannelRole::Red, unit_byte(color.r));
        write(ChannelRole::Green, unit_byte(color.g));
        write(ChannelRole::Blue, unit_byte(color.b));
        // RGBW fixtures: drive the white channel from the common component.
        write(
            ChannelRole::White,
            unit_byte(color.r.min(color.g).min(color.b)),
        );
    }
    if let Some(pan) = bundle.pan {
        let word = axis_word(pan);
        if model.offset(ChannelRole::PanFine).is_some() {
            write(ChannelRole::Pan, (word >> 8) as u8);
            write(ChannelRole::PanFine, (word & 0xFF) as u8);
        } else {
            write(ChannelRole::Pan, (word >> 8) as u8);
        }
    }
    if let Some(tilt) = bundle.tilt {
        let word = axis_word(tilt);
        if model.offset(ChannelRole::TiltFine).is_some() {
            write(ChannelRole::Tilt, (word >> 8) as u8);
            write(ChannelRole::TiltFine, (word & 0xFF) as u8);
        } else {
            write(ChannelRole::Tilt, (word >> 8) as u8);
        }
    }
    if let Some(zoom) = bundle.zoom {
        write(ChannelRole::Zoom, unit_byte(zoom));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lux_core::{Color, FixtureId, ModelId};
    use std::collections::BTreeMap;

    fn fixture(start_channel: u16) -> Fixture {
        Fixture {
            id: FixtureId::new("fx-1"),
            revision: 1,
            name: "unit".into(),
            model_id: ModelId::new("m-1"),
            universe: 0,
            start_channel,
        }
    }

    fn model(channels: &[(ChannelRole, u16)]) -> FixtureModel {
        FixtureModel {
            id: ModelId::new("m-1"),
            revision: 1,
            brand: "Generic".into(),
            model: "Test".into(),
            channels: channels.iter().copied().collect::<BTreeMap<_, _>>(),
        }
    }

    fn bundle_color(r: f64, g: f64, b: f64) -> AttributeBundle {
        AttributeBundle {
            color: Some(Color::new(r, g, b)),
            ..AttributeBundle::default()
        }
    }

    #[test]
    fn rgb_lands_at_patched_offsets() {
        // rgb model {r:1,g:2,b:3} patched at start_channel 10
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[
            (ChannelRole::Red, 1),
            (ChannelRole::Green, 2),
            (ChannelRole::Blue, 3),
        ]);
        apply_bundle(&mut buffer, &fixture(10), &model, &bundle_color(1.0, 0.0, 0.0));
        assert_eq!(&buffer[9..12], &[255, 0, 0]);
        apply_bundle(&mut buffer, &fixture(10), &model, &bundle_color(0.0, 0.0, 0.0));
        assert_eq!(&buffer[9..12], &[0, 0, 0]);
    }

    #[test]
    fn absent_attributes_leave_bytes_untouched() {
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[(ChannelRole::Dimmer, 1), (ChannelRole::Red, 2)]);
        buffer[1] = 77; // prior red state
        let dimmer_only = AttributeBundle {
            intensity: Some(1.0),
            ..AttributeBundle::default()
        };
        apply_bundle(&mut buffer, &fixture(1), &model, &dimmer_only);
        assert_eq!(buffer[0], 255);
        assert_eq!(buffer[1], 77);
    }

    #[test]
    fn pan_splits_into_coarse_and_fine_when_declared() {
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[
            (ChannelRole::Pan, 1),
            (ChannelRole::PanFine, 2),
            (ChannelRole::Tilt, 3),
        ]);
        let bundle = AttributeBundle {
            pan: Some(1.0),
            tilt: Some(-1.0),
            ..AttributeBundle::default()
        };
        apply_bundle(&mut buffer, &fixture(1), &model, &bundle);
        // pan = +1 → 0xFFFF split across coarse/fine
        assert_eq!(buffer[0], 0xFF);
        assert_eq!(buffer[1], 0xFF);
        // tilt = -1 → 0x0000, coarse only (no fine channel declared)
        assert_eq!(buffer[2], 0x00);
    }

    #[test]
    fn centered_axes_sit_mid_range() {
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[(ChannelRole::Pan, 1), (ChannelRole::PanFine, 2)]);
        let bundle = AttributeBundle {
            pan: Some(0.0),
            ..AttributeBundle::default()
        };
        apply_bundle(&mut buffer, &fixture(1), &model, &bundle);
        let word = (u16::from(buffer[0]) << 8) | u16::from(buffer[1]);
        assert_eq!(word, 32768);
    }

    #[test]
    fn non_finite_values_coerce_to_zero() {
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[(ChannelRole::Dimmer, 1), (ChannelRole::Zoom, 2)]);
        let bundle = AttributeBundle {
            intensity: Some(f64::NAN),
            zoom: Some(f64::INFINITY),
            ..AttributeBundle::default()
        };
        apply_bundle(&mut buffer, &fixture(1), &model, &bundle);
        assert_eq!(buffer[0], 0);
        // Inf coerces to 0, not 255
        assert_eq!(buffer[1], 0);
    }

    #[test]
    fn white_channel_carries_the_common_component() {
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[
            (ChannelRole::Red, 1),
            (ChannelRole::Green, 2),
            (ChannelRole::Blue, 3),
            (ChannelRole::White, 4),
        ]);
        apply_bundle(&mut buffer, &fixture(1), &model, &bundle_color(1.0, 0.5, 0.75));
        assert_eq!(buffer[3], unit_byte(0.5));
    }

    #[test]
    fn writes_never_escape_the_universe() {
        let mut buffer = [0u8; DMX_CHANNELS];
        let model = model(&[(ChannelRole::Dimmer, 1), (ChannelRole::Zoom, 5)]);
        // start_channel 512 + zoom offset 5 would land past the end
        let bundle = AttributeBundle {
            intensity: Some(1.0),
            zoom: Some(1.0),
            ..AttributeBundle::default()
        };
        apply_bundle(&mut buffer, &fixture(512), &model, &bundle);
        assert_eq!(buffer[511], 255);
    }

    #[test]
    fn sequence_wraps_255_to_1() {
        let mut universe = UniverseState::default();
        assert_eq!(universe.next_sequence(), 1);
        for _ in 0..253 {
            universe.next_sequence();
        }
        assert_eq!(universe.next_sequence(), 255);
        assert_eq!(universe.next_sequence(), 1);
        assert_eq!(universe.next_sequence(), 2);
    }
}
