// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Latched operator input state.
//!
//! External fader/button updates arrive as commands and are applied during
//! the command-drain phase, so every evaluator inside one tick observes the
//! same values. Button *pressed* edges are strictly per-tick: the engine
//! clears them at the end of the tick that observed them.

use crate::ident::InputId;
use rustc_hash::FxHashMap;

/// Held state of one button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// Level: true while the button is held.
    pub down: bool,
    /// Edge: true iff the button transitioned down this tick.
    pub pressed: bool,
}

/// Latched fader and button values, keyed by input id.
///
/// Unknown ids read as zero/released; the engine does not require inputs to
/// be declared before use.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    faders: FxHashMap<InputId, f64>,
    buttons: FxHashMap<InputId, ButtonState>,
}

impl InputState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches a fader value, clamped to `[0, 1]`.
    pub fn set_fader(&mut self, id: InputId, value: f64) {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.faders.insert(id, value);
    }

    /// Marks a button down; fires the pressed edge on the 0→1 transition.
    pub fn button_down(&mut self, id: InputId) {
        let state = self.buttons.entry(id).or_default();
        if !state.down {
            state.pressed = true;
        }
        state.down = true;
    }

    /// Marks a button released. The pressed edge (if any) stays set until the
    /// end of the tick, so a down+up pair inside one drain still fires once.
    pub fn button_up(&mut self, id: InputId) {
        self.buttons.entry(id).or_default().down = false;
    }

    /// Current fader value, zero when never set.
    #[must_use]
    pub fn fader(&self, id: &InputId) -> f64 {
        self.faders.get(id).copied().unwrap_or(0.0)
    }

    /// Current button state, released when never set.
    #[must_use]
    pub fn button(&self, id: &InputId) -> ButtonState {
        self.buttons.get(id).copied().unwrap_or_default()
    }

    /// Clears all pressed edges. Called by the engine once per tick, after
    /// evaluation.
    pub fn clear_edges(&mut self) {
        for state in self.buttons.values_mut() {
            state.pressed = false;
        }
    }
}
