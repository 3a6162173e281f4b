// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stateful effect evaluators: oscillators and the smoothing filter.

use super::{EvalContext, NodeState, Outputs};
use crate::catalog::NodeType;
use crate::model::ParamValue;
use crate::port::PortValue;
use std::f64::consts::TAU;

/// Phase-accumulating oscillator shared by the four LFO types.
///
/// State is the phase in `[0, 1)`, seeded from the `phase` param on first
/// evaluation. Each tick advances by `frequency * dt * speed` before the
/// waveform is sampled, so the output tracks engine time exactly.
pub(super) fn lfo(ctx: &mut EvalContext<'_>) -> Outputs {
    let frequency = ctx.scalar("frequency");
    let speed = ctx.scalar("speed");

    let mut phase = match *ctx.state {
        NodeState::Phase(p) => p,
        _ => ctx
            .param("phase")
            .and_then(ParamValue::as_number)
            .unwrap_or(0.0),
    };
    let step = frequency * ctx.dt * speed;
    if step.is_finite() {
        phase = (phase + step).rem_euclid(1.0);
    }
    *ctx.state = NodeState::Phase(phase);

    let value = match ctx.node.node_type {
        NodeType::SineLfo => ((phase * TAU).sin() + 1.0) / 2.0,
        NodeType::TriangleLfo => {
            if phase < 0.5 {
                2.0 * phase
            } else {
                2.0 - 2.0 * phase
            }
        }
        NodeType::SawLfo => phase,
        // SquareLFO — high for the first half of the cycle.
        _ => {
            if phase < 0.5 {
                1.0
            } else {
                0.0
            }
        }
    };
    vec![("value", PortValue::Scalar(value))]
}

/// `Smooth`: one-pole filter `y ← y + (1 - smoothing) * (x - y)`, clamped to
/// `[0, 1]`.
pub(super) fn smooth(ctx: &mut EvalContext<'_>) -> Outputs {
    let x = ctx.scalar("value");
    let smoothing = ctx.scalar("smoothing").clamp(0.0, 1.0);

    let y = match *ctx.state {
        NodeState::Smoothed(y) => y,
        _ => 0.0,
    };
    let next = (y + (1.0 - smoothing) * (x - y)).clamp(0.0, 1.0);
    *ctx.state = NodeState::Smoothed(next);
    vec![("value", PortValue::Scalar(next))]
}

/// `Toggle`: flips its level on every trigger edge; emits 0 or 1.
pub(super) fn toggle(ctx: &mut EvalContext<'_>) -> Outputs {
    let mut level = matches!(*ctx.state, NodeState::Toggled(true));
    if ctx.trigger("trigger") {
        level = !level;
    }
    *ctx.state = NodeState::Toggled(level);
    let value = if level { 1.0 } else { 0.0 };
    vec![("value", PortValue::Scalar(value))]
}
