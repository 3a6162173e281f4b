// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar math evaluators.

use super::{EvalContext, Outputs};
use crate::port::PortValue;

pub(super) fn add(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = ctx.scalar("a") + ctx.scalar("b");
    vec![("value", PortValue::Scalar(value))]
}

pub(super) fn multiply(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = ctx.scalar("a") * ctx.scalar("b");
    vec![("value", PortValue::Scalar(value))]
}

/// `Invert`: `1 - x`, the complement within the normalized range.
pub(super) fn invert(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = 1.0 - ctx.scalar("value");
    vec![("value", PortValue::Scalar(value))]
}

/// `MapRange`: affine map with guarded division; a degenerate input range
/// emits `out_min`.
pub(super) fn map_range(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = ctx.scalar("value");
    let in_min = ctx.scalar("in_min");
    let in_max = ctx.scalar("in_max");
    let out_min = ctx.scalar("out_min");
    let out_max = ctx.scalar("out_max");

    let mapped = if in_max == in_min {
        out_min
    } else {
        out_min + (value - in_min) / (in_max - in_min) * (out_max - out_min)
    };
    vec![("value", PortValue::Scalar(mapped))]
}

pub(super) fn clamp01(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = ctx.scalar("value").clamp(0.0, 1.0);
    vec![("value", PortValue::Scalar(value))]
}

/// `Gate`: passes `value` while `gate` is high, zero otherwise.
pub(super) fn gate(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = if ctx.boolean("gate") {
        ctx.scalar("value")
    } else {
        0.0
    };
    vec![("value", PortValue::Scalar(value))]
}
