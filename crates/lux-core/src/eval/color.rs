// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Color transform evaluators.

use super::{EvalContext, Outputs};
use crate::model::ParamValue;
use crate::port::{Color, PortValue};

/// `MixColor`: componentwise linear interpolation between `a` and `b`.
pub(super) fn mix(ctx: &mut EvalContext<'_>) -> Outputs {
    let a = ctx.color("a");
    let b = ctx.color("b");
    let t = ctx.scalar("t");
    vec![("color", PortValue::Color(a.lerp(b, t)))]
}

/// `ScaleColor`: multiplies the base color's channels by `scale`, clipping
/// to `[0, 1]`.
///
/// When the `color` input is unconnected, the base color comes from the
/// node's `r`/`g`/`b` params (catalog default: white). This is what lets a
/// bare oscillator drive a colored output without an upstream constant node.
pub(super) fn scale(ctx: &mut EvalContext<'_>) -> Outputs {
    let base = if ctx.get_input("color").is_some() {
        ctx.color("color")
    } else {
        let component = |name: &str, default: f64| {
            ctx.param(name)
                .and_then(ParamValue::as_number)
                .unwrap_or(default)
        };
        Color::new(
            component("r", 1.0),
            component("g", 1.0),
            component("b", 1.0),
        )
    };
    let scaled = base.scaled(ctx.scalar("scale"));
    vec![("color", PortValue::Color(scaled))]
}
