// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bundle combinators and the sink.

use super::{EvalContext, Outputs};
use crate::port::PortValue;

/// `MergeBundle`: overlays `override` on `base` per attribute.
pub(super) fn merge(ctx: &mut EvalContext<'_>) -> Outputs {
    let base = ctx.bundle("base");
    let over = ctx.bundle("override");
    vec![("bundle", PortValue::Bundle(base.overlaid(over)))]
}

/// `ScaleBundle`: multiplies every present attribute by `scale`, clipping to
/// legal ranges.
pub(super) fn scale(ctx: &mut EvalContext<'_>) -> Outputs {
    let bundle = ctx.bundle("bundle").scaled(ctx.scalar("scale"));
    vec![("bundle", PortValue::Bundle(bundle))]
}

/// `WriteAttributes`: the sink. Produces no outputs; its resolved inputs are
/// collected as a write for the engine's reduction phase.
pub(super) fn write_attributes(ctx: &mut EvalContext<'_>) -> Outputs {
    let selection = ctx.selection("selection");
    let bundle = ctx.bundle("bundle");
    let priority = ctx.scalar("priority");
    if !selection.is_empty() {
        ctx.emit_write(selection, bundle, priority);
    }
    Vec::new()
}
