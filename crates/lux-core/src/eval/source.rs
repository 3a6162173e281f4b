// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Source evaluators: clock, operator inputs, constants, selectors.

use super::{EvalContext, Outputs};
use crate::ident::{FixtureId, GroupId, InputId};
use crate::model::ParamValue;
use crate::port::{Color, Position, PortValue, Selection};

/// `Time`: emits seconds since engine start and the tick delta.
pub(super) fn time(ctx: &mut EvalContext<'_>) -> Outputs {
    vec![
        ("t", PortValue::Scalar(ctx.time)),
        ("dt", PortValue::Scalar(ctx.dt)),
    ]
}

/// `Fader`: emits the latched value of the referenced fader.
pub(super) fn fader(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = match ctx.param("fader_id").and_then(ParamValue::as_str) {
        Some(id) => ctx.inputs.fader(&InputId::new(id)),
        None => {
            ctx.soft_error();
            0.0
        }
    };
    vec![("value", PortValue::Scalar(value))]
}

/// `Button`: emits the per-tick pressed edge and the held level.
pub(super) fn button(ctx: &mut EvalContext<'_>) -> Outputs {
    let state = match ctx.param("button_id").and_then(ParamValue::as_str) {
        Some(id) => ctx.inputs.button(&InputId::new(id)),
        None => {
            ctx.soft_error();
            crate::inputs::ButtonState::default()
        }
    };
    vec![
        ("pressed", PortValue::Trigger(state.pressed)),
        ("down", PortValue::Bool(state.down)),
    ]
}

/// `Constant`: emits the `value` param.
pub(super) fn constant(ctx: &mut EvalContext<'_>) -> Outputs {
    let value = ctx
        .param("value")
        .and_then(ParamValue::as_number)
        .unwrap_or(0.0);
    vec![("value", PortValue::Scalar(value))]
}

/// `ColorConstant`: builds a color from its r/g/b inputs.
pub(super) fn color_constant(ctx: &mut EvalContext<'_>) -> Outputs {
    let color = Color::new(ctx.scalar("r"), ctx.scalar("g"), ctx.scalar("b"));
    vec![("color", PortValue::Color(color))]
}

/// `PositionConstant`: builds a position from its pan/tilt inputs.
pub(super) fn position_constant(ctx: &mut EvalContext<'_>) -> Outputs {
    let position = Position {
        pan: ctx.scalar("pan"),
        tilt: ctx.scalar("tilt"),
    };
    vec![("position", PortValue::Position(position))]
}

/// `SelectFixture`: resolves `fixture_ids` against the patch.
///
/// Unknown ids are silently dropped and contribute one warning to the
/// instance's error count per tick.
pub(super) fn select_fixture(ctx: &mut EvalContext<'_>) -> Outputs {
    let mut selection = Selection::new();
    let mut dropped = false;
    if let Some(ids) = ctx.param("fixture_ids").and_then(ParamValue::as_str_list) {
        for id in ids {
            let id = FixtureId::new(id.clone());
            if ctx.patch.has_fixture(&id) {
                selection.insert(id);
            } else {
                dropped = true;
            }
        }
    } else {
        dropped = true;
    }
    if dropped {
        ctx.soft_error();
    }
    vec![("selection", PortValue::Selection(selection))]
}

/// `SelectGroup`: resolves `group_ids` to member fixtures via the patch.
pub(super) fn select_group(ctx: &mut EvalContext<'_>) -> Outputs {
    let mut selection = Selection::new();
    let mut dropped = false;
    if let Some(ids) = ctx.param("group_ids").and_then(ParamValue::as_str_list) {
        for id in ids {
            match ctx.patch.group_members(&GroupId::new(id.clone())) {
                Some(members) => selection.extend(members.iter().cloned()),
                None => dropped = true,
            }
        }
    } else {
        dropped = true;
    }
    if dropped {
        ctx.soft_error();
    }
    vec![("selection", PortValue::Selection(selection))]
}
