// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-node evaluators.
//!
//! Each node type has one evaluator function. The contract:
//!
//! - inputs: the node's compiled declaration, an [`EvalContext`] exposing the
//!   clock, the latched [`InputState`], upstream outputs (via the unique,
//!   compile-validated incoming edge per port), and the node's persistent
//!   state slot;
//! - output: `(port, value)` pairs, pure given inputs and prior state.
//!
//! Failure policy: an evaluator never panics. Conditions that would be bugs
//! elsewhere (missing param at runtime, unknown referenced entity) fall back
//! to defaults and advance the owning instance's soft-error counter. A single
//! misbehaving node never takes down the tick.
//!
//! Value-port resolution order is edge → same-named node param → catalog
//! default → type zero.

mod bundle;
mod color;
mod effect;
mod math;
mod source;

use crate::catalog::NodeType;
use crate::compile::{CompiledGraph, CompiledNode};
use crate::ident::NodeId;
use crate::inputs::InputState;
use crate::model::{ParamValue, Patch};
use crate::port::{AttributeBundle, Color, PortValue, Selection};
use rustc_hash::FxHashMap;

/// Outputs of one node for one tick, keyed by catalog port name.
pub type Outputs = Vec<(&'static str, PortValue)>;

/// All node outputs produced so far this tick for one instance.
pub type PortMap = FxHashMap<NodeId, Outputs>;

/// Persistent per-node state, preserved across ticks (and across recompiles
/// for nodes whose `(id, type)` survives).
///
/// The engine treats slots opaquely; only the owning evaluator reads its
/// variant, falling back to a fresh slot on mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NodeState {
    /// No state yet.
    #[default]
    Idle,
    /// Oscillator phase in `[0, 1)`.
    Phase(f64),
    /// Last smoothed output.
    Smoothed(f64),
    /// Flip-flop level.
    Toggled(bool),
}

/// A sink emission collected during evaluation, before the engine attaches
/// instance/node ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkWrite {
    /// The `WriteAttributes` node that produced the write.
    pub node: NodeId,
    /// Target fixtures.
    pub selection: Selection,
    /// Attributes to apply.
    pub bundle: AttributeBundle,
    /// Reduction priority.
    pub priority: f64,
}

/// Evaluation context for one node within one tick.
pub struct EvalContext<'a> {
    /// Seconds since engine start.
    pub time: f64,
    /// Clamped wall-clock delta for this tick.
    pub dt: f64,
    /// Latched operator inputs.
    pub inputs: &'a InputState,
    /// Current rig snapshot for selection resolution.
    pub patch: &'a Patch,
    pub(crate) node_id: &'a NodeId,
    pub(crate) node: &'a CompiledNode,
    pub(crate) compiled: &'a CompiledGraph,
    pub(crate) outputs: &'a PortMap,
    pub(crate) state: &'a mut NodeState,
    pub(crate) errors: &'a mut u32,
    pub(crate) writes: &'a mut Vec<SinkWrite>,
}

impl EvalContext<'_> {
    /// Records a recovered runtime fault on the owning instance.
    pub fn soft_error(&mut self) {
        *self.errors = self.errors.saturating_add(1);
    }

    fn param(&self, name: &str) -> Option<&ParamValue> {
        self.node.params.get(name)
    }

    /// Upstream value delivered to input `port`, promoted to the port's
    /// declared type. `None` when the port has no incoming edge.
    pub fn get_input(&self, port: &str) -> Option<PortValue> {
        let edge = self.compiled.upstream(self.node_id, port)?;
        let declared = self.node.node_type.spec().input(port)?.ty;
        let produced = self
            .outputs
            .get(&edge.from)?
            .iter()
            .find(|(name, _)| *name == edge.from_port)?
            .1
            .clone();
        produced.promote(declared)
    }

    /// Resolves a Scalar input port: edge → param → catalog default → 0.
    pub fn scalar(&self, port: &str) -> f64 {
        if let Some(PortValue::Scalar(v)) = self.get_input(port) {
            return v;
        }
        if let Some(v) = self.param(port).and_then(ParamValue::as_number) {
            return v;
        }
        match self
            .node
            .node_type
            .spec()
            .input(port)
            .and_then(|p| p.default)
        {
            Some(d) => match d.value() {
                PortValue::Scalar(v) => v,
                _ => 0.0,
            },
            None => 0.0,
        }
    }

    /// Resolves a Bool input port: edge (Triggers collapse to their level) →
    /// param → catalog default → false.
    pub fn boolean(&self, port: &str) -> bool {
        if let Some(PortValue::Bool(v)) = self.get_input(port) {
            return v;
        }
        if let Some(ParamValue::Bool(v)) = self.param(port) {
            return *v;
        }
        match self
            .node
            .node_type
            .spec()
            .input(port)
            .and_then(|p| p.default)
        {
            Some(d) => matches!(d.value(), PortValue::Bool(true)),
            None => false,
        }
    }

    /// Resolves a Trigger input port; unconnected triggers never fire.
    pub fn trigger(&self, port: &str) -> bool {
        matches!(self.get_input(port), Some(PortValue::Trigger(true)))
    }

    /// Resolves a Color input port: edge → catalog default → black.
    pub fn color(&self, port: &str) -> Color {
        if let Some(PortValue::Color(c)) = self.get_input(port) {
            return c;
        }
        match self
            .node
            .node_type
            .spec()
            .input(port)
            .and_then(|p| p.default)
        {
            Some(d) => match d.value() {
                PortValue::Color(c) => c,
                _ => Color::default(),
            },
            None => Color::default(),
        }
    }

    /// Resolves a Bundle input port; missing defaults are the empty bundle.
    pub fn bundle(&self, port: &str) -> AttributeBundle {
        match self.get_input(port) {
            Some(PortValue::Bundle(b)) => b,
            _ => AttributeBundle::default(),
        }
    }

    /// Resolves a Selection input port; missing defaults are the empty set.
    pub fn selection(&self, port: &str) -> Selection {
        match self.get_input(port) {
            Some(PortValue::Selection(s)) => s,
            _ => Selection::new(),
        }
    }

    /// Emits a sink write (used by `WriteAttributes` only).
    pub fn emit_write(&mut self, selection: Selection, bundle: AttributeBundle, priority: f64) {
        let write = SinkWrite {
            node: self.node_id.clone(),
            selection,
            bundle,
            priority,
        };
        self.writes.push(write);
    }
}

/// Dispatches to the evaluator for the node's type.
pub fn evaluate(ctx: &mut EvalContext<'_>) -> Outputs {
    match ctx.node.node_type {
        NodeType::Time => source::time(ctx),
        NodeType::Fader => source::fader(ctx),
        NodeType::Button => source::button(ctx),
        NodeType::Constant => source::constant(ctx),
        NodeType::ColorConstant => source::color_constant(ctx),
        NodeType::PositionConstant => source::position_constant(ctx),
        NodeType::SelectFixture => source::select_fixture(ctx),
        NodeType::SelectGroup => source::select_group(ctx),
        NodeType::Add => math::add(ctx),
        NodeType::Multiply => math::multiply(ctx),
        NodeType::Invert => math::invert(ctx),
        NodeType::MapRange => math::map_range(ctx),
        NodeType::Clamp01 => math::clamp01(ctx),
        NodeType::Gate => math::gate(ctx),
        NodeType::Toggle => effect::toggle(ctx),
        NodeType::SineLfo | NodeType::TriangleLfo | NodeType::SawLfo | NodeType::SquareLfo => {
            effect::lfo(ctx)
        }
        NodeType::Smooth => effect::smooth(ctx),
        NodeType::MixColor => color::mix(ctx),
        NodeType::ScaleColor => color::scale(ctx),
        NodeType::MergeBundle => bundle::merge(ctx),
        NodeType::ScaleBundle => bundle::scale(ctx),
        NodeType::WriteAttributes => bundle::write_attributes(ctx),
    }
}
