// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! lux-core: deterministic effect-graph compiler and fixed-rate tick engine.
//!
//! The runtime pipeline: compile persisted graphs against the closed node
//! catalog, evaluate every enabled instance at a fixed rate, reduce competing
//! writes per fixture by priority, and emit one immutable frame per tick to
//! the registered sinks (Art-Net bridge, subscription gateway).
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
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::float_cmp,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

mod catalog;
mod compile;
mod driver;
mod engine;
/// Per-node evaluator functions and their shared context.
pub mod eval;
mod frame;
mod ident;
mod inputs;
mod model;
mod port;
mod reduce;

// Re-exports for stable public API
/// Closed node catalog: types, ports, defaults, parameter schemas.
pub use catalog::{
    InputPortSpec, NodeCategory, NodeSpec, NodeType, OutputPortSpec, ParamKind, ParamSpec,
    PortDefault, CATALOG,
};
/// Graph compiler and its artifacts.
pub use compile::{
    compile, CompileError, CompileErrorCode, CompiledGraph, CompiledNode, Dependencies,
    IncomingEdge,
};
/// Tick driver thread and its handle.
pub use driver::{spawn, DriverError, DriverHandle};
/// The tick engine and its command set.
pub use engine::{Command, Engine, Instance, DEFAULT_TICK_HZ, MAX_COMMANDS_PER_TICK};
/// Frame emission seam shared by all sinks.
pub use frame::{Frame, FrameSink, InstanceStatus, SinkFeedback};
/// Identifier newtypes.
pub use ident::{
    EdgeId, FixtureId, GraphId, GroupId, InputId, InstanceId, ModelId, NodeId,
};
/// Latched operator input state.
pub use inputs::{ButtonState, InputState};
/// Persisted entities and the runtime patch table.
pub use model::{
    ChannelRole, Edge, Endpoint, Fixture, FixtureModel, Graph, Group, InputDef, InputKind, Node,
    ParamValue, Patch,
};
/// Port-type algebra and runtime values.
pub use port::{AttributeBundle, Color, PortType, PortValue, Position, Selection};
/// Write reduction primitives.
pub use reduce::{reduce, Reduction, WriteRecord};
