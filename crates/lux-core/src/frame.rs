// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Finalized tick output.
//!
//! A [`Frame`] is the immutable product of one tick: the reduced per-fixture
//! attribute map plus tick metadata and per-instance status. The driver hands
//! the same frame to every [`FrameSink`] (Art-Net bridge, gateway); sinks
//! never mutate engine state directly — faults flow back through
//! [`SinkFeedback`].

use crate::ident::{FixtureId, GraphId, InstanceId};
use crate::model::Patch;
use crate::port::AttributeBundle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-instance status surfaced in frames and `runtime/status` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceStatus {
    /// Instance id.
    pub instance_id: InstanceId,
    /// Graph the instance was compiled from.
    pub graph_id: GraphId,
    /// Whether the instance participated in this tick.
    pub enabled: bool,
    /// Recovered soft errors since the instance was loaded.
    pub error_count: u32,
    /// Write records the instance emitted this tick (UI echo).
    pub writes: u32,
}

/// The finalized output of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Tick counter, starting at 1 for the first tick.
    pub frame_number: u64,
    /// Seconds since engine start.
    pub time: f64,
    /// Configured tick rate.
    pub tick_hz: f64,
    /// Reduced attribute bundle per fixture. `BTreeMap` so iteration (and
    /// therefore DMX encoding and delta diffing) is deterministic.
    pub fixtures: BTreeMap<FixtureId, AttributeBundle>,
    /// Status of every loaded instance, in stable rank order.
    pub instances: Vec<InstanceStatus>,
    /// Winning writer per fixture; engine-internal attribution for bridge
    /// faults, never serialized.
    #[serde(skip)]
    pub sources: BTreeMap<FixtureId, InstanceId>,
}

/// Fault report returned by a sink for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkFeedback {
    /// Fixtures whose writes were dropped (e.g. missing model); the driver
    /// attributes each to the owning instance via [`Frame::sources`].
    pub dropped_fixtures: Vec<FixtureId>,
}

/// Output seam fed by the tick driver.
///
/// Implementations must not block: the driver invokes them on the tick
/// thread between deadlines.
pub trait FrameSink: Send {
    /// Consumes one finalized frame.
    fn frame(&mut self, frame: &Frame, patch: &Patch) -> SinkFeedback;

    /// Flushes terminal output (e.g. blackout packets) before the driver
    /// exits. Called exactly once, after the final frame.
    fn shutdown(&mut self);
}
