// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the Lux monitoring/control socket.
//!
//! JSON, one message per socket frame, discriminated by a `type` field whose
//! values are slash-namespaced kind strings (`input/fader`,
//! `runtime/subscribeFrames`, `frame/delta`, …). Client→server messages
//! translate to engine commands and take effect at the next tick boundary;
//! server→client messages carry status, compile results, and frame streams.
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
    clippy::module_name_repetitions,
    clippy::missing_const_for_fn,
    clippy::use_self
)]

pub mod wire;

use lux_core::{AttributeBundle, CompileError, FixtureId, GraphId, InputId, InstanceId, InstanceStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frame subscription mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionMode {
    /// Every frame carries the full filtered fixture map.
    Full,
    /// Frames carry only changes against the subscriber's last-sent state.
    Delta,
}

/// Stable error codes carried by `error` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The message was not valid JSON or had an invalid payload.
    ParseError,
    /// The `type` field named no known message kind.
    UnknownType,
}

/// Summary of the persisted show, broadcast on `show/changed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSummary {
    /// Patched fixtures.
    pub fixtures: usize,
    /// Fixture models.
    pub models: usize,
    /// Groups.
    pub groups: usize,
    /// Operator inputs.
    pub inputs: usize,
    /// Effect graphs.
    pub graphs: usize,
    /// Monotonic show change counter.
    pub revision: u64,
}

/// Client → server message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Latch a fader value.
    #[serde(rename = "input/fader")]
    Fader {
        /// Target fader.
        fader_id: InputId,
        /// New value in `[0, 1]`.
        value: f64,
    },
    /// Press and hold a button.
    #[serde(rename = "input/buttonDown")]
    ButtonDown {
        /// Target button.
        button_id: InputId,
    },
    /// Release a button.
    #[serde(rename = "input/buttonUp")]
    ButtonUp {
        /// Target button.
        button_id: InputId,
    },
    /// Synthesized down+up across a tick boundary.
    #[serde(rename = "input/buttonPress")]
    ButtonPress {
        /// Target button.
        button_id: InputId,
    },
    /// Subscribe to frame output.
    #[serde(rename = "runtime/subscribeFrames")]
    SubscribeFrames {
        /// Full or delta encoding.
        mode: SubscriptionMode,
        /// Optional fixture filter; absent means all fixtures.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fixture_ids: Option<Vec<FixtureId>>,
    },
    /// Cancel the frame subscription.
    #[serde(rename = "runtime/unsubscribeFrames")]
    UnsubscribeFrames,
    /// Enable or disable a loaded instance.
    #[serde(rename = "instance/setEnabled")]
    SetInstanceEnabled {
        /// Target instance.
        instance_id: InstanceId,
        /// New enablement.
        enabled: bool,
    },
}

impl ClientMessage {
    /// Canonical kind string for this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Fader { .. } => "input/fader",
            ClientMessage::ButtonDown { .. } => "input/buttonDown",
            ClientMessage::ButtonUp { .. } => "input/buttonUp",
            ClientMessage::ButtonPress { .. } => "input/buttonPress",
            ClientMessage::SubscribeFrames { .. } => "runtime/subscribeFrames",
            ClientMessage::UnsubscribeFrames => "runtime/unsubscribeFrames",
            ClientMessage::SetInstanceEnabled { .. } => "instance/setEnabled",
        }
    }
}

/// Server → client message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Engine status, sent on connect and on state change.
    #[serde(rename = "runtime/status")]
    Status {
        /// Configured tick rate.
        tick_hz: f64,
        /// Seconds since engine start.
        t: f64,
        /// Per-instance status in stable order.
        instances: Vec<InstanceStatus>,
    },
    /// Result of compiling one graph.
    #[serde(rename = "compile/result")]
    CompileResult {
        /// Compiled graph.
        graph_id: GraphId,
        /// Whether compilation succeeded.
        ok: bool,
        /// Diagnostics; empty on success.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<CompileError>,
    },
    /// Full frame snapshot (subscription mode `full`).
    #[serde(rename = "frame/full")]
    FrameFull {
        /// Tick the frame was produced on.
        frame_number: u64,
        /// Filtered fixture map.
        fixtures: BTreeMap<FixtureId, AttributeBundle>,
    },
    /// Frame changes against the subscriber's last-sent state (mode
    /// `delta`). A `null` value signals a fixture leaving the map.
    #[serde(rename = "frame/delta")]
    FrameDelta {
        /// Tick the frame was produced on.
        frame_number: u64,
        /// Changed entries; `None` encodes removal.
        changes: BTreeMap<FixtureId, Option<AttributeBundle>>,
    },
    /// The persisted show changed (entities created/updated/deleted).
    #[serde(rename = "show/changed")]
    ShowChanged {
        /// Summary of the current show.
        show: ShowSummary,
    },
    /// Protocol-level error reply.
    #[serde(rename = "error")]
    Error {
        /// Stable code.
        code: ErrorCode,
        /// Human-readable description.
        message: String,
    },
}

impl ServerMessage {
    /// Canonical kind string for this message.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Status { .. } => "runtime/status",
            ServerMessage::CompileResult { .. } => "compile/result",
            ServerMessage::FrameFull { .. } => "frame/full",
            ServerMessage::FrameDelta { .. } => "frame/delta",
            ServerMessage::ShowChanged { .. } => "show/changed",
            ServerMessage::Error { .. } => "error",
        }
    }
}
