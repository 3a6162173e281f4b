// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port-type algebra: the closed set of value types flowing along graph edges.
//!
//! Compatibility between an output port and an input port is asymmetric and
//! lives in exactly one place, [`PortType::accepts`]. The compiler consults it
//! while type-checking edges; the evaluators rely on [`PortValue::promote`]
//! performing the same coercions at runtime, so a successfully compiled graph
//! can never deliver an ill-typed value.

use crate::ident::FixtureId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Declared type of an input or output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// Continuous `f64`, nominally in `[0, 1]` unless stated otherwise.
    Scalar,
    /// Boolean level.
    Bool,
    /// Per-tick edge event; true for exactly the tick it fired on.
    Trigger,
    /// RGB color with components in `[0, 1]`.
    Color,
    /// Pan/tilt pair in `[-1, 1]`.
    Position,
    /// Sparse attribute bundle (pre-DMX fixture state).
    Bundle,
    /// Set of fixture ids.
    Selection,
}

impl PortType {
    /// Returns whether a value of type `from` may be delivered to an input
    /// port of type `self`.
    ///
    /// The rules are asymmetric:
    /// - identity always holds,
    /// - `Trigger → Bool` (edge collapses to level),
    /// - `Scalar → Bundle`, `Color → Bundle`, `Position → Bundle`
    ///   (auto-promotion to a single-attribute bundle),
    /// - everything else is a type mismatch.
    #[must_use]
    pub fn accepts(self, from: PortType) -> bool {
        if self == from {
            return true;
        }
        matches!(
            (from, self),
            (PortType::Trigger, PortType::Bool)
                | (
                    PortType::Scalar | PortType::Color | PortType::Position,
                    PortType::Bundle
                )
        )
    }
}

/// RGB color, components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Color {
    /// Red component.
    pub r: f64,
    /// Green component.
    pub g: f64,
    /// Blue component.
    pub b: f64,
}

impl Color {
    /// Constructs a color from components.
    #[must_use]
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Componentwise linear interpolation from `self` to `other`.
    #[must_use]
    pub fn lerp(self, other: Color, t: f64) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }

    /// Multiplies every channel by `scale`, clipping to `[0, 1]`.
    #[must_use]
    pub fn scaled(self, scale: f64) -> Color {
        Color {
            r: (self.r * scale).clamp(0.0, 1.0),
            g: (self.g * scale).clamp(0.0, 1.0),
            b: (self.b * scale).clamp(0.0, 1.0),
        }
    }
}

/// Pan/tilt position, both in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    /// Horizontal axis.
    pub pan: f64,
    /// Vertical axis.
    pub tilt: f64,
}

/// Sparse normalized attribute record for one fixture, pre-DMX.
///
/// Absent attributes leave the corresponding DMX bytes untouched and fall
/// through to lower-priority writes during reduction. Equality is exact
/// `f64` equality; the delta encoder in the gateway depends on that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AttributeBundle {
    /// Dimmer level in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    /// RGB color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Pan in `[-1, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pan: Option<f64>,
    /// Tilt in `[-1, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt: Option<f64>,
    /// Zoom in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
}

impl AttributeBundle {
    /// Returns true when no attribute is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intensity.is_none()
            && self.color.is_none()
            && self.pan.is_none()
            && self.tilt.is_none()
            && self.zoom.is_none()
    }

    /// Overlays `other` on `self`: attributes present in `other` replace the
    /// corresponding attributes of `self`, absent ones fall through.
    #[must_use]
    pub fn overlaid(self, other: AttributeBundle) -> AttributeBundle {
        AttributeBundle {
            intensity: other.intensity.or(self.intensity),
            color: other.color.or(self.color),
            pan: other.pan.or(self.pan),
            tilt: other.tilt.or(self.tilt),
            zoom: other.zoom.or(self.zoom),
        }
    }

    /// Multiplies every present scalar-like attribute by `scale`, clipping to
    /// the attribute's legal range.
    #[must_use]
    pub fn scaled(self, scale: f64) -> AttributeBundle {
        AttributeBundle {
            intensity: self.intensity.map(|v| (v * scale).clamp(0.0, 1.0)),
            color: self.color.map(|c| c.scaled(scale)),
            pan: self.pan.map(|v| (v * scale).clamp(-1.0, 1.0)),
            tilt: self.tilt.map(|v| (v * scale).clamp(-1.0, 1.0)),
            zoom: self.zoom.map(|v| (v * scale).clamp(0.0, 1.0)),
        }
    }

    /// Bundle with every attribute present and zeroed.
    ///
    /// Used by the engine-level blackout override on shutdown.
    #[must_use]
    pub fn blackout() -> AttributeBundle {
        AttributeBundle {
            intensity: Some(0.0),
            color: Some(Color::default()),
            pan: Some(0.0),
            tilt: Some(0.0),
            zoom: Some(0.0),
        }
    }
}

/// Set of fixture ids produced by selector nodes and consumed by sinks.
///
/// Backed by a `BTreeSet` so iteration (and therefore selection expansion
/// during write reduction) is deterministic.
pub type Selection = BTreeSet<FixtureId>;

/// Runtime value carried by one output port for one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PortValue {
    /// Continuous scalar.
    Scalar(f64),
    /// Boolean level.
    Bool(bool),
    /// Per-tick edge event.
    Trigger(bool),
    /// RGB color.
    Color(Color),
    /// Pan/tilt pair.
    Position(Position),
    /// Sparse attribute bundle.
    Bundle(AttributeBundle),
    /// Fixture selection.
    Selection(Selection),
}

impl PortValue {
    /// Returns the port type of this value.
    #[must_use]
    pub fn port_type(&self) -> PortType {
        match self {
            PortValue::Scalar(_) => PortType::Scalar,
            PortValue::Bool(_) => PortType::Bool,
            PortValue::Trigger(_) => PortType::Trigger,
            PortValue::Color(_) => PortType::Color,
            PortValue::Position(_) => PortType::Position,
            PortValue::Bundle(_) => PortType::Bundle,
            PortValue::Selection(_) => PortType::Selection,
        }
    }

    /// Coerces this value to `target`, applying the implicit promotions of
    /// [`PortType::accepts`]. Returns `None` for incompatible pairs.
    #[must_use]
    pub fn promote(self, target: PortType) -> Option<PortValue> {
        if self.port_type() == target {
            return Some(self);
        }
        match (self, target) {
            (PortValue::Trigger(fired), PortType::Bool) => Some(PortValue::Bool(fired)),
            (PortValue::Scalar(v), PortType::Bundle) => Some(PortValue::Bundle(AttributeBundle {
                intensity: Some(v),
                ..AttributeBundle::default()
            })),
            (PortValue::Color(c), PortType::Bundle) => Some(PortValue::Bundle(AttributeBundle {
                color: Some(c),
                ..AttributeBundle::default()
            })),
            (PortValue::Position(p), PortType::Bundle) => {
                Some(PortValue::Bundle(AttributeBundle {
                    pan: Some(p.pan),
                    tilt: Some(p.tilt),
                    ..AttributeBundle::default()
                }))
            }
            _ => None,
        }
    }

    /// Zero/identity value for `ty`, used when no edge, param, or catalog
    /// default covers an input port.
    #[must_use]
    pub fn zero(ty: PortType) -> PortValue {
        match ty {
            PortType::Scalar => PortValue::Scalar(0.0),
            PortType::Bool => PortValue::Bool(false),
            PortType::Trigger => PortValue::Trigger(false),
            PortType::Color => PortValue::Color(Color::default()),
            PortType::Position => PortValue::Position(Position::default()),
            PortType::Bundle => PortValue::Bundle(AttributeBundle::default()),
            PortType::Selection => PortValue::Selection(Selection::new()),
        }
    }
}
