// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted show entities and the runtime patch table.
//!
//! Every persisted entity carries a monotonically increasing `revision`
//! maintained by the repository layer for optimistic concurrency. The engine
//! never touches revisions; it consumes an immutable [`Patch`] snapshot built
//! from the current fixture/model/group tables.

use crate::ident::{EdgeId, FixtureId, GraphId, GroupId, InputId, ModelId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbolic role of one DMX channel within a fixture model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    /// Master dimmer.
    Dimmer,
    /// Red color channel.
    Red,
    /// Green color channel.
    Green,
    /// Blue color channel.
    Blue,
    /// Dedicated white channel (RGBW fixtures).
    White,
    /// Pan coarse byte.
    Pan,
    /// Pan fine byte (16-bit movers).
    PanFine,
    /// Tilt coarse byte.
    Tilt,
    /// Tilt fine byte (16-bit movers).
    TiltFine,
    /// Beam zoom.
    Zoom,
    /// Shutter / strobe.
    Shutter,
}

/// Descriptor mapping symbolic channel roles to 1-based DMX offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureModel {
    /// Repository id.
    pub id: ModelId,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Manufacturer name.
    pub brand: String,
    /// Model name.
    pub model: String,
    /// Role → 1-based channel offset within the fixture's footprint.
    pub channels: BTreeMap<ChannelRole, u16>,
}

impl FixtureModel {
    /// Number of DMX channels this model occupies (highest declared offset).
    #[must_use]
    pub fn channel_count(&self) -> u16 {
        self.channels.values().copied().max().unwrap_or(0)
    }

    /// Returns the 1-based offset for `role`, if the model declares it.
    #[must_use]
    pub fn offset(&self, role: ChannelRole) -> Option<u16> {
        self.channels.get(&role).copied()
    }
}

/// A physical light patched at a DMX address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Repository id.
    pub id: FixtureId,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Operator-facing name.
    pub name: String,
    /// Model describing the channel layout.
    pub model_id: ModelId,
    /// Logical DMX universe.
    pub universe: u16,
    /// First occupied channel, `1..=512`.
    ///
    /// Invariant (enforced by the store): `start_channel + channel_count - 1
    /// ≤ 512` for the referenced model.
    pub start_channel: u16,
}

/// A named, ordered collection of fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Repository id.
    pub id: GroupId,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Operator-facing name.
    pub name: String,
    /// Member fixtures. Every referenced fixture exists; fixture deletion
    /// cascades as membership removal.
    pub fixture_ids: Vec<FixtureId>,
}

/// Kind of an operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Continuous control carrying a scalar in `[0, 1]`.
    Fader,
    /// Momentary control carrying an edge-triggered press plus a held level.
    Button,
}

/// An operator input definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDef {
    /// Repository id.
    pub id: InputId,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Operator-facing name.
    pub name: String,
    /// Fader or button.
    pub kind: InputKind,
}

/// Typed parameter value attached to a graph node.
///
/// Untagged on the wire: `0.5`, `"fx-1"`, `true`, and `["g-1", "g-2"]` all
/// deserialize to the matching variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Numeric parameter.
    Number(f64),
    /// Boolean parameter.
    Bool(bool),
    /// String parameter (typically an entity id).
    String(String),
    /// List-of-strings parameter (typically entity ids).
    StringList(Vec<String>),
}

impl ParamValue {
    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the string list, if this is one.
    #[must_use]
    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::StringList(v) => Some(v),
            _ => None,
        }
    }
}

/// One node of an effect graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Graph-local id.
    pub id: NodeId,
    /// Node type name, resolved against the catalog at compile time.
    ///
    /// Kept as a string so a graph referencing a retired type still loads and
    /// reports `UNKNOWN_NODE_TYPE` instead of failing to deserialize.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Per-node parameters, validated against the catalog's schema.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Editor canvas position. Carried verbatim; never read by the runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
}

impl Node {
    /// Returns the node's numeric parameter `name`, if present.
    #[must_use]
    pub fn number_param(&self, name: &str) -> Option<f64> {
        self.params.get(name).and_then(ParamValue::as_number)
    }
}

/// One endpoint of an edge: a node and one of its ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Node the port belongs to.
    pub node: NodeId,
    /// Port name as declared in the catalog.
    pub port: String,
}

/// A directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Graph-local id.
    pub id: EdgeId,
    /// Source output port.
    pub from: Endpoint,
    /// Destination input port.
    pub to: Endpoint,
}

/// A persisted effect graph: nodes plus wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Repository id.
    pub id: GraphId,
    /// Optimistic-concurrency revision.
    pub revision: u64,
    /// Operator-facing name.
    pub name: String,
    /// Nodes in declared order. Declaration order is the deterministic
    /// tie-break for compilation and evaluation.
    pub nodes: Vec<Node>,
    /// Edges in declared order.
    pub edges: Vec<Edge>,
    /// Whether the graph's instance participates in ticks.
    pub enabled: bool,
}

/// Immutable runtime snapshot of the patched rig.
///
/// Built by the server from the current repository tables and handed to the
/// engine as a whole (`Arc`-shared); evaluators resolve selections against it
/// and the bridge resolves DMX channel layouts from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    /// Fixtures by id.
    pub fixtures: BTreeMap<FixtureId, Fixture>,
    /// Fixture models by id.
    pub models: BTreeMap<ModelId, FixtureModel>,
    /// Group membership by id.
    pub groups: BTreeMap<GroupId, Vec<FixtureId>>,
}

impl Patch {
    /// Returns true when `id` names a patched fixture.
    #[must_use]
    pub fn has_fixture(&self, id: &FixtureId) -> bool {
        self.fixtures.contains_key(id)
    }

    /// Returns the members of group `id`, if the group exists.
    #[must_use]
    pub fn group_members(&self, id: &GroupId) -> Option<&[FixtureId]> {
        self.groups.get(id).map(Vec::as_slice)
    }

    /// Returns the model for a fixture, if both exist.
    #[must_use]
    pub fn model_for(&self, id: &FixtureId) -> Option<&FixtureModel> {
        self.fixtures
            .get(id)
            .and_then(|f| self.models.get(&f.model_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_count_is_highest_offset() {
        let model = FixtureModel {
            id: ModelId::new("m-1"),
            revision: 1,
            brand: "Generic".into(),
            model: "RGB Par".into(),
            channels: BTreeMap::from([
                (ChannelRole::Red, 1),
                (ChannelRole::Green, 2),
                (ChannelRole::Blue, 3),
            ]),
        };
        assert_eq!(model.channel_count(), 3);
        assert_eq!(model.offset(ChannelRole::Green), Some(2));
        assert_eq!(model.offset(ChannelRole::Dimmer), None);
    }

    #[test]
    fn node_type_round_trips_through_rename() {
        let json = r#"{"id":"n1","type":"SineLFO","params":{"frequency":2.0}}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.node_type, "SineLFO");
        assert_eq!(node.number_param("frequency"), Some(2.0));
        assert!(node.position.is_none());
    }

    #[test]
    fn param_values_deserialize_untagged() {
        let params: BTreeMap<String, ParamValue> = serde_json::from_str(
            r#"{"priority": 10.0, "fader_id": "in-1", "group_ids": ["g-1", "g-2"], "latch": true}"#,
        )
        .unwrap();
        assert_eq!(params["priority"].as_number(), Some(10.0));
        assert_eq!(params["fader_id"].as_str(), Some("in-1"));
        assert_eq!(params["group_ids"].as_str_list().unwrap().len(), 2);
        assert_eq!(params["latch"], ParamValue::Bool(true));
    }

    #[test]
    fn patch_resolves_model_through_fixture() {
        let mut patch = Patch::default();
        patch.models.insert(
            ModelId::new("m-1"),
            FixtureModel {
                id: ModelId::new("m-1"),
                revision: 1,
                brand: "Generic".into(),
                model: "Dimmer".into(),
                channels: BTreeMap::from([(ChannelRole::Dimmer, 1)]),
            },
        );
        patch.fixtures.insert(
            FixtureId::new("fx-1"),
            Fixture {
                id: FixtureId::new("fx-1"),
                revision: 1,
                name: "Front wash".into(),
                model_id: ModelId::new("m-1"),
                universe: 0,
                start_channel: 10,
            },
        );
        assert!(patch.has_fixture(&FixtureId::new("fx-1")));
        assert_eq!(
            patch.model_for(&FixtureId::new("fx-1")).unwrap().id,
            ModelId::new("m-1")
        );
        assert!(patch.model_for(&FixtureId::new("fx-2")).is_none());
    }
}
