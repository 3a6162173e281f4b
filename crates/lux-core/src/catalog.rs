// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The closed node catalog.
//!
//! Every node type the compiler accepts is enumerated here with its declared
//! input ports (type + optional default), output ports, and parameter schema.
//! The catalog is the single source of truth consulted by both the compiler
//! (type checking, required-input coverage, param validation) and the
//! evaluators (default resolution).
//!
//! Ordering matters: port and param iteration follows declaration order in
//! this file, which makes compile errors and evaluation deterministic.

use crate::port::{Color, PortType, PortValue};
use serde::{Deserialize, Serialize};

/// Node type discriminant. The set is closed; unknown names in persisted
/// graphs surface as `UNKNOWN_NODE_TYPE` compile errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Engine clock source.
    Time,
    /// Latched fader input.
    Fader,
    /// Latched button input (edge + level).
    Button,
    /// Scalar constant.
    Constant,
    /// Color built from scalar components.
    ColorConstant,
    /// Position built from scalar components.
    PositionConstant,
    /// Explicit fixture selection.
    SelectFixture,
    /// Group-resolved fixture selection.
    SelectGroup,
    /// Scalar addition.
    Add,
    /// Scalar multiplication.
    Multiply,
    /// `1 - x`.
    Invert,
    /// Affine range map with guarded division.
    MapRange,
    /// Clip to `[0, 1]`.
    Clamp01,
    /// Passes a scalar while the gate level is high, zero otherwise.
    Gate,
    /// Sine oscillator.
    #[serde(rename = "SineLFO")]
    SineLfo,
    /// Triangle oscillator.
    #[serde(rename = "TriangleLFO")]
    TriangleLfo,
    /// Sawtooth oscillator.
    #[serde(rename = "SawLFO")]
    SawLfo,
    /// Square oscillator.
    #[serde(rename = "SquareLFO")]
    SquareLfo,
    /// One-pole smoothing filter.
    Smooth,
    /// Flip-flop toggled by a trigger edge.
    Toggle,
    /// Componentwise color interpolation.
    MixColor,
    /// Color multiplied by a scalar.
    ScaleColor,
    /// Attribute-wise bundle overlay.
    MergeBundle,
    /// Bundle multiplied by a scalar.
    ScaleBundle,
    /// Sink: writes a bundle to a selection at a priority.
    WriteAttributes,
}

impl NodeType {
    /// Resolves a persisted type name to a catalog entry.
    #[must_use]
    pub fn parse(name: &str) -> Option<NodeType> {
        CATALOG
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.node_type)
    }

    /// Canonical type name as it appears in persisted graphs.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Returns the catalog entry for this type.
    #[must_use]
    // CATALOG is declaration-complete: one entry per variant.
    #[allow(clippy::unwrap_used)]
    pub fn spec(self) -> &'static NodeSpec {
        CATALOG.iter().find(|s| s.node_type == self).unwrap()
    }
}

/// Functional category of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// External operator inputs and the clock.
    Input,
    /// Literal values.
    Constant,
    /// Fixture selection.
    Selection,
    /// Scalar arithmetic.
    Math,
    /// Stateful generators and filters.
    Effect,
    /// Color transforms.
    Color,
    /// Position transforms.
    Position,
    /// Bundle combinators.
    Bundle,
    /// Sinks read by the engine.
    Output,
}

/// Statically constructible default for an input port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortDefault {
    /// Scalar default.
    Scalar(f64),
    /// Boolean default.
    Bool(bool),
    /// Color default.
    Color(f64, f64, f64),
}

impl PortDefault {
    /// Materializes the default as a runtime value.
    #[must_use]
    pub fn value(self) -> PortValue {
        match self {
            PortDefault::Scalar(v) => PortValue::Scalar(v),
            PortDefault::Bool(v) => PortValue::Bool(v),
            PortDefault::Color(r, g, b) => PortValue::Color(Color::new(r, g, b)),
        }
    }
}

/// Declared input port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputPortSpec {
    /// Port name.
    pub name: &'static str,
    /// Declared type.
    pub ty: PortType,
    /// Default used when the port has no incoming edge and no same-named
    /// param. `None` on a `Bundle`/`Selection`/`Trigger` port makes the port
    /// required.
    pub default: Option<PortDefault>,
}

impl InputPortSpec {
    /// A port is required when it has no declared default and its type is in
    /// the non-defaulting set.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.default.is_none()
            && matches!(
                self.ty,
                PortType::Bundle | PortType::Selection | PortType::Trigger
            )
    }
}

/// Declared output port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputPortSpec {
    /// Port name.
    pub name: &'static str,
    /// Declared type.
    pub ty: PortType,
}

/// Primitive type of a node parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `f64`.
    Number,
    /// `bool`.
    Bool,
    /// String (typically an entity id).
    String,
    /// List of strings (typically entity ids).
    StringList,
}

/// Declared node parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Primitive type.
    pub kind: ParamKind,
    /// Whether the param must be present.
    pub required: bool,
    /// Inclusive lower bound for numeric params.
    pub min: Option<f64>,
    /// Inclusive upper bound for numeric params.
    pub max: Option<f64>,
}

const fn num_param(name: &'static str, min: Option<f64>, max: Option<f64>) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Number,
        required: false,
        min,
        max,
    }
}

const fn scalar_in(name: &'static str, default: f64) -> InputPortSpec {
    InputPortSpec {
        name,
        ty: PortType::Scalar,
        default: Some(PortDefault::Scalar(default)),
    }
}

const fn scalar_out(name: &'static str) -> OutputPortSpec {
    OutputPortSpec {
        name,
        ty: PortType::Scalar,
    }
}

/// Full catalog entry for one node type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSpec {
    /// Type discriminant.
    pub node_type: NodeType,
    /// Canonical persisted name.
    pub name: &'static str,
    /// Functional category.
    pub category: NodeCategory,
    /// Input ports in declaration order.
    pub inputs: &'static [InputPortSpec],
    /// Output ports in declaration order.
    pub outputs: &'static [OutputPortSpec],
    /// Parameter schema in declaration order.
    pub params: &'static [ParamSpec],
}

impl NodeSpec {
    /// Looks up an input port by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&'static InputPortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Looks up an output port by name.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&'static OutputPortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

const LFO_INPUTS: &[InputPortSpec] = &[scalar_in("frequency", 1.0), scalar_in("speed", 1.0)];
const LFO_OUTPUTS: &[OutputPortSpec] = &[scalar_out("value")];
const LFO_PARAMS: &[ParamSpec] = &[
    num_param("frequency", Some(0.0), None),
    num_param("speed", None, None),
    num_param("phase", Some(0.0), Some(1.0)),
];

/// The closed catalog, in declaration order.
pub static CATALOG: &[NodeSpec] = &[
    NodeSpec {
        node_type: NodeType::Time,
        name: "Time",
        category: NodeCategory::Input,
        inputs: &[],
        outputs: &[scalar_out("t"), scalar_out("dt")],
        params: &[],
    },
    NodeSpec {
        node_type: NodeType::Fader,
        name: "Fader",
        category: NodeCategory::Input,
        inputs: &[],
        outputs: &[scalar_out("value")],
        params: &[ParamSpec {
            name: "fader_id",
            kind: ParamKind::String,
            required: true,
            min: None,
            max: None,
        }],
    },
    NodeSpec {
        node_type: NodeType::Button,
        name: "Button",
        category: NodeCategory::Input,
        inputs: &[],
        outputs: &[
            OutputPortSpec {
                name: "pressed",
                ty: PortType::Trigger,
            },
            OutputPortSpec {
                name: "down",
                ty: PortType::Bool,
            },
        ],
        params: &[ParamSpec {
            name: "button_id",
            kind: ParamKind::String,
            required: true,
            min: None,
            max: None,
        }],
    },
    NodeSpec {
        node_type: NodeType::Constant,
        name: "Constant",
        category: NodeCategory::Constant,
        inputs: &[],
        outputs: &[scalar_out("value")],
        params: &[num_param("value", None, None)],
    },
    NodeSpec {
        node_type: NodeType::ColorConstant,
        name: "ColorConstant",
        category: NodeCategory::Constant,
        inputs: &[
            scalar_in("r", 0.0),
            scalar_in("g", 0.0),
            scalar_in("b", 0.0),
        ],
        outputs: &[OutputPortSpec {
            name: "color",
            ty: PortType::Color,
        }],
        params: &[
            num_param("r", Some(0.0), Some(1.0)),
            num_param("g", Some(0.0), Some(1.0)),
            num_param("b", Some(0.0), Some(1.0)),
        ],
    },
    NodeSpec {
        node_type: NodeType::PositionConstant,
        name: "PositionConstant",
        category: NodeCategory::Position,
        inputs: &[scalar_in("pan", 0.0), scalar_in("tilt", 0.0)],
        outputs: &[OutputPortSpec {
            name: "position",
            ty: PortType::Position,
        }],
        params: &[
            num_param("pan", Some(-1.0), Some(1.0)),
            num_param("tilt", Some(-1.0), Some(1.0)),
        ],
    },
    NodeSpec {
        node_type: NodeType::SelectFixture,
        name: "SelectFixture",
        category: NodeCategory::Selection,
        inputs: &[],
        outputs: &[OutputPortSpec {
            name: "selection",
            ty: PortType::Selection,
        }],
        params: &[ParamSpec {
            name: "fixture_ids",
            kind: ParamKind::StringList,
            required: true,
            min: None,
            max: None,
        }],
    },
    NodeSpec {
        node_type: NodeType::SelectGroup,
        name: "SelectGroup",
        category: NodeCategory::Selection,
        inputs: &[],
        outputs: &[OutputPortSpec {
            name: "selection",
            ty: PortType::Selection,
        }],
        params: &[ParamSpec {
            name: "group_ids",
            kind: ParamKind::StringList,
            required: true,
            min: None,
            max: None,
        }],
    },
    NodeSpec {
        node_type: NodeType::Add,
        name: "Add",
        category: NodeCategory::Math,
        inputs: &[scalar_in("a", 0.0), scalar_in("b", 0.0)],
        outputs: &[scalar_out("value")],
        params: &[num_param("a", None, None), num_param("b", None, None)],
    },
    NodeSpec {
        node_type: NodeType::Multiply,
        name: "Multiply",
        category: NodeCategory::Math,
        inputs: &[scalar_in("a", 0.0), scalar_in("b", 1.0)],
        outputs: &[scalar_out("value")],
        params: &[num_param("a", None, None), num_param("b", None, None)],
    },
    NodeSpec {
        node_type: NodeType::Invert,
        name: "Invert",
        category: NodeCategory::Math,
        inputs: &[scalar_in("value", 0.0)],
        outputs: &[scalar_out("value")],
        params: &[],
    },
    NodeSpec {
        node_type: NodeType::MapRange,
        name: "MapRange",
        category: NodeCategory::Math,
        inputs: &[
            scalar_in("value", 0.0),
            scalar_in("in_min", 0.0),
            scalar_in("in_max", 1.0),
            scalar_in("out_min", 0.0),
            scalar_in("out_max", 1.0),
        ],
        outputs: &[scalar_out("value")],
        params: &[
            num_param("value", None, None),
            num_param("in_min", None, None),
            num_param("in_max", None, None),
            num_param("out_min", None, None),
            num_param("out_max", None, None),
        ],
    },
    NodeSpec {
        node_type: NodeType::Clamp01,
        name: "Clamp01",
        category: NodeCategory::Math,
        inputs: &[scalar_in("value", 0.0)],
        outputs: &[scalar_out("value")],
        params: &[],
    },
    NodeSpec {
        node_type: NodeType::Gate,
        name: "Gate",
        category: NodeCategory::Math,
        inputs: &[
            scalar_in("value", 0.0),
            InputPortSpec {
                name: "gate",
                ty: PortType::Bool,
                default: Some(PortDefault::Bool(true)),
            },
        ],
        outputs: &[scalar_out("value")],
        params: &[
            num_param("value", None, None),
            ParamSpec {
                name: "gate",
                kind: ParamKind::Bool,
                required: false,
                min: None,
                max: None,
            },
        ],
    },
    NodeSpec {
        node_type: NodeType::SineLfo,
        name: "SineLFO",
        category: NodeCategory::Effect,
        inputs: LFO_INPUTS,
        outputs: LFO_OUTPUTS,
        params: LFO_PARAMS,
    },
    NodeSpec {
        node_type: NodeType::TriangleLfo,
        name: "TriangleLFO",
        category: NodeCategory::Effect,
        inputs: LFO_INPUTS,
        outputs: LFO_OUTPUTS,
        params: LFO_PARAMS,
    },
    NodeSpec {
        node_type: NodeType::SawLfo,
        name: "SawLFO",
        category: NodeCategory::Effect,
        inputs: LFO_INPUTS,
        outputs: LFO_OUTPUTS,
        params: LFO_PARAMS,
    },
    NodeSpec {
        node_type: NodeType::SquareLfo,
        name: "SquareLFO",
        category: NodeCategory::Effect,
        inputs: LFO_INPUTS,
        outputs: LFO_OUTPUTS,
        params: LFO_PARAMS,
    },
    NodeSpec {
        node_type: NodeType::Smooth,
        name: "Smooth",
        category: NodeCategory::Effect,
        inputs: &[scalar_in("value", 0.0), scalar_in("smoothing", 0.8)],
        outputs: &[scalar_out("value")],
        params: &[num_param("smoothing", Some(0.0), Some(1.0))],
    },
    NodeSpec {
        node_type: NodeType::Toggle,
        name: "Toggle",
        category: NodeCategory::Effect,
        inputs: &[InputPortSpec {
            name: "trigger",
            ty: PortType::Trigger,
            default: None,
        }],
        outputs: &[scalar_out("value")],
        params: &[],
    },
    NodeSpec {
        node_type: NodeType::MixColor,
        name: "MixColor",
        category: NodeCategory::Color,
        inputs: &[
            InputPortSpec {
                name: "a",
                ty: PortType::Color,
                default: Some(PortDefault::Color(0.0, 0.0, 0.0)),
            },
            InputPortSpec {
                name: "b",
                ty: PortType::Color,
                default: Some(PortDefault::Color(0.0, 0.0, 0.0)),
            },
            scalar_in("t", 0.5),
        ],
        outputs: &[OutputPortSpec {
            name: "color",
            ty: PortType::Color,
        }],
        params: &[num_param("t", Some(0.0), Some(1.0))],
    },
    NodeSpec {
        node_type: NodeType::ScaleColor,
        name: "ScaleColor",
        category: NodeCategory::Color,
        inputs: &[
            InputPortSpec {
                name: "color",
                ty: PortType::Color,
                default: Some(PortDefault::Color(1.0, 1.0, 1.0)),
            },
            scalar_in("scale", 1.0),
        ],
        outputs: &[OutputPortSpec {
            name: "color",
            ty: PortType::Color,
        }],
        params: &[
            num_param("r", Some(0.0), Some(1.0)),
            num_param("g", Some(0.0), Some(1.0)),
            num_param("b", Some(0.0), Some(1.0)),
        ],
    },
    NodeSpec {
        node_type: NodeType::MergeBundle,
        name: "MergeBundle",
        category: NodeCategory::Bundle,
        inputs: &[
            InputPortSpec {
                name: "base",
                ty: PortType::Bundle,
                default: None,
            },
            InputPortSpec {
                name: "override",
                ty: PortType::Bundle,
                default: None,
            },
        ],
        outputs: &[OutputPortSpec {
            name: "bundle",
            ty: PortType::Bundle,
        }],
        params: &[],
    },
    NodeSpec {
        node_type: NodeType::ScaleBundle,
        name: "ScaleBundle",
        category: NodeCategory::Bundle,
        inputs: &[
            InputPortSpec {
                name: "bundle",
                ty: PortType::Bundle,
                default: None,
            },
            scalar_in("scale", 1.0),
        ],
        outputs: &[OutputPortSpec {
            name: "bundle",
            ty: PortType::Bundle,
        }],
        params: &[],
    },
    NodeSpec {
        node_type: NodeType::WriteAttributes,
        name: "WriteAttributes",
        category: NodeCategory::Output,
        inputs: &[
            InputPortSpec {
                name: "selection",
                ty: PortType::Selection,
                default: None,
            },
            InputPortSpec {
                name: "bundle",
                ty: PortType::Bundle,
                default: None,
            },
            scalar_in("priority", 0.0),
        ],
        outputs: &[],
        params: &[num_param("priority", None, None)],
    },
];
