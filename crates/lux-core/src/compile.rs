// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Graph compiler: validates a persisted [`Graph`] against the catalog and
//! produces a [`CompiledGraph`] ready for tick evaluation.
//!
//! Compilation runs seven sequential passes:
//!
//! 1. type enumeration (unknown types short-circuit),
//! 2. cycle detection (iterative three-color DFS, first back-edge reported
//!    with its full path),
//! 3. topological order (Kahn's algorithm, declared order as tie-break),
//! 4. port typing per edge (promotion rules from [`PortType::accepts`]),
//! 5. required-input coverage,
//! 6. parameter validation against the catalog schema,
//! 7. dependency extraction (faders, buttons, groups, fixtures).
//!
//! All iteration follows declaration order — node order, edge order, catalog
//! port order — so two compilations of the same graph yield identical
//! evaluation orders and identical error lists.

use crate::catalog::{NodeType, ParamKind};
use crate::ident::{FixtureId, GraphId, GroupId, InputId, NodeId};
use crate::model::{Graph, ParamValue};
use crate::port::PortType;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Stable error codes surfaced in `compile/result` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompileErrorCode {
    /// A node's type name is not in the catalog.
    UnknownNodeType,
    /// The wiring contains a directed cycle.
    CycleDetected,
    /// An edge connects incompatible port types (or dangling/duplicate
    /// wiring that makes typing impossible).
    TypeMismatch,
    /// A required input port has no incoming edge.
    MissingConnection,
    /// A parameter is missing, has the wrong primitive type, or is out of
    /// its declared range.
    InvalidParam,
}

/// One compile diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileError {
    /// Node the diagnostic is anchored to, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Port name, for port-level diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Stable code.
    pub code: CompileErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Offending node path, for cycle reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<NodeId>>,
}

impl CompileError {
    fn node(node_id: &NodeId, code: CompileErrorCode, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node_id.clone()),
            port: None,
            code,
            message: message.into(),
            path: None,
        }
    }

    fn port(
        node_id: &NodeId,
        port: &str,
        code: CompileErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            node_id: Some(node_id.clone()),
            port: Some(port.to_owned()),
            code,
            message: message.into(),
            path: None,
        }
    }
}

/// External entities a compiled graph reads at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Faders referenced by `Fader` nodes.
    pub fader_ids: BTreeSet<InputId>,
    /// Buttons referenced by `Button` nodes.
    pub button_ids: BTreeSet<InputId>,
    /// Groups referenced by `SelectGroup` nodes.
    pub group_ids: BTreeSet<GroupId>,
    /// Fixtures referenced by `SelectFixture` nodes.
    pub fixture_ids: BTreeSet<FixtureId>,
}

/// A node as the evaluator sees it: resolved type, params, stable rank.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledNode {
    /// Resolved catalog type.
    pub node_type: NodeType,
    /// Validated parameters.
    pub params: BTreeMap<String, ParamValue>,
    /// Declaration index within the graph; the deterministic tie-break for
    /// write reduction.
    pub rank: u32,
}

/// A compile-validated incoming connection to one input port.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEdge {
    /// Destination input port on the owning node.
    pub port: String,
    /// Source node.
    pub from: NodeId,
    /// Source output port.
    pub from_port: String,
}

/// Result of a successful compilation.
///
/// Lives from the compile until the next revision of the graph; the engine
/// swaps an instance's compiled graph atomically at a tick boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGraph {
    /// Source graph.
    pub graph_id: GraphId,
    /// Source graph revision the compile was taken from.
    pub revision: u64,
    /// Nodes in evaluation order; for every edge `u → v`, `u` precedes `v`.
    pub evaluation_order: Vec<NodeId>,
    /// Per-node compiled form.
    pub nodes: FxHashMap<NodeId, CompiledNode>,
    /// Incoming edges grouped by destination node. Each input port has at
    /// most one entry (enforced by pass 4).
    pub incoming: FxHashMap<NodeId, Vec<IncomingEdge>>,
    /// `WriteAttributes` nodes in declared order.
    pub sinks: Vec<NodeId>,
    /// External reads.
    pub dependencies: Dependencies,
}

impl CompiledGraph {
    /// Returns the validated upstream connection feeding `(node, port)`.
    #[must_use]
    pub fn upstream(&self, node: &NodeId, port: &str) -> Option<&IncomingEdge> {
        self.incoming
            .get(node)?
            .iter()
            .find(|edge| edge.port == port)
    }
}

/// Compiles `graph`, returning either the compiled form or a non-empty list
/// of diagnostics. Pure: identical graphs produce identical results.
pub fn compile(graph: &Graph) -> Result<CompiledGraph, Vec<CompileError>> {
    let mut errors: Vec<CompileError> = Vec::new();

    // Pass 1: type enumeration. Unknown types make every later pass
    // meaningless, so they short-circuit.
    let mut types: FxHashMap<&NodeId, NodeType> = FxHashMap::default();
    for node in &graph.nodes {
        match NodeType::parse(&node.node_type) {
            Some(ty) => {
                types.insert(&node.id, ty);
            }
            None => errors.push(CompileError::node(
                &node.id,
                CompileErrorCode::UnknownNodeType,
                format!("unknown node type `{}`", node.node_type),
            )),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    // Forward adjacency in edge-declaration order, used by passes 2 and 3.
    let mut adjacency: FxHashMap<&NodeId, Vec<&NodeId>> = FxHashMap::default();
    for edge in &graph.edges {
        if types.contains_key(&edge.from.node) && types.contains_key(&edge.to.node) {
            adjacency
                .entry(&edge.from.node)
                .or_default()
                .push(&edge.to.node);
        }
    }

    // Pass 2: cycle detection.
    if let Some(path) = find_cycle(graph, &adjacency) {
        let names: Vec<&str> = path.iter().map(NodeId::as_str).collect();
        return Err(vec![CompileError {
            node_id: path.first().cloned(),
            port: None,
            code: CompileErrorCode::CycleDetected,
            message: format!("cycle detected: {}", names.join(" -> ")),
            path: Some(path),
        }]);
    }

    // Pass 3: topological order (Kahn). The queue is seeded in node
    // declaration order and successors are visited in edge declaration
    // order, which pins the evaluation order for equal-rank nodes.
    let evaluation_order = kahn_order(graph, &adjacency);

    // Pass 4: port typing. Builds the incoming-edge table as a side effect;
    // only well-typed, unique connections land in it.
    let mut incoming: FxHashMap<NodeId, Vec<IncomingEdge>> = FxHashMap::default();
    let mut occupied: BTreeSet<(&NodeId, &str)> = BTreeSet::new();
    for edge in &graph.edges {
        let (Some(from_ty), Some(to_ty)) = (types.get(&edge.from.node), types.get(&edge.to.node))
        else {
            let missing = if types.contains_key(&edge.from.node) {
                &edge.to
            } else {
                &edge.from
            };
            errors.push(CompileError::port(
                &missing.node,
                &missing.port,
                CompileErrorCode::TypeMismatch,
                format!("edge `{}` references an unknown node", edge.id),
            ));
            continue;
        };
        let Some(out_spec) = from_ty.spec().output(&edge.from.port) else {
            errors.push(CompileError::port(
                &edge.from.node,
                &edge.from.port,
                CompileErrorCode::TypeMismatch,
                format!("`{}` has no output port `{}`", from_ty.name(), edge.from.port),
            ));
            continue;
        };
        let Some(in_spec) = to_ty.spec().input(&edge.to.port) else {
            errors.push(CompileError::port(
                &edge.to.node,
                &edge.to.port,
                CompileErrorCode::TypeMismatch,
                format!("`{}` has no input port `{}`", to_ty.name(), edge.to.port),
            ));
            continue;
        };
        if !in_spec.ty.accepts(out_spec.ty) {
            errors.push(CompileError::port(
                &edge.to.node,
                &edge.to.port,
                CompileErrorCode::TypeMismatch,
                format!(
                    "cannot connect {:?} output `{}` to {:?} input `{}`",
                    out_spec.ty, edge.from.port, in_spec.ty, edge.to.port
                ),
            ));
            continue;
        }
        if !occupied.insert((&edge.to.node, in_spec.name)) {
            errors.push(CompileError::port(
                &edge.to.node,
                &edge.to.port,
                CompileErrorCode::TypeMismatch,
                "multiple edges into input port",
            ));
            continue;
        }
        incoming
            .entry(edge.to.node.clone())
            .or_default()
            .push(IncomingEdge {
                port: edge.to.port.clone(),
                from: edge.from.node.clone(),
                from_port: edge.from.port.clone(),
            });
    }

    // Pass 5: required-input coverage, in catalog port order.
    for node in &graph.nodes {
        let ty = types[&node.id];
        for input in ty.spec().inputs {
            if input.is_required() && !occupied.contains(&(&node.id, input.name)) {
                errors.push(CompileError::port(
                    &node.id,
                    input.name,
                    CompileErrorCode::MissingConnection,
                    format!("required input `{}` is not connected", input.name),
                ));
            }
        }
    }

    // Pass 6: parameter validation.
    for node in &graph.nodes {
        let spec = types[&node.id].spec();
        for param in spec.params {
            match node.params.get(param.name) {
                None if param.required => errors.push(CompileError::node(
                    &node.id,
                    CompileErrorCode::InvalidParam,
                    format!("missing required param `{}`", param.name),
                )),
                None => {}
                Some(value) => validate_param(&node.id, param, value, &mut errors),
            }
        }
        for name in node.params.keys() {
            if spec.param(name).is_none() {
                errors.push(CompileError::node(
                    &node.id,
                    CompileErrorCode::InvalidParam,
                    format!("unknown param `{name}` on `{}`", spec.name),
                ));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Pass 7: dependency extraction.
    let mut dependencies = Dependencies::default();
    let mut sinks = Vec::new();
    for node in &graph.nodes {
        match types[&node.id] {
            NodeType::Fader => {
                if let Some(id) = node.params.get("fader_id").and_then(ParamValue::as_str) {
                    dependencies.fader_ids.insert(InputId::new(id));
                }
            }
            NodeType::Button => {
                if let Some(id) = node.params.get("button_id").and_then(ParamValue::as_str) {
                    dependencies.button_ids.insert(InputId::new(id));
                }
            }
            NodeType::SelectGroup => {
                if let Some(ids) = node.params.get("group_ids").and_then(ParamValue::as_str_list) {
                    for id in ids {
                        dependencies.group_ids.insert(GroupId::new(id.clone()));
                    }
                }
            }
            NodeType::SelectFixture => {
                if let Some(ids) = node
                    .params
                    .get("fixture_ids")
                    .and_then(ParamValue::as_str_list)
                {
                    for id in ids {
                        dependencies.fixture_ids.insert(FixtureId::new(id.clone()));
                    }
                }
            }
            NodeType::WriteAttributes => sinks.push(node.id.clone()),
            _ => {}
        }
    }

    let nodes = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(rank, node)| {
            (
                node.id.clone(),
                CompiledNode {
                    node_type: types[&node.id],
                    params: node.params.clone(),
                    rank: rank as u32,
                },
            )
        })
        .collect();

    Ok(CompiledGraph {
        graph_id: graph.id.clone(),
        revision: graph.revision,
        evaluation_order,
        nodes,
        incoming,
        sinks,
        dependencies,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Iterative three-color DFS; returns the first back-edge's cycle path.
fn find_cycle(graph: &Graph, adjacency: &FxHashMap<&NodeId, Vec<&NodeId>>) -> Option<Vec<NodeId>> {
    let mut marks: FxHashMap<&NodeId, Mark> = graph
        .nodes
        .iter()
        .map(|node| (&node.id, Mark::White))
        .collect();
    const EMPTY: &[&NodeId] = &[];

    for root in &graph.nodes {
        if marks.get(&root.id) != Some(&Mark::White) {
            continue;
        }
        let mut stack: Vec<(&NodeId, usize)> = vec![(&root.id, 0)];
        marks.insert(&root.id, Mark::Gray);
        while let Some(top) = stack.last_mut() {
            let (node, next) = (top.0, top.1);
            let succs = adjacency.get(node).map_or(EMPTY, Vec::as_slice);
            if next < succs.len() {
                top.1 += 1;
                let succ = succs[next];
                match marks.get(succ) {
                    Some(Mark::White) => {
                        marks.insert(succ, Mark::Gray);
                        stack.push((succ, 0));
                    }
                    Some(Mark::Gray) => {
                        // Back edge: the cycle is the gray chain from `succ`
                        // to the top of the stack.
                        let start = stack.iter().position(|&(n, _)| n == succ).unwrap_or(0);
                        let mut path: Vec<NodeId> =
                            stack[start..].iter().map(|&(n, _)| n.clone()).collect();
                        path.push(succ.clone());
                        return Some(path);
                    }
                    _ => {}
                }
            } else {
                marks.insert(node, Mark::Black);
                stack.pop();
            }
        }
    }
    None
}

/// Kahn's algorithm over an acyclic graph; declared order breaks ties.
fn kahn_order(graph: &Graph, adjacency: &FxHashMap<&NodeId, Vec<&NodeId>>) -> Vec<NodeId> {
    let mut in_degree: FxHashMap<&NodeId, usize> = graph
        .nodes
        .iter()
        .map(|node| (&node.id, 0usize))
        .collect();
    for succs in adjacency.values() {
        for succ in succs {
            if let Some(d) = in_degree.get_mut(*succ) {
                *d += 1;
            }
        }
    }

    let mut queue: VecDeque<&NodeId> = graph
        .nodes
        .iter()
        .filter(|node| in_degree[&node.id] == 0)
        .map(|node| &node.id)
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(node) = queue.pop_front() {
        order.push(node.clone());
        for &succ in adjacency.get(node).map_or(&[][..], Vec::as_slice) {
            if let Some(d) = in_degree.get_mut(succ) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(succ);
                }
            }
        }
    }
    order
}

fn validate_param(
    node_id: &NodeId,
    param: &crate::catalog::ParamSpec,
    value: &ParamValue,
    errors: &mut Vec<CompileError>,
) {
    let kind_ok = match param.kind {
        ParamKind::Number => matches!(value, ParamValue::Number(_)),
        ParamKind::Bool => matches!(value, ParamValue::Bool(_)),
        ParamKind::String => matches!(value, ParamValue::String(_)),
        ParamKind::StringList => matches!(value, ParamValue::StringList(_)),
    };
    if !kind_ok {
        errors.push(CompileError::node(
            node_id,
            CompileErrorCode::InvalidParam,
            format!("param `{}` has the wrong type", param.name),
        ));
        return;
    }
    if let ParamValue::Number(n) = value {
        if !n.is_finite() {
            errors.push(CompileError::node(
                node_id,
                CompileErrorCode::InvalidParam,
                format!("param `{}` must be finite", param.name),
            ));
            return;
        }
        let below = param.min.is_some_and(|min| *n < min);
        let above = param.max.is_some_and(|max| *n > max);
        if below || above {
            errors.push(CompileError::node(
                node_id,
                CompileErrorCode::InvalidParam,
                format!("param `{}` = {n} is out of range", param.name),
            ));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ident::EdgeId;
    use crate::model::{Edge, Endpoint, Node};

    fn node(id: &str, ty: &str) -> Node {
        Node {
            id: NodeId::new(id),
            node_type: ty.to_owned(),
            params: BTreeMap::new(),
            position: None,
        }
    }

    fn node_with(id: &str, ty: &str, params: &[(&str, ParamValue)]) -> Node {
        Node {
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
            ..node(id, ty)
        }
    }

    fn edge(id: &str, from: (&str, &str), to: (&str, &str)) -> Edge {
        Edge {
            id: EdgeId::new(id),
            from: Endpoint {
                node: NodeId::new(from.0),
                port: from.1.to_owned(),
            },
            to: Endpoint {
                node: NodeId::new(to.0),
                port: to.1.to_owned(),
            },
        }
    }

    fn graph(nodes: Vec<Node>, edges: Vec<Edge>) -> Graph {
        Graph {
            id: GraphId::new("g-1"),
            revision: 1,
            name: "test".into(),
            nodes,
            edges,
            enabled: true,
        }
    }

    #[test]
    fn empty_graph_compiles_to_empty_order() {
        let compiled = compile(&graph(vec![], vec![])).unwrap();
        assert!(compiled.evaluation_order.is_empty());
        assert!(compiled.sinks.is_empty());
    }

    #[test]
    fn unknown_type_short_circuits() {
        // A graph with both an unknown type and a cycle only reports the
        // unknown type.
        let g = graph(
            vec![node("a", "Strobe9000"), node("b", "Clamp01")],
            vec![
                edge("e1", ("b", "value"), ("b", "value")),
            ],
        );
        let errs = compile(&g).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, CompileErrorCode::UnknownNodeType);
        assert_eq!(errs[0].node_id, Some(NodeId::new("a")));
    }

    #[test]
    fn three_node_cycle_reports_one_error_with_full_path() {
        let g = graph(
            vec![
                node("a", "Clamp01"),
                node("b", "Clamp01"),
                node("c", "Clamp01"),
            ],
            vec![
                edge("e1", ("a", "value"), ("b", "value")),
                edge("e2", ("b", "value"), ("c", "value")),
                edge("e3", ("c", "value"), ("a", "value")),
            ],
        );
        let errs = compile(&g).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, CompileErrorCode::CycleDetected);
        let path = errs[0].path.as_ref().unwrap();
        for id in ["a", "b", "c"] {
            assert!(path.contains(&NodeId::new(id)), "path missing {id}");
        }
    }

    #[test]
    fn topological_order_respects_edges() {
        let g = graph(
            vec![
                node("sink", "Clamp01"),
                node("mid", "Invert"),
                node_with("src", "Constant", &[("value", ParamValue::Number(0.5))]),
            ],
            vec![
                edge("e1", ("src", "value"), ("mid", "value")),
                edge("e2", ("mid", "value"), ("sink", "value")),
            ],
        );
        let compiled = compile(&g).unwrap();
        let pos = |id: &str| {
            compiled
                .evaluation_order
                .iter()
                .position(|n| n == &NodeId::new(id))
                .unwrap()
        };
        assert!(pos("src") < pos("mid"));
        assert!(pos("mid") < pos("sink"));
    }

    #[test]
    fn independent_nodes_keep_declared_order() {
        let g = graph(
            vec![node("z", "Clamp01"), node("a", "Clamp01"), node("m", "Clamp01")],
            vec![],
        );
        let compiled = compile(&g).unwrap();
        assert_eq!(
            compiled.evaluation_order,
            vec![NodeId::new("z"), NodeId::new("a"), NodeId::new("m")]
        );
    }

    #[test]
    fn trigger_into_color_port_is_a_type_mismatch_on_port_a() {
        let g = graph(
            vec![
                node_with(
                    "btn",
                    "Button",
                    &[("button_id", ParamValue::String("in-1".into()))],
                ),
                node("mix", "MixColor"),
            ],
            vec![edge("e1", ("btn", "pressed"), ("mix", "a"))],
        );
        let errs = compile(&g).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, CompileErrorCode::TypeMismatch);
        assert_eq!(errs[0].port.as_deref(), Some("a"));
        assert_eq!(errs[0].node_id, Some(NodeId::new("mix")));
    }

    #[test]
    fn trigger_into_bool_port_is_accepted() {
        // No Bool input port exists in the closed catalog, so exercise the
        // promotion table directly alongside a compiling Trigger consumer.
        assert!(PortType::Bool.accepts(PortType::Trigger));
    }

    #[test]
    fn scalar_into_bundle_port_promotes() {
        let g = graph(
            vec![
                node_with("c", "Constant", &[("value", ParamValue::Number(1.0))]),
                node_with(
                    "sel",
                    "SelectFixture",
                    &[(
                        "fixture_ids",
                        ParamValue::StringList(vec!["fx-1".into()]),
                    )],
                ),
                node("w", "WriteAttributes"),
            ],
            vec![
                edge("e1", ("c", "value"), ("w", "bundle")),
                edge("e2", ("sel", "selection"), ("w", "selection")),
            ],
        );
        assert!(compile(&g).is_ok());
    }

    #[test]
    fn unconnected_required_ports_are_missing_connections() {
        let g = graph(vec![node("w", "WriteAttributes")], vec![]);
        let errs = compile(&g).unwrap_err();
        let ports: Vec<_> = errs.iter().filter_map(|e| e.port.as_deref()).collect();
        assert_eq!(ports, vec!["selection", "bundle"]);
        assert!(errs
            .iter()
            .all(|e| e.code == CompileErrorCode::MissingConnection));
    }

    #[test]
    fn duplicate_edges_into_one_port_are_rejected() {
        let g = graph(
            vec![
                node_with("c1", "Constant", &[("value", ParamValue::Number(0.1))]),
                node_with("c2", "Constant", &[("value", ParamValue::Number(0.2))]),
                node("inv", "Invert"),
            ],
            vec![
                edge("e1", ("c1", "value"), ("inv", "value")),
                edge("e2", ("c2", "value"), ("inv", "value")),
            ],
        );
        let errs = compile(&g).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].code, CompileErrorCode::TypeMismatch);
        assert!(errs[0].message.contains("multiple edges"));
    }

    #[test]
    fn param_validation_checks_presence_kind_and_range() {
        let g = graph(
            vec![
                // missing required fader_id
                node("f", "Fader"),
                // wrong kind
                node_with("b", "Button", &[("button_id", ParamValue::Number(3.0))]),
                // out of range
                node_with("s", "Smooth", &[("smoothing", ParamValue::Number(1.5))]),
                // unknown param name
                node_with("c", "Clamp01", &[("gain", ParamValue::Number(1.0))]),
            ],
            vec![],
        );
        let errs = compile(&g).unwrap_err();
        assert_eq!(errs.len(), 4);
        assert!(errs.iter().all(|e| e.code == CompileErrorCode::InvalidParam));
    }

    #[test]
    fn dependencies_are_extracted_from_params() {
        let g = graph(
            vec![
                node_with(
                    "f",
                    "Fader",
                    &[("fader_id", ParamValue::String("in-f".into()))],
                ),
                node_with(
                    "b",
                    "Button",
                    &[("button_id", ParamValue::String("in-b".into()))],
                ),
                node_with(
                    "sg",
                    "SelectGroup",
                    &[(
                        "group_ids",
                        ParamValue::StringList(vec!["g-1".into(), "g-2".into()]),
                    )],
                ),
                node_with(
                    "sf",
                    "SelectFixture",
                    &[("fixture_ids", ParamValue::StringList(vec!["fx-9".into()]))],
                ),
            ],
            vec![],
        );
        let compiled = compile(&g).unwrap();
        assert_eq!(
            compiled.dependencies.fader_ids,
            BTreeSet::from([InputId::new("in-f")])
        );
        assert_eq!(
            compiled.dependencies.button_ids,
            BTreeSet::from([InputId::new("in-b")])
        );
        assert_eq!(compiled.dependencies.group_ids.len(), 2);
        assert_eq!(
            compiled.dependencies.fixture_ids,
            BTreeSet::from([FixtureId::new("fx-9")])
        );
    }

    #[test]
    fn compile_is_deterministic() {
        let g = graph(
            vec![
                node_with("c", "Constant", &[("value", ParamValue::Number(1.0))]),
                node("i", "Invert"),
                node("cl", "Clamp01"),
            ],
            vec![
                edge("e1", ("c", "value"), ("i", "value")),
                edge("e2", ("i", "value"), ("cl", "value")),
            ],
        );
        let a = compile(&g).unwrap();
        let b = compile(&g).unwrap();
        assert_eq!(a.evaluation_order, b.evaluation_order);
        assert_eq!(a, b);
    }

    #[test]
    fn error_codes_serialize_screaming() {
        let json = serde_json::to_string(&CompileErrorCode::CycleDetected).unwrap();
        assert_eq!(json, "\"CYCLE_DETECTED\"");
    }
}
