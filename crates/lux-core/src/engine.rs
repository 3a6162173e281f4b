// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The tick engine.
//!
//! The engine exclusively owns the instance map, node states, latched inputs,
//! and the clock. External actors mutate it only through [`Command`]s drained
//! at the start of a tick, so every evaluator within one tick observes one
//! consistent world.
//!
//! A tick runs seven phases in order: command drain, clock advance,
//! per-instance evaluation, write collection, write reduction, input edge
//! reset, frame emission. Evaluation order within an instance is the compiled
//! `evaluation_order`; instances are visited in stable registration order
//! (monotonic rank), which also resolves reduction ties.

use crate::compile::CompiledGraph;
use crate::eval::{self, EvalContext, NodeState, PortMap, SinkWrite};
use crate::frame::{Frame, InstanceStatus};
use crate::ident::{GraphId, InputId, InstanceId};
use crate::inputs::InputState;
use crate::model::Patch;
use crate::port::AttributeBundle;
use crate::reduce::{reduce, Reduction, WriteRecord};
use rustc_hash::FxHashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Soft cap on commands applied per tick; excess commands stay queued for
/// the next drain.
pub const MAX_COMMANDS_PER_TICK: usize = 1024;

/// Default tick rate when none is configured.
pub const DEFAULT_TICK_HZ: f64 = 60.0;

/// External mutation applied at a tick boundary.
#[derive(Debug, Clone)]
pub enum Command {
    /// Latch a fader value.
    SetFader {
        /// Fader id.
        id: InputId,
        /// New value, clamped to `[0, 1]`.
        value: f64,
    },
    /// Press a button (level + edge).
    ButtonDown {
        /// Button id.
        id: InputId,
    },
    /// Release a button.
    ButtonUp {
        /// Button id.
        id: InputId,
    },
    /// Synthesized press: down and up applied within one drain, so the edge
    /// fires exactly once with the level released at end of tick.
    ButtonPress {
        /// Button id.
        id: InputId,
    },
    /// Enable or disable a loaded instance.
    SetInstanceEnabled {
        /// Instance id.
        id: InstanceId,
        /// New enablement.
        enabled: bool,
    },
    /// Insert an instance, or atomically replace an existing instance's
    /// compiled graph. Node state survives for nodes whose `(id, type)`
    /// matches the new compile; all other state starts fresh.
    LoadInstance {
        /// Instance id (stable across recompiles of the same graph).
        id: InstanceId,
        /// Source graph.
        graph_id: GraphId,
        /// Freshly compiled graph.
        compiled: Box<CompiledGraph>,
        /// Enablement taken from the persisted graph.
        enabled: bool,
    },
    /// Remove an instance.
    UnloadInstance {
        /// Instance id.
        id: InstanceId,
    },
    /// Swap the rig snapshot used for selection resolution and DMX mapping.
    SetPatch(Arc<Patch>),
    /// Engine-level override: every subsequent frame carries zeroed bundles
    /// for all patched fixtures. Enqueued by the driver during shutdown.
    Blackout,
}

/// A loaded, compiled graph participating in ticks.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Instance id.
    pub id: InstanceId,
    /// Source graph.
    pub graph_id: GraphId,
    /// Current compiled form.
    pub compiled: CompiledGraph,
    /// Whether the instance is evaluated.
    pub enabled: bool,
    rank: u64,
    node_state: FxHashMap<crate::ident::NodeId, NodeState>,
    error_count: u32,
    last_writes: u32,
}

impl Instance {
    /// Recovered soft errors since load.
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    fn status(&self) -> InstanceStatus {
        InstanceStatus {
            instance_id: self.id.clone(),
            graph_id: self.graph_id.clone(),
            enabled: self.enabled,
            error_count: self.error_count,
            writes: self.last_writes,
        }
    }
}

/// The tick engine. Single-owner: exactly one thread drives it.
#[derive(Debug)]
pub struct Engine {
    tick_hz: f64,
    time: f64,
    frame_number: u64,
    inputs: InputState,
    patch: Arc<Patch>,
    instances: Vec<Instance>,
    next_rank: u64,
    blackout: bool,
}

impl Engine {
    /// Creates an engine targeting `tick_hz` ticks per second. Non-finite or
    /// non-positive rates fall back to [`DEFAULT_TICK_HZ`].
    #[must_use]
    pub fn new(tick_hz: f64) -> Self {
        let tick_hz = if tick_hz.is_finite() && tick_hz > 0.0 {
            tick_hz
        } else {
            DEFAULT_TICK_HZ
        };
        Self {
            tick_hz,
            time: 0.0,
            frame_number: 0,
            inputs: InputState::new(),
            patch: Arc::new(Patch::default()),
            instances: Vec::new(),
            next_rank: 0,
            blackout: false,
        }
    }

    /// Configured tick rate.
    #[must_use]
    pub fn tick_hz(&self) -> f64 {
        self.tick_hz
    }

    /// Target tick period in seconds.
    #[must_use]
    pub fn period(&self) -> f64 {
        1.0 / self.tick_hz
    }

    /// Current rig snapshot (cheap `Arc` clone).
    #[must_use]
    pub fn patch(&self) -> Arc<Patch> {
        Arc::clone(&self.patch)
    }

    /// Loaded instances in stable rank order.
    #[must_use]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Applies one command immediately. Outside tests, commands arrive via
    /// the drained queue instead.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::SetFader { id, value } => self.inputs.set_fader(id, value),
            Command::ButtonDown { id } => self.inputs.button_down(id),
            Command::ButtonUp { id } => self.inputs.button_up(id),
            Command::ButtonPress { id } => {
                self.inputs.button_down(id.clone());
                self.inputs.button_up(id);
            }
            Command::SetInstanceEnabled { id, enabled } => {
                if let Some(instance) = self.instances.iter_mut().find(|i| i.id == id) {
                    instance.enabled = enabled;
                }
            }
            Command::LoadInstance {
                id,
                graph_id,
                compiled,
                enabled,
            } => self.load_instance(id, graph_id, *compiled, enabled),
            Command::UnloadInstance { id } => self.instances.retain(|i| i.id != id),
            Command::SetPatch(patch) => self.patch = patch,
            Command::Blackout => self.blackout = true,
        }
    }

    /// Attributes a sink-reported fault (e.g. missing model) to an instance.
    pub fn note_soft_error(&mut self, id: &InstanceId) {
        if let Some(instance) = self.instances.iter_mut().find(|i| &i.id == id) {
            instance.error_count = instance.error_count.saturating_add(1);
        }
    }

    fn load_instance(
        &mut self,
        id: InstanceId,
        graph_id: GraphId,
        compiled: CompiledGraph,
        enabled: bool,
    ) {
        if let Some(instance) = self.instances.iter_mut().find(|i| i.id == id) {
            // Atomic swap at the tick boundary: keep state only for nodes
            // whose (id, type) survives the recompile.
            let old = std::mem::take(&mut instance.node_state);
            instance.node_state = old
                .into_iter()
                .filter(|(node_id, _)| {
                    let old_ty = instance.compiled.nodes.get(node_id).map(|n| n.node_type);
                    let new_ty = compiled.nodes.get(node_id).map(|n| n.node_type);
                    old_ty.is_some() && old_ty == new_ty
                })
                .collect();
            instance.compiled = compiled;
            instance.graph_id = graph_id;
            instance.enabled = enabled;
        } else {
            let rank = self.next_rank;
            self.next_rank += 1;
            self.instances.push(Instance {
                id,
                graph_id,
                compiled,
                enabled,
                rank,
                node_state: FxHashMap::default(),
                error_count: 0,
                last_writes: 0,
            });
        }
    }

    /// Drains up to [`MAX_COMMANDS_PER_TICK`] queued commands; the rest stay
    /// queued for the next tick.
    pub fn drain(&mut self, commands: &Receiver<Command>) {
        for _ in 0..MAX_COMMANDS_PER_TICK {
            match commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(_) => break,
            }
        }
    }

    /// Runs one tick and returns the finalized frame.
    ///
    /// `dt` is the wall-clock delta supplied by the driver, clamped here to
    /// `[0, 2 * period]` to bound catch-up after a late wake.
    pub fn tick(&mut self, dt: f64, commands: &Receiver<Command>) -> Frame {
        // Phase 1: command drain.
        self.drain(commands);

        // Phase 2: clock advance.
        let dt = if dt.is_finite() {
            dt.clamp(0.0, 2.0 * self.period())
        } else {
            self.period()
        };
        self.time += dt;

        // Phases 3 + 4: evaluation and write collection.
        let mut records: Vec<WriteRecord> = Vec::new();
        for instance in &mut self.instances {
            if !instance.enabled {
                instance.last_writes = 0;
                continue;
            }
            let writes = evaluate_instance(instance, self.time, dt, &self.inputs, &self.patch);
            instance.last_writes = writes.len() as u32;
            for write in writes {
                let node_rank = instance
                    .compiled
                    .nodes
                    .get(&write.node)
                    .map_or(0, |n| n.rank);
                records.push(WriteRecord {
                    instance_id: instance.id.clone(),
                    instance_rank: instance.rank,
                    node: write.node,
                    node_rank,
                    selection: write.selection,
                    bundle: write.bundle,
                    priority: write.priority,
                });
            }
        }

        // Phase 5: write reduction (or the blackout override).
        let reduction = if self.blackout {
            let mut blackout = Reduction::default();
            for id in self.patch.fixtures.keys() {
                blackout
                    .fixtures
                    .insert(id.clone(), AttributeBundle::blackout());
            }
            blackout
        } else {
            reduce(&records)
        };

        // Phase 6: input edge reset — triggers are strictly per-tick.
        self.inputs.clear_edges();

        // Phase 7: frame emission.
        self.frame_number += 1;
        Frame {
            frame_number: self.frame_number,
            time: self.time,
            tick_hz: self.tick_hz,
            fixtures: reduction.fixtures,
            instances: self.instances.iter().map(Instance::status).collect(),
            sources: reduction.sources,
        }
    }
}

/// Evaluates one instance's nodes in compiled order, collecting sink writes.
fn evaluate_instance(
    instance: &mut Instance,
    time: f64,
    dt: f64,
    inputs: &InputState,
    patch: &Patch,
) -> Vec<SinkWrite> {
    let Instance {
        compiled,
        node_state,
        error_count,
        ..
    } = instance;

    let mut outputs = PortMap::default();
    let mut writes: Vec<SinkWrite> = Vec::new();
    for node_id in &compiled.evaluation_order {
        let Some(node) = compiled.nodes.get(node_id) else {
            continue;
        };
        let state = node_state.entry(node_id.clone()).or_default();
        let mut ctx = EvalContext {
            time,
            dt,
            inputs,
            patch,
            node_id,
            node,
            compiled,
            outputs: &outputs,
            state,
            errors: &mut *error_count,
            writes: &mut writes,
        };
        let produced = eval::evaluate(&mut ctx);
        if !produced.is_empty() {
            outputs.insert(node_id.clone(), produced);
        }
    }
    writes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::ident::{EdgeId, FixtureId, ModelId, NodeId};
    use crate::model::{
        ChannelRole, Edge, Endpoint, Fixture, FixtureModel, Graph, Node, ParamValue,
    };
    use std::collections::BTreeMap;
    use std::sync::mpsc;

    fn rgb_patch(fixtures: &[&str]) -> Arc<Patch> {
        let mut patch = Patch::default();
        patch.models.insert(
            ModelId::new("m-rgb"),
            FixtureModel {
                id: ModelId::new("m-rgb"),
                revision: 1,
                brand: "Generic".into(),
                model: "RGB Par".into(),
                channels: BTreeMap::from([
                    (ChannelRole::Red, 1),
                    (ChannelRole::Green, 2),
                    (ChannelRole::Blue, 3),
                ]),
            },
        );
        for (i, id) in fixtures.iter().enumerate() {
            patch.fixtures.insert(
                FixtureId::new(*id),
                Fixture {
                    id: FixtureId::new(*id),
                    revision: 1,
                    name: format!("fixture {id}"),
                    model_id: ModelId::new("m-rgb"),
                    universe: 0,
                    start_channel: 1 + (i as u16) * 3,
                },
            );
        }
        Arc::new(patch)
    }

    fn writer_graph(graph_id: &str, fixture: &str, intensity: f64, priority: f64) -> Graph {
        Graph {
            id: crate::ident::GraphId::new(graph_id),
            revision: 1,
            name: graph_id.to_owned(),
            nodes: vec![
                Node {
                    id: NodeId::new("level"),
                    node_type: "Constant".into(),
                    params: BTreeMap::from([("value".to_owned(), ParamValue::Number(intensity))]),
                    position: None,
                },
                Node {
                    id: NodeId::new("sel"),
                    node_type: "SelectFixture".into(),
                    params: BTreeMap::from([(
                        "fixture_ids".to_owned(),
                        ParamValue::StringList(vec![fixture.to_owned()]),
                    )]),
                    position: None,
                },
                Node {
                    id: NodeId::new("write"),
                    node_type: "WriteAttributes".into(),
                    params: BTreeMap::from([("priority".to_owned(), ParamValue::Number(priority))]),
                    position: None,
                },
            ],
            edges: vec![
                Edge {
                    id: EdgeId::new("e1"),
                    from: Endpoint {
                        node: NodeId::new("level"),
                        port: "value".into(),
                    },
                    to: Endpoint {
                        node: NodeId::new("write"),
                        port: "bundle".into(),
                    },
                },
                Edge {
                    id: EdgeId::new("e2"),
                    from: Endpoint {
                        node: NodeId::new("sel"),
                        port: "selection".into(),
                    },
                    to: Endpoint {
                        node: NodeId::new("write"),
                        port: "selection".into(),
                    },
                },
            ],
            enabled: true,
        }
    }

    fn load(engine: &mut Engine, instance: &str, graph: &Graph) {
        let compiled = compile(graph).unwrap();
        engine.apply(Command::LoadInstance {
            id: InstanceId::new(instance),
            graph_id: graph.id.clone(),
            compiled: Box::new(compiled),
            enabled: graph.enabled,
        });
    }

    fn tick(engine: &mut Engine, dt: f64) -> Frame {
        let (_tx, rx) = mpsc::channel();
        engine.tick(dt, &rx)
    }

    #[test]
    fn empty_engine_emits_empty_frames() {
        let mut engine = Engine::new(60.0);
        let frame = tick(&mut engine, 1.0 / 60.0);
        assert_eq!(frame.frame_number, 1);
        assert!(frame.fixtures.is_empty());
        assert!(frame.instances.is_empty());
    }

    #[test]
    fn higher_priority_writer_wins() {
        let mut engine = Engine::new(60.0);
        engine.apply(Command::SetPatch(rgb_patch(&["fx-1"])));
        load(&mut engine, "inst-a", &writer_graph("g-a", "fx-1", 0.5, 0.0));
        load(&mut engine, "inst-b", &writer_graph("g-b", "fx-1", 1.0, 10.0));

        let frame = tick(&mut engine, 1.0 / 60.0);
        assert_eq!(
            frame.fixtures[&FixtureId::new("fx-1")].intensity,
            Some(1.0)
        );
        assert_eq!(
            frame.sources[&FixtureId::new("fx-1")],
            InstanceId::new("inst-b")
        );
    }

    #[test]
    fn disabled_instances_do_not_write() {
        let mut engine = Engine::new(60.0);
        engine.apply(Command::SetPatch(rgb_patch(&["fx-1"])));
        load(&mut engine, "inst-a", &writer_graph("g-a", "fx-1", 0.5, 0.0));
        engine.apply(Command::SetInstanceEnabled {
            id: InstanceId::new("inst-a"),
            enabled: false,
        });

        let frame = tick(&mut engine, 1.0 / 60.0);
        assert!(frame.fixtures.is_empty());
        assert_eq!(frame.instances[0].writes, 0);
        assert!(!frame.instances[0].enabled);
    }

    #[test]
    fn dt_is_clamped_to_twice_the_period() {
        let mut engine = Engine::new(60.0);
        let frame = tick(&mut engine, 10.0);
        assert!((frame.time - 2.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn writes_on_tick_n_are_visible_on_frame_n() {
        let mut engine = Engine::new(60.0);
        engine.apply(Command::SetPatch(rgb_patch(&["fx-1"])));
        load(&mut engine, "inst-a", &writer_graph("g-a", "fx-1", 0.7, 0.0));
        let frame = tick(&mut engine, 1.0 / 60.0);
        assert_eq!(frame.instances[0].writes, 1);
        assert_eq!(
            frame.fixtures[&FixtureId::new("fx-1")].intensity,
            Some(0.7)
        );
    }

    #[test]
    fn commands_apply_at_tick_boundaries_via_drain() {
        let mut engine = Engine::new(60.0);
        engine.apply(Command::SetPatch(rgb_patch(&["fx-1"])));
        let (tx, rx) = mpsc::channel();
        tx.send(Command::SetFader {
            id: InputId::new("f-1"),
            value: 0.4,
        })
        .unwrap();
        let frame = engine.tick(1.0 / 60.0, &rx);
        assert_eq!(frame.frame_number, 1);
        assert_eq!(engine.inputs.fader(&InputId::new("f-1")), 0.4);
    }

    #[test]
    fn drain_caps_commands_per_tick() {
        let mut engine = Engine::new(60.0);
        let (tx, rx) = mpsc::channel();
        for i in 0..(MAX_COMMANDS_PER_TICK + 5) {
            tx.send(Command::SetFader {
                id: InputId::new("f"),
                value: (i as f64) / 2000.0,
            })
            .unwrap();
        }
        engine.drain(&rx);
        // five deferred commands remain queued
        let mut remaining = 0;
        while rx.try_recv().is_ok() {
            remaining += 1;
        }
        assert_eq!(remaining, 5);
    }

    #[test]
    fn unknown_selection_ids_count_one_error_per_tick() {
        let mut engine = Engine::new(60.0);
        engine.apply(Command::SetPatch(rgb_patch(&["fx-1"])));
        load(
            &mut engine,
            "inst-a",
            &writer_graph("g-a", "fx-ghost", 1.0, 0.0),
        );
        let first = tick(&mut engine, 1.0 / 60.0);
        let second = tick(&mut engine, 1.0 / 60.0);
        assert_eq!(first.instances[0].error_count, 1);
        assert_eq!(second.instances[0].error_count, 2);
        assert!(second.fixtures.is_empty());
    }

    #[test]
    fn recompile_preserves_state_for_matching_nodes() {
        let lfo_graph = |freq: f64| Graph {
            id: crate::ident::GraphId::new("g-lfo"),
            revision: 1,
            name: "lfo".into(),
            nodes: vec![Node {
                id: NodeId::new("osc"),
                node_type: "SawLFO".into(),
                params: BTreeMap::from([("frequency".to_owned(), ParamValue::Number(freq))]),
                position: None,
            }],
            edges: vec![],
            enabled: true,
        };

        let mut engine = Engine::new(10.0);
        load(&mut engine, "inst-lfo", &lfo_graph(1.0));
        tick(&mut engine, 0.1);
        tick(&mut engine, 0.1);
        let before = engine.instances[0].node_state[&NodeId::new("osc")];

        // Same node id and type: phase survives the reload.
        load(&mut engine, "inst-lfo", &lfo_graph(2.0));
        assert_eq!(
            engine.instances[0].node_state[&NodeId::new("osc")],
            before
        );

        // Different type under the same id: state resets.
        let mut changed = lfo_graph(2.0);
        changed.nodes[0].node_type = "SineLFO".into();
        load(&mut engine, "inst-lfo", &changed);
        assert!(engine.instances[0].node_state.is_empty());
    }

    #[test]
    fn toggling_enabled_without_ticks_preserves_node_state() {
        let mut engine = Engine::new(10.0);
        load(
            &mut engine,
            "inst-a",
            &writer_graph("g-a", "fx-1", 0.5, 0.0),
        );
        tick(&mut engine, 0.1);
        let before = engine.instances[0].node_state.clone();
        engine.apply(Command::SetInstanceEnabled {
            id: InstanceId::new("inst-a"),
            enabled: false,
        });
        engine.apply(Command::SetInstanceEnabled {
            id: InstanceId::new("inst-a"),
            enabled: true,
        });
        assert_eq!(engine.instances[0].node_state, before);
    }

    #[test]
    fn blackout_override_zeroes_every_patched_fixture() {
        let mut engine = Engine::new(60.0);
        engine.apply(Command::SetPatch(rgb_patch(&["fx-1", "fx-2"])));
        load(&mut engine, "inst-a", &writer_graph("g-a", "fx-1", 1.0, 0.0));
        engine.apply(Command::Blackout);
        let frame = tick(&mut engine, 1.0 / 60.0);
        assert_eq!(frame.fixtures.len(), 2);
        for bundle in frame.fixtures.values() {
            assert_eq!(bundle.intensity, Some(0.0));
        }
    }

    #[test]
    fn instance_order_is_stable_across_unload() {
        let mut engine = Engine::new(60.0);
        load(&mut engine, "inst-a", &writer_graph("g-a", "fx-1", 0.1, 0.0));
        load(&mut engine, "inst-b", &writer_graph("g-b", "fx-1", 0.2, 0.0));
        load(&mut engine, "inst-c", &writer_graph("g-c", "fx-1", 0.3, 0.0));
        engine.apply(Command::UnloadInstance {
            id: InstanceId::new("inst-b"),
        });
        load(&mut engine, "inst-d", &writer_graph("g-d", "fx-1", 0.4, 0.0));
        let ranks: Vec<u64> = engine.instances.iter().map(|i| i.rank).collect();
        assert_eq!(ranks, vec![0, 2, 3]);
    }
}
