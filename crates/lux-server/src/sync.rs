// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Show synchronization: persisted entities → engine commands.
//!
//! The CRUD layer mutates the [`ShowStore`] in-process; this module polls
//! its change counter and, on movement, rebuilds the rig patch, recompiles
//! every graph whose revision moved, and enqueues the matching engine
//! commands. Compile failures leave the instance in its previous compiled
//! form (or unloaded if it never compiled); the diagnostics go out as
//! `compile/result` broadcasts either way, followed by one `show/changed`.

use lux_core::{compile, Command, GraphId, InstanceId};
use lux_proto::{ServerMessage, ShowSummary};
use lux_store::ShowStore;
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Reconciles the persisted show with the running engine.
pub struct ShowSync {
    store: Arc<Mutex<ShowStore>>,
    commands: Sender<Command>,
    instances: BTreeMap<GraphId, InstanceId>,
    compiled_revisions: BTreeMap<GraphId, u64>,
    next_instance: u64,
    last_counter: Option<u64>,
}

impl ShowSync {
    /// Creates an idle synchronizer; call [`sync`](Self::sync) to reconcile.
    pub fn new(store: Arc<Mutex<ShowStore>>, commands: Sender<Command>) -> Self {
        Self {
            store,
            commands,
            instances: BTreeMap::new(),
            compiled_revisions: BTreeMap::new(),
            next_instance: 0,
            last_counter: None,
        }
    }

    fn instance_for(&mut self, graph_id: &GraphId) -> InstanceId {
        if let Some(id) = self.instances.get(graph_id) {
            return id.clone();
        }
        self.next_instance += 1;
        let id = InstanceId::new(format!("inst-{}", self.next_instance));
        self.instances.insert(graph_id.clone(), id.clone());
        id
    }

    /// Runs one reconciliation pass. Returns the broadcast messages the
    /// gateway should fan out; empty when the show is unchanged.
    pub fn sync(&mut self) -> Vec<ServerMessage> {
        let (counter, counts, patch, graphs) = {
            let Ok(store) = self.store.lock() else {
                warn!("show store mutex poisoned; skipping sync");
                return Vec::new();
            };
            (
                store.change_counter(),
                store.counts(),
                store.build_patch(),
                store.graphs().list(),
            )
        };
        if self.last_counter == Some(counter) {
            return Vec::new();
        }
        self.last_counter = Some(counter);

        let mut messages = Vec::new();
        let _ = self.commands.send(Command::SetPatch(Arc::new(patch)));

        // Unload instances whose graph was deleted.
        let live: std::collections::BTreeSet<&GraphId> = graphs.iter().map(|g| &g.id).collect();
        let deleted: Vec<GraphId> = self
            .instances
            .keys()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        for graph_id in deleted {
            if let Some(instance_id) = self.instances.remove(&graph_id) {
                info!(%graph_id, %instance_id, "unloading instance for deleted graph");
                let _ = self.commands.send(Command::UnloadInstance { id: instance_id });
                self.compiled_revisions.remove(&graph_id);
            }
        }

        // (Re)compile graphs whose revision moved.
        for graph in &graphs {
            if self.compiled_revisions.get(&graph.id) == Some(&graph.revision) {
                continue;
            }
            match compile(graph) {
                Ok(compiled) => {
                    let instance_id = self.instance_for(&graph.id);
                    info!(graph_id = %graph.id, revision = graph.revision, %instance_id, "graph compiled");
                    let _ = self.commands.send(Command::LoadInstance {
                        id: instance_id,
                        graph_id: graph.id.clone(),
                        compiled: Box::new(compiled),
                        enabled: graph.enabled,
                    });
                    self.compiled_revisions.insert(graph.id.clone(), graph.revision);
                    messages.push(ServerMessage::CompileResult {
                        graph_id: graph.id.clone(),
                        ok: true,
                        errors: Vec::new(),
                    });
                }
                Err(errors) => {
                    // Previous compiled form (if any) keeps running.
                    warn!(graph_id = %graph.id, count = errors.len(), "graph failed to compile");
                    messages.push(ServerMessage::CompileResult {
                        graph_id: graph.id.clone(),
                        ok: false,
                        errors,
                    });
                }
            }
        }

        messages.push(ServerMessage::ShowChanged {
            show: ShowSummary {
                fixtures: counts.fixtures,
                models: counts.models,
                groups: counts.groups,
                inputs: counts.inputs,
                graphs: counts.graphs,
                revision: counter,
            },
        });
        messages
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lux_core::{Graph, Node, NodeId};
    use lux_store::{MemTableStore, ShowStore};
    use std::collections::BTreeMap as Map;
    use std::sync::mpsc;

    fn clamp_graph(enabled: bool) -> Graph {
        Graph {
            id: GraphId::new(""),
            revision: 0,
            name: "g".into(),
            nodes: vec![Node {
                id: NodeId::new("a"),
                node_type: "Clamp01".into(),
                params: Map::new(),
                position: None,
            }],
            edges: vec![],
            enabled,
        }
    }

    fn harness() -> (Arc<Mutex<ShowStore>>, ShowSync, mpsc::Receiver<Command>) {
        let store = Arc::new(Mutex::new(
            ShowStore::open(Arc::new(MemTableStore::new())).unwrap(),
        ));
        let (tx, rx) = mpsc::channel();
        let sync = ShowSync::new(Arc::clone(&store), tx);
        (store, sync, rx)
    }

    fn drain(rx: &mpsc::Receiver<Command>) -> Vec<Command> {
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    #[test]
    fn first_sync_loads_every_graph_and_summarizes() {
        let (store, mut sync, rx) = harness();
        store
            .lock()
            .unwrap()
            .create_graph(clamp_graph(true))
            .unwrap();

        let messages = sync.sync();
        let commands = drain(&rx);
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::SetPatch(_))));
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::LoadInstance { .. })));
        assert!(matches!(
            messages[0],
            ServerMessage::CompileResult { ok: true, .. }
        ));
        assert!(matches!(
            messages.last().unwrap(),
            ServerMessage::ShowChanged { .. }
        ));
    }

    #[test]
    fn unchanged_show_syncs_to_nothing() {
        let (store, mut sync, rx) = harness();
        store
            .lock()
            .unwrap()
            .create_graph(clamp_graph(true))
            .unwrap();
        sync.sync();
        drain(&rx);

        assert!(sync.sync().is_empty());
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn instance_ids_are_stable_across_recompiles() {
        let (store, mut sync, rx) = harness();
        let created = store
            .lock()
            .unwrap()
            .create_graph(clamp_graph(true))
            .unwrap();
        sync.sync();
        let first = drain(&rx);

        let mut renamed = created.clone();
        renamed.name = "renamed".into();
        store
            .lock()
            .unwrap()
            .update_graph(created.id.as_str(), renamed, 1)
            .unwrap();
        sync.sync();
        let second = drain(&rx);

        let id_of = |commands: &[Command]| {
            commands.iter().find_map(|c| match c {
                Command::LoadInstance { id, .. } => Some(id.clone()),
                _ => None,
            })
        };
        assert_eq!(id_of(&first).unwrap(), id_of(&second).unwrap());
    }

    #[test]
    fn deleted_graphs_unload_their_instance() {
        let (store, mut sync, rx) = harness();
        let created = store
            .lock()
            .unwrap()
            .create_graph(clamp_graph(true))
            .unwrap();
        sync.sync();
        drain(&rx);

        store
            .lock()
            .unwrap()
            .delete_graph(created.id.as_str())
            .unwrap();
        let messages = sync.sync();
        let commands = drain(&rx);
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::UnloadInstance { .. })));
        // only the show/changed broadcast remains
        assert_eq!(messages.len(), 1);
    }
}
