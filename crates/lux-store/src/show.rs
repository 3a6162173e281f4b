// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The show façade: all five entity tables plus cross-entity invariants.
//!
//! CRUD callers (the out-of-scope HTTP layer, tests, seed tooling) go
//! through this type, never through raw repositories, so every mutation is
//! validated and every successful mutation bumps the change counter the
//! server polls for recompilation and `show/changed` broadcasts.

use crate::repository::Repository;
use crate::table::TableStore;
use crate::StoreError;
use lux_core::{
    Fixture, FixtureModel, Graph, Group, InputDef, NodeType, Patch,
};
use std::sync::Arc;

/// Entity counts for status summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShowCounts {
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
}

/// All persisted show state behind one validated surface.
pub struct ShowStore {
    fixtures: Repository<Fixture>,
    models: Repository<FixtureModel>,
    groups: Repository<Group>,
    inputs: Repository<InputDef>,
    graphs: Repository<Graph>,
    changes: u64,
}

impl ShowStore {
    /// Opens every table from the given store.
    pub fn open(store: Arc<dyn TableStore>) -> Result<Self, StoreError> {
        Ok(Self {
            fixtures: Repository::open(Arc::clone(&store))?,
            models: Repository::open(Arc::clone(&store))?,
            groups: Repository::open(Arc::clone(&store))?,
            inputs: Repository::open(Arc::clone(&store))?,
            graphs: Repository::open(store)?,
            changes: 0,
        })
    }

    /// Monotonic counter bumped on every successful mutation.
    #[must_use]
    pub fn change_counter(&self) -> u64 {
        self.changes
    }

    /// Entity counts for `show/changed` summaries.
    #[must_use]
    pub fn counts(&self) -> ShowCounts {
        ShowCounts {
            fixtures: self.fixtures.len(),
            models: self.models.len(),
            groups: self.groups.len(),
            inputs: self.inputs.len(),
            graphs: self.graphs.len(),
        }
    }

    /// Read access to fixtures.
    pub fn fixtures(&self) -> &Repository<Fixture> {
        &self.fixtures
    }

    /// Read access to models.
    pub fn models(&self) -> &Repository<FixtureModel> {
        &self.models
    }

    /// Read access to groups.
    pub fn groups(&self) -> &Repository<Group> {
        &self.groups
    }

    /// Read access to inputs.
    pub fn inputs(&self) -> &Repository<InputDef> {
        &self.inputs
    }

    /// Read access to graphs.
    pub fn graphs(&self) -> &Repository<Graph> {
        &self.graphs
    }

    /// Builds the immutable rig snapshot the engine and bridge consume.
    #[must_use]
    pub fn build_patch(&self) -> Patch {
        let mut patch = Patch::default();
        for fixture in self.fixtures.list() {
            patch.fixtures.insert(fixture.id.clone(), fixture);
        }
        for model in self.models.list() {
            patch.models.insert(model.id.clone(), model);
        }
        for group in self.groups.list() {
            patch.groups.insert(group.id.clone(), group.fixture_ids);
        }
        patch
    }

    fn bump(&mut self) {
        self.changes += 1;
    }

    // ─── FIXTURES ──────────────────────────────────────────────────────

    fn validate_fixture(&self, fixture: &Fixture) -> Result<(), StoreError> {
        let model = self
            .models
            .get(fixture.model_id.as_str())
            .ok_or_else(|| {
                StoreError::Validation(format!("unknown model `{}`", fixture.model_id))
            })?;
        if fixture.start_channel == 0 || fixture.start_channel > 512 {
            return Err(StoreError::Validation(format!(
                "start_channel {} outside 1..=512",
                fixture.start_channel
            )));
        }
        let last = u32::from(fixture.start_channel) + u32::from(model.channel_count()) - 1;
        if last > 512 {
            return Err(StoreError::Validation(format!(
                "fixture footprint ends at channel {last}, past the universe"
            )));
        }
        Ok(())
    }

    /// Creates a fixture after validating its DMX footprint.
    pub fn create_fixture(&mut self, fixture: Fixture) -> Result<Fixture, StoreError> {
        self.validate_fixture(&fixture)?;
        let created = self.fixtures.create(fixture)?;
        self.bump();
        Ok(created)
    }

    /// Updates a fixture after validating its DMX footprint.
    pub fn update_fixture(
        &mut self,
        id: &str,
        fixture: Fixture,
        expected_revision: u64,
    ) -> Result<Fixture, StoreError> {
        self.validate_fixture(&fixture)?;
        let updated = self.fixtures.update(id, fixture, expected_revision)?;
        self.bump();
        Ok(updated)
    }

    /// Deletes a fixture; membership in any group cascades away.
    pub fn delete_fixture(&mut self, id: &str) -> Result<bool, StoreError> {
        let existed = self.fixtures.delete(id)?;
        if !existed {
            return Ok(false);
        }
        for group in self.groups.list() {
            if group.fixture_ids.iter().any(|f| f.as_str() == id) {
                let revision = group.revision;
                let mut trimmed = group;
                trimmed.fixture_ids.retain(|f| f.as_str() != id);
                let group_id = trimmed.id.clone();
                self.groups.update(group_id.as_str(), trimmed, revision)?;
            }
        }
        self.bump();
        Ok(true)
    }

    // ─── MODELS ────────────────────────────────────────────────────────

    fn validate_model(model: &FixtureModel) -> Result<(), StoreError> {
        for (role, offset) in &model.channels {
            if *offset == 0 || *offset > 512 {
                return Err(StoreError::Validation(format!(
                    "channel offset {offset} for {role:?} outside 1..=512"
                )));
            }
        }
        Ok(())
    }

    /// Creates a fixture model.
    pub fn create_model(&mut self, model: FixtureModel) -> Result<FixtureModel, StoreError> {
        Self::validate_model(&model)?;
        let created = self.models.create(model)?;
        self.bump();
        Ok(created)
    }

    /// Updates a fixture model.
    pub fn update_model(
        &mut self,
        id: &str,
        model: FixtureModel,
        expected_revision: u64,
    ) -> Result<FixtureModel, StoreError> {
        Self::validate_model(&model)?;
        let updated = self.models.update(id, model, expected_revision)?;
        self.bump();
        Ok(updated)
    }

    /// Deletes a model. Fixtures still referencing it keep running; the
    /// bridge drops their writes and attributes the fault at runtime.
    pub fn delete_model(&mut self, id: &str) -> Result<bool, StoreError> {
        let existed = self.models.delete(id)?;
        if existed {
            self.bump();
        }
        Ok(existed)
    }

    // ─── GROUPS ────────────────────────────────────────────────────────

    fn validate_group(&self, group: &Group) -> Result<(), StoreError> {
        for fixture_id in &group.fixture_ids {
            if self.fixtures.get(fixture_id.as_str()).is_none() {
                return Err(StoreError::Validation(format!(
                    "group references unknown fixture `{fixture_id}`"
                )));
            }
        }
        Ok(())
    }

    /// Creates a group; every member must exist.
    pub fn create_group(&mut self, group: Group) -> Result<Group, StoreError> {
        self.validate_group(&group)?;
        let created = self.groups.create(group)?;
        self.bump();
        Ok(created)
    }

    /// Updates a group; every member must exist.
    pub fn update_group(
        &mut self,
        id: &str,
        group: Group,
        expected_revision: u64,
    ) -> Result<Group, StoreError> {
        self.validate_group(&group)?;
        let updated = self.groups.update(id, group, expected_revision)?;
        self.bump();
        Ok(updated)
    }

    /// Deletes a group.
    pub fn delete_group(&mut self, id: &str) -> Result<bool, StoreError> {
        let existed = self.groups.delete(id)?;
        if existed {
            self.bump();
        }
        Ok(existed)
    }

    // ─── INPUTS ────────────────────────────────────────────────────────

    /// Creates an operator input.
    pub fn create_input(&mut self, input: InputDef) -> Result<InputDef, StoreError> {
        let created = self.inputs.create(input)?;
        self.bump();
        Ok(created)
    }

    /// Updates an operator input.
    pub fn update_input(
        &mut self,
        id: &str,
        input: InputDef,
        expected_revision: u64,
    ) -> Result<InputDef, StoreError> {
        let updated = self.inputs.update(id, input, expected_revision)?;
        self.bump();
        Ok(updated)
    }

    /// Deletes an operator input.
    pub fn delete_input(&mut self, id: &str) -> Result<bool, StoreError> {
        let existed = self.inputs.delete(id)?;
        if existed {
            self.bump();
        }
        Ok(existed)
    }

    // ─── GRAPHS ────────────────────────────────────────────────────────

    fn validate_graph(graph: &Graph) -> Result<(), StoreError> {
        let mut types = std::collections::BTreeMap::new();
        for node in &graph.nodes {
            let ty = NodeType::parse(&node.node_type).ok_or_else(|| {
                StoreError::Validation(format!("unknown node type `{}`", node.node_type))
            })?;
            if types.insert(&node.id, ty).is_some() {
                return Err(StoreError::Validation(format!(
                    "duplicate node id `{}`",
                    node.id
                )));
            }
        }
        let mut edge_ids = std::collections::BTreeSet::new();
        for edge in &graph.edges {
            if !edge_ids.insert(&edge.id) {
                return Err(StoreError::Validation(format!(
                    "duplicate edge id `{}`",
                    edge.id
                )));
            }
            let from_ty = types.get(&edge.from.node).ok_or_else(|| {
                StoreError::Validation(format!(
                    "edge `{}` starts at unknown node `{}`",
                    edge.id, edge.from.node
                ))
            })?;
            let to_ty = types.get(&edge.to.node).ok_or_else(|| {
                StoreError::Validation(format!(
                    "edge `{}` ends at unknown node `{}`",
                    edge.id, edge.to.node
                ))
            })?;
            if from_ty.spec().output(&edge.from.port).is_none() {
                return Err(StoreError::Validation(format!(
                    "edge `{}` names unknown output port `{}`",
                    edge.id, edge.from.port
                )));
            }
            if to_ty.spec().input(&edge.to.port).is_none() {
                return Err(StoreError::Validation(format!(
                    "edge `{}` names unknown input port `{}`",
                    edge.id, edge.to.port
                )));
            }
        }
        Ok(())
    }

    /// Creates a graph after structural validation.
    pub fn create_graph(&mut self, graph: Graph) -> Result<Graph, StoreError> {
        Self::validate_graph(&graph)?;
        let created = self.graphs.create(graph)?;
        self.bump();
        Ok(created)
    }

    /// Updates a graph after structural validation.
    pub fn update_graph(
        &mut self,
        id: &str,
        graph: Graph,
        expected_revision: u64,
    ) -> Result<Graph, StoreError> {
        Self::validate_graph(&graph)?;
        let updated = self.graphs.update(id, graph, expected_revision)?;
        self.bump();
        Ok(updated)
    }

    /// Deletes a graph; the server unloads its instance on the next sync.
    pub fn delete_graph(&mut self, id: &str) -> Result<bool, StoreError> {
        let existed = self.graphs.delete(id)?;
        if existed {
            self.bump();
        }
        Ok(existed)
    }
}
