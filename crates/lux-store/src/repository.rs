// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Generic versioned repository over a [`TableStore`].
//!
//! One repository per entity kind. The whole table is held in memory (shows
//! are small) and persisted as a JSON map keyed by id after every mutation.

use crate::table::TableStore;
use crate::StoreError;
use lux_core::{Fixture, FixtureId, FixtureModel, Graph, GraphId, Group, GroupId, InputDef,
    InputId, ModelId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Binding between a persisted type and its repository metadata.
pub trait Entity: Clone + Serialize + DeserializeOwned {
    /// Table name (`fixtures`, `graphs`, …).
    const KIND: &'static str;
    /// Prefix for generated ids (`fx`, `g`, …).
    const ID_PREFIX: &'static str;

    /// Current id.
    fn id(&self) -> &str;
    /// Replaces the id (repository-assigned on create).
    fn set_id(&mut self, id: String);
    /// Current revision.
    fn revision(&self) -> u64;
    /// Replaces the revision (repository-managed).
    fn set_revision(&mut self, revision: u64);
}

macro_rules! entity {
    ($ty:ty, $id_ty:ty, $kind:literal, $prefix:literal) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;
            const ID_PREFIX: &'static str = $prefix;

            fn id(&self) -> &str {
                self.id.as_str()
            }

            fn set_id(&mut self, id: String) {
                self.id = <$id_ty>::new(id);
            }

            fn revision(&self) -> u64 {
                self.revision
            }

            fn set_revision(&mut self, revision: u64) {
                self.revision = revision;
            }
        }
    };
}

entity!(Fixture, FixtureId, "fixtures", "fx");
entity!(FixtureModel, ModelId, "models", "m");
entity!(Group, GroupId, "groups", "grp");
entity!(InputDef, InputId, "inputs", "in");
entity!(Graph, GraphId, "graphs", "g");

/// Versioned table of one entity kind.
pub struct Repository<T: Entity> {
    store: Arc<dyn TableStore>,
    table: BTreeMap<String, T>,
}

impl<T: Entity> Repository<T> {
    /// Loads the table from the store; a missing table is an empty one.
    pub fn open(store: Arc<dyn TableStore>) -> Result<Self, StoreError> {
        let table = match store.load_raw(T::KIND) {
            Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
            Ok(_) | Err(StoreError::NotFound(_)) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        Ok(Self { store, table })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(&self.table)?;
        self.store.save_raw(T::KIND, &data)
    }

    /// All entities, ordered by id.
    pub fn list(&self) -> Vec<T> {
        self.table.values().cloned().collect()
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Looks up one entity.
    pub fn get(&self, id: &str) -> Option<&T> {
        self.table.get(id)
    }

    /// Inserts a new entity. The caller's id and revision are ignored: the
    /// repository assigns `<prefix>-<n>` and revision 1.
    pub fn create(&mut self, mut entity: T) -> Result<T, StoreError> {
        entity.set_id(self.next_id());
        entity.set_revision(1);
        self.table.insert(entity.id().to_owned(), entity.clone());
        self.persist()?;
        Ok(entity)
    }

    /// Replaces an entity, enforcing optimistic concurrency.
    pub fn update(&mut self, id: &str, mut entity: T, expected_revision: u64) -> Result<T, StoreError> {
        let current = self
            .table
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        let actual = current.revision();
        if actual != expected_revision {
            return Err(StoreError::Conflict {
                expected: expected_revision,
                actual,
            });
        }
        entity.set_id(id.to_owned());
        entity.set_revision(actual + 1);
        self.table.insert(id.to_owned(), entity.clone());
        self.persist()?;
        Ok(entity)
    }

    /// Removes an entity. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let existed = self.table.remove(id).is_some();
        if existed {
            self.persist()?;
        }
        Ok(existed)
    }

    fn next_id(&self) -> String {
        let prefix = format!("{}-", T::ID_PREFIX);
        let max = self
            .table
            .keys()
            .filter_map(|id| id.strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("{}-{}", T::ID_PREFIX, max + 1)
    }
}
