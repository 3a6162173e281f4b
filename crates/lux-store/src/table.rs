// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Storage port for raw entity tables (one JSON blob per kind).

use crate::StoreError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Raw blob storage keyed by entity kind (`fixtures`, `graphs`, …).
pub trait TableStore: Send + Sync {
    /// Loads a table blob. Returns [`StoreError::NotFound`] when the kind
    /// has never been written.
    fn load_raw(&self, kind: &str) -> Result<Vec<u8>, StoreError>;
    /// Persists a table blob.
    fn save_raw(&self, kind: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// Filesystem-backed table store rooted at `DATA_DIR`.
///
/// Writes go through a sibling temp file and a rename so a crash mid-write
/// never leaves a torn table on disk.
pub struct FsTableStore {
    base: PathBuf,
}

impl FsTableStore {
    /// Opens (and creates, if needed) the data directory.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, kind: &str) -> PathBuf {
        self.base.join(format!("{kind}.json"))
    }
}

impl TableStore for FsTableStore {
    fn load_raw(&self, kind: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path_for(kind)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(kind.to_owned()))
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    fn save_raw(&self, kind: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(kind);
        let tmp = self.base.join(format!("{kind}.json.tmp"));
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory table store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemTableStore {
    tables: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemTableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemTableStore {
    fn load_raw(&self, kind: &str) -> Result<Vec<u8>, StoreError> {
        let tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Validation("table store poisoned".into()))?;
        tables
            .get(kind)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(kind.to_owned()))
    }

    fn save_raw(&self, kind: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Validation("table store poisoned".into()))?;
        tables.insert(kind.to_owned(), data.to_vec());
        Ok(())
    }
}
