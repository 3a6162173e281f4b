// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! lux-store: versioned entity repositories for Lux shows.
//!
//! Every persisted entity carries a `revision` used for optimistic
//! concurrency: `update` requires the caller's expected revision and fails
//! with [`StoreError::Conflict`] on mismatch. Storage is pluggable through
//! the [`TableStore`] port — one JSON blob per entity kind — with a
//! filesystem adapter for `DATA_DIR` and an in-memory adapter for tests.
//!
//! Cross-entity invariants (model footprints, group membership, graph
//! structure) live in [`ShowStore`], the façade the server talks to.
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

mod repository;
mod show;
mod table;

pub use repository::{Entity, Repository};
pub use show::{ShowCounts, ShowStore};
pub use table::{FsTableStore, MemTableStore, TableStore};

use thiserror::Error;

/// Repository error kinds, mirrored onto the CRUD boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entity with the requested id.
    #[error("not found: {0}")]
    NotFound(String),
    /// `expected_revision` did not match the stored revision.
    #[error("revision conflict: expected {expected}, actual {actual}")]
    Conflict {
        /// Revision the caller presented.
        expected: u64,
        /// Revision currently stored.
        actual: u64,
    },
    /// The entity violates an invariant.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Underlying storage I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Entity (de)serialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
