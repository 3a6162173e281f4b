// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier newtypes for persisted and runtime entities.
//!
//! Every id is an opaque string assigned by the repository layer (or, for
//! graph-local node/edge ids, by the authoring client). Dedicated wrappers
//! prevent accidental mixing of id kinds; the wire representation is the bare
//! string (`#[serde(transparent)]`).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw id string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the raw id string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a patched fixture.
    FixtureId
);
string_id!(
    /// Identifier of a fixture model descriptor.
    ModelId
);
string_id!(
    /// Identifier of a fixture group.
    GroupId
);
string_id!(
    /// Identifier of an operator input (fader or button).
    InputId
);
string_id!(
    /// Identifier of a persisted effect graph.
    GraphId
);
string_id!(
    /// Identifier of a node within one graph.
    ///
    /// Node ids are unique per graph, not globally; the engine never compares
    /// node ids across graph boundaries.
    NodeId
);
string_id!(
    /// Identifier of an edge within one graph.
    EdgeId
);
string_id!(
    /// Identifier of a loaded instance.
    ///
    /// Instances live in a separate namespace from graphs: the instance id is
    /// stable across recompiles of the same graph.
    InstanceId
);
