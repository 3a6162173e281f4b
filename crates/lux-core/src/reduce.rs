// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic write reduction.
//!
//! Multiple instances may write the same fixture on one tick. Reduction
//! folds all [`WriteRecord`]s into one final bundle per fixture:
//!
//! - records are ordered ascending by `(priority, instance_rank, node_rank)`,
//! - each record overlays the attributes it defines on the accumulator,
//!
//! so a present attribute from the highest-ranked record wins while absent
//! attributes fall through to lower-priority writes. Ranks are assigned at
//! registration (instances) and declaration (nodes); nothing here depends on
//! hash iteration order, so the result is permutation-invariant over input
//! order of records with distinct keys — and deterministic even for ties.

use crate::ident::{FixtureId, InstanceId, NodeId};
use crate::port::{AttributeBundle, Selection};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One sink emission, tagged with its deterministic rank.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Owning instance.
    pub instance_id: InstanceId,
    /// Monotonic rank assigned when the instance was registered.
    pub instance_rank: u64,
    /// The sink node that produced the write.
    pub node: NodeId,
    /// The sink node's declaration index within its graph.
    pub node_rank: u32,
    /// Target fixtures.
    pub selection: Selection,
    /// Attributes to apply.
    pub bundle: AttributeBundle,
    /// Reduction priority; higher wins.
    pub priority: f64,
}

/// Result of reducing one tick's writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reduction {
    /// Final attribute bundle per fixture.
    pub fixtures: BTreeMap<FixtureId, AttributeBundle>,
    /// Instance whose record ranked highest for each fixture; used to
    /// attribute downstream bridge faults (e.g. missing model) to an owner.
    pub sources: BTreeMap<FixtureId, InstanceId>,
}

fn rank_order(a: &WriteRecord, b: &WriteRecord) -> Ordering {
    a.priority
        .total_cmp(&b.priority)
        .then(a.instance_rank.cmp(&b.instance_rank))
        .then(a.node_rank.cmp(&b.node_rank))
}

/// Folds `records` into per-fixture bundles, lowest rank first.
#[must_use]
pub fn reduce(records: &[WriteRecord]) -> Reduction {
    let mut order: Vec<&WriteRecord> = records.iter().collect();
    order.sort_by(|a, b| rank_order(a, b));

    let mut reduction = Reduction::default();
    for record in order {
        if record.bundle.is_empty() {
            continue;
        }
        for fixture in &record.selection {
            let slot = reduction
                .fixtures
                .entry(fixture.clone())
                .or_default();
            *slot = slot.overlaid(record.bundle);
            reduction
                .sources
                .insert(fixture.clone(), record.instance_id.clone());
        }
    }
    reduction
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::port::Color;

    fn record(
        instance: &str,
        instance_rank: u64,
        node_rank: u32,
        priority: f64,
        fixtures: &[&str],
        bundle: AttributeBundle,
    ) -> WriteRecord {
        WriteRecord {
            instance_id: InstanceId::new(instance),
            instance_rank,
            node: NodeId::new(format!("sink-{node_rank}")),
            node_rank,
            selection: fixtures.iter().map(|f| FixtureId::new(*f)).collect(),
            bundle,
            priority,
        }
    }

    fn intensity(v: f64) -> AttributeBundle {
        AttributeBundle {
            intensity: Some(v),
            ..AttributeBundle::default()
        }
    }

    #[test]
    fn highest_priority_wins_per_attribute() {
        let records = vec![
            record("a", 0, 0, 0.0, &["fx-1"], intensity(0.5)),
            record("b", 1, 0, 10.0, &["fx-1"], intensity(1.0)),
        ];
        let reduction = reduce(&records);
        assert_eq!(
            reduction.fixtures[&FixtureId::new("fx-1")].intensity,
            Some(1.0)
        );
        assert_eq!(
            reduction.sources[&FixtureId::new("fx-1")],
            InstanceId::new("b")
        );
    }

    #[test]
    fn absent_attributes_fall_through_to_lower_priority() {
        let low = AttributeBundle {
            intensity: Some(0.4),
            color: Some(Color::new(0.0, 0.0, 1.0)),
            ..AttributeBundle::default()
        };
        let records = vec![
            record("a", 0, 0, 0.0, &["fx-1"], low),
            record("b", 1, 0, 5.0, &["fx-1"], intensity(0.9)),
        ];
        let merged = reduce(&records);
        let bundle = merged.fixtures[&FixtureId::new("fx-1")];
        assert_eq!(bundle.intensity, Some(0.9));
        // color came from the lower-priority writer
        assert_eq!(bundle.color, Some(Color::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn priority_ties_break_on_instance_then_node_rank() {
        let records = vec![
            record("a", 0, 7, 1.0, &["fx-1"], intensity(0.1)),
            record("b", 1, 0, 1.0, &["fx-1"], intensity(0.2)),
            record("b", 1, 3, 1.0, &["fx-1"], intensity(0.3)),
        ];
        let reduction = reduce(&records);
        assert_eq!(
            reduction.fixtures[&FixtureId::new("fx-1")].intensity,
            Some(0.3)
        );
    }

    #[test]
    fn result_is_invariant_under_record_permutation() {
        let records = vec![
            record("a", 0, 0, 2.0, &["fx-1", "fx-2"], intensity(0.2)),
            record("b", 1, 1, 1.0, &["fx-2"], intensity(0.8)),
            record("c", 2, 2, 3.0, &["fx-1"], intensity(0.6)),
        ];
        let forward = reduce(&records);
        let mut reversed = records;
        reversed.reverse();
        assert_eq!(forward, reduce(&reversed));
    }

    #[test]
    fn empty_selection_and_empty_bundle_produce_nothing() {
        let records = vec![
            record("a", 0, 0, 0.0, &[], intensity(1.0)),
            record("a", 0, 1, 0.0, &["fx-1"], AttributeBundle::default()),
        ];
        let reduction = reduce(&records);
        assert!(reduction.fixtures.is_empty());
    }

    #[test]
    fn negative_priorities_order_below_zero() {
        let records = vec![
            record("a", 0, 0, -5.0, &["fx-1"], intensity(0.9)),
            record("b", 1, 0, 0.0, &["fx-1"], intensity(0.1)),
        ];
        let reduction = reduce(&records);
        assert_eq!(
            reduction.fixtures[&FixtureId::new("fx-1")].intensity,
            Some(0.1)
        );
    }
}
