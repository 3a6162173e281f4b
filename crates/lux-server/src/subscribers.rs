// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subscriber table and frame diffing.
//!
//! Each subscriber owns a `last_fixtures` snapshot of what it was last sent.
//! Full mode resends the whole filtered map every frame; delta mode sends
//! only entries that are new or changed, plus explicit `null` removals, and
//! stays silent when nothing changed. Folding every delta over an empty map
//! reconstructs the full frame — the gateway's core correctness property.

use lux_core::{AttributeBundle, FixtureId, Frame};
use lux_proto::{ServerMessage, SubscriptionMode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::mpsc;
use tracing::debug;

/// One client's frame subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    mode: SubscriptionMode,
    filter: Option<BTreeSet<FixtureId>>,
    last_fixtures: BTreeMap<FixtureId, AttributeBundle>,
}

impl Subscription {
    /// Creates a subscription; `filter` limits which fixtures are visible.
    #[must_use]
    pub fn new(mode: SubscriptionMode, filter: Option<Vec<FixtureId>>) -> Self {
        Self {
            mode,
            filter: filter.map(|ids| ids.into_iter().collect()),
            last_fixtures: BTreeMap::new(),
        }
    }

    fn filtered(&self, frame: &Frame) -> BTreeMap<FixtureId, AttributeBundle> {
        frame
            .fixtures
            .iter()
            .filter(|(id, _)| {
                self.filter
                    .as_ref()
                    .is_none_or(|filter| filter.contains(*id))
            })
            .map(|(id, bundle)| (id.clone(), *bundle))
            .collect()
    }

    /// Encodes `frame` for this subscriber, updating `last_fixtures`.
    /// Returns `None` when nothing needs to be sent (unchanged delta).
    pub fn encode(&mut self, frame: &Frame) -> Option<ServerMessage> {
        let current = self.filtered(frame);
        match self.mode {
            SubscriptionMode::Full => {
                self.last_fixtures = current.clone();
                Some(ServerMessage::FrameFull {
                    frame_number: frame.frame_number,
                    fixtures: current,
                })
            }
            SubscriptionMode::Delta => {
                let mut changes: BTreeMap<FixtureId, Option<AttributeBundle>> = BTreeMap::new();
                for (id, bundle) in &current {
                    if self.last_fixtures.get(id) != Some(bundle) {
                        changes.insert(id.clone(), Some(*bundle));
                    }
                }
                for id in self.last_fixtures.keys() {
                    if !current.contains_key(id) {
                        changes.insert(id.clone(), None);
                    }
                }
                self.last_fixtures = current;
                if changes.is_empty() {
                    None
                } else {
                    Some(ServerMessage::FrameDelta {
                        frame_number: frame.frame_number,
                        changes,
                    })
                }
            }
        }
    }
}

struct Connection {
    outbox: mpsc::Sender<ServerMessage>,
    subscription: Option<Subscription>,
}

/// All connected clients and their subscriptions.
///
/// Owned by the gateway task; the engine never sees it.
#[derive(Default)]
pub struct SubscriberTable {
    next_id: u64,
    connections: HashMap<u64, Connection>,
    dropped_messages: u64,
}

impl SubscriberTable {
    /// Registers a connection and returns its id.
    pub fn add(&mut self, outbox: mpsc::Sender<ServerMessage>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(
            id,
            Connection {
                outbox,
                subscription: None,
            },
        );
        id
    }

    /// Removes a connection.
    pub fn remove(&mut self, id: u64) {
        self.connections.remove(&id);
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// True when no clients are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Messages dropped on full outboxes since startup.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages
    }

    /// Installs (or replaces) a connection's frame subscription.
    pub fn subscribe(&mut self, id: u64, subscription: Subscription) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.subscription = Some(subscription);
        }
    }

    /// Clears a connection's frame subscription.
    pub fn unsubscribe(&mut self, id: u64) {
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.subscription = None;
        }
    }

    /// Sends one message to every live connection; dead sockets are reaped.
    pub fn broadcast(&mut self, message: &ServerMessage) {
        let mut dead = Vec::new();
        for (&id, conn) in &self.connections {
            match conn.outbox.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped_messages += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id),
            }
        }
        for id in dead {
            debug!(conn_id = id, "reaping dead subscriber");
            self.connections.remove(&id);
        }
    }

    /// Diffs and dispatches one frame to every subscribed connection.
    pub fn fanout(&mut self, frame: &Frame) {
        let mut dead = Vec::new();
        for (&id, conn) in &mut self.connections {
            let Some(subscription) = conn.subscription.as_mut() else {
                continue;
            };
            let Some(message) = subscription.encode(frame) else {
                continue;
            };
            match conn.outbox.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Best-effort stream: the subscriber's next delta re-syncs.
                    self.dropped_messages += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(id),
            }
        }
        for id in dead {
            debug!(conn_id = id, "reaping dead subscriber");
            self.connections.remove(&id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lux_core::Color;

    fn frame(number: u64, fixtures: &[(&str, f64)]) -> Frame {
        Frame {
            frame_number: number,
            time: number as f64 / 60.0,
            tick_hz: 60.0,
            fixtures: fixtures
                .iter()
                .map(|(id, intensity)| {
                    (
                        FixtureId::new(*id),
                        AttributeBundle {
                            intensity: Some(*intensity),
                            ..AttributeBundle::default()
                        },
                    )
                })
                .collect(),
            instances: vec![],
            sources: BTreeMap::new(),
        }
    }

    #[test]
    fn full_mode_always_sends_the_filtered_map() {
        let mut sub = Subscription::new(SubscriptionMode::Full, None);
        let msg = sub.encode(&frame(1, &[("fx-1", 0.3)])).unwrap();
        let ServerMessage::FrameFull {
            frame_number,
            fixtures,
        } = msg
        else {
            unreachable!()
        };
        assert_eq!(frame_number, 1);
        assert_eq!(fixtures.len(), 1);
        // identical frame still sends in full mode
        assert!(sub.encode(&frame(2, &[("fx-1", 0.3)])).is_some());
    }

    #[test]
    fn delta_mode_sends_only_the_changed_fixture() {
        // tick 1: {F1: 0.3, F2: 0.6}; tick 2: {F1: 0.3, F2: 0.7}
        let mut sub = Subscription::new(SubscriptionMode::Delta, None);
        let first = sub
            .encode(&frame(1, &[("fx-1", 0.3), ("fx-2", 0.6)]))
            .unwrap();
        let ServerMessage::FrameDelta { changes, .. } = first else {
            unreachable!()
        };
        assert_eq!(changes.len(), 2);

        let second = sub
            .encode(&frame(2, &[("fx-1", 0.3), ("fx-2", 0.7)]))
            .unwrap();
        let ServerMessage::FrameDelta { changes, .. } = second else {
            unreachable!()
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(
            changes[&FixtureId::new("fx-2")].unwrap().intensity,
            Some(0.7)
        );
    }

    #[test]
    fn unchanged_delta_is_silent() {
        let mut sub = Subscription::new(SubscriptionMode::Delta, None);
        sub.encode(&frame(1, &[("fx-1", 0.5)])).unwrap();
        assert!(sub.encode(&frame(2, &[("fx-1", 0.5)])).is_none());
    }

    #[test]
    fn departed_fixtures_are_signaled_as_null() {
        let mut sub = Subscription::new(SubscriptionMode::Delta, None);
        sub.encode(&frame(1, &[("fx-1", 0.5), ("fx-2", 0.5)])).unwrap();
        let msg = sub.encode(&frame(2, &[("fx-1", 0.5)])).unwrap();
        let ServerMessage::FrameDelta { changes, .. } = msg else {
            unreachable!()
        };
        assert_eq!(changes.len(), 1);
        assert!(changes[&FixtureId::new("fx-2")].is_none());
    }

    #[test]
    fn filters_hide_other_fixtures() {
        let mut sub = Subscription::new(
            SubscriptionMode::Delta,
            Some(vec![FixtureId::new("fx-2")]),
        );
        let msg = sub
            .encode(&frame(1, &[("fx-1", 0.1), ("fx-2", 0.2)]))
            .unwrap();
        let ServerMessage::FrameDelta { changes, .. } = msg else {
            unreachable!()
        };
        assert_eq!(changes.len(), 1);
        assert!(changes.contains_key(&FixtureId::new("fx-2")));
    }

    #[test]
    fn folding_deltas_reconstructs_the_full_frame() {
        let frames = [
            frame(1, &[("fx-1", 0.1), ("fx-2", 0.2)]),
            frame(2, &[("fx-1", 0.1), ("fx-2", 0.3)]),
            frame(3, &[("fx-2", 0.3), ("fx-3", 0.9)]),
            frame(4, &[("fx-3", 0.95)]),
        ];
        let mut delta_sub = Subscription::new(SubscriptionMode::Delta, None);
        let mut folded: BTreeMap<FixtureId, AttributeBundle> = BTreeMap::new();
        for f in &frames {
            if let Some(ServerMessage::FrameDelta { changes, .. }) = delta_sub.encode(f) {
                for (id, change) in changes {
                    match change {
                        Some(bundle) => {
                            folded.insert(id, bundle);
                        }
                        None => {
                            folded.remove(&id);
                        }
                    }
                }
            }
        }
        assert_eq!(folded, frames[3].fixtures);
    }

    #[test]
    fn bundles_compare_by_value_across_attributes() {
        let mut sub = Subscription::new(SubscriptionMode::Delta, None);
        let mut f1 = frame(1, &[]);
        f1.fixtures.insert(
            FixtureId::new("fx-1"),
            AttributeBundle {
                color: Some(Color::new(1.0, 0.0, 0.0)),
                ..AttributeBundle::default()
            },
        );
        sub.encode(&f1).unwrap();

        let mut f2 = frame(2, &[]);
        f2.fixtures.insert(
            FixtureId::new("fx-1"),
            AttributeBundle {
                color: Some(Color::new(1.0, 0.0, 0.1)),
                ..AttributeBundle::default()
            },
        );
        assert!(sub.encode(&f2).is_some());
    }

    #[tokio::test]
    async fn broadcast_reaps_closed_connections() {
        let mut table = SubscriberTable::default();
        let (tx_live, mut rx_live) = mpsc::channel(8);
        let (tx_dead, rx_dead) = mpsc::channel(8);
        table.add(tx_live);
        table.add(tx_dead);
        drop(rx_dead);

        table.broadcast(&ServerMessage::ShowChanged {
            show: lux_proto::ShowSummary::default(),
        });
        assert_eq!(table.len(), 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn fanout_skips_unsubscribed_connections() {
        let mut table = SubscriberTable::default();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        let a = table.add(tx_a);
        let _b = table.add(tx_b);
        table.subscribe(a, Subscription::new(SubscriptionMode::Full, None));

        table.fanout(&frame(1, &[("fx-1", 0.5)]));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
