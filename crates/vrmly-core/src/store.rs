// ── Published feed ──
//
// Single-writer state shared with every subscriber through a `watch`
// channel. Each publication swaps in a whole new `Arc<Feed>`, so readers
// never see a half-updated snapshot.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::catalog::ValueKind;
use crate::model::{
    Availability, SensorDefinition, SensorKind, SensorSet, SensorUpdate, SensorValue, Snapshot,
};

/// Whether the last published snapshot may be presented as current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FeedStatus {
    /// Nothing published yet.
    Pending,
    Live,
    /// Too many consecutive failed cycles.
    Stale { consecutive_failures: u32 },
    /// Polling is suspended until a new token arrives.
    AuthBlocked,
}

/// What subscribers see: the latest snapshot plus whether to trust it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed {
    snapshot: Option<Arc<Snapshot>>,
    status: FeedStatus,
}

impl Feed {
    fn pending() -> Self {
        Self {
            snapshot: None,
            status: FeedStatus::Pending,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> FeedStatus {
        self.status
    }

    pub fn is_live(&self) -> bool {
        self.status == FeedStatus::Live
    }

    /// One update per enabled sensor, in sensor-table order.
    ///
    /// Values are only reported available while the feed is live and the
    /// sensor has a non-null value in the current snapshot.
    pub fn sensor_updates(&self, sensors: &SensorSet, installation_id: u64) -> Vec<SensorUpdate> {
        sensors
            .iter()
            .map(|def| self.sensor_update(sensors, def, installation_id))
            .collect()
    }

    fn sensor_update(
        &self,
        sensors: &SensorSet,
        def: &SensorDefinition,
        installation_id: u64,
    ) -> SensorUpdate {
        let (raw_value, value) = match (self.snapshot.as_deref(), def.kind) {
            (Some(snap), SensorKind::Raw(id)) => {
                let raw = snap.raw_value(id);
                let kind = sensors.catalog().lookup(id).map(|info| info.kind);
                let value = raw.map(|v| match kind {
                    Some(kind @ ValueKind::Enumerated(_)) => {
                        kind.label(v).map_or(SensorValue::Number(v), SensorValue::State)
                    }
                    _ => SensorValue::Number(v),
                });
                (raw, value)
            }
            (Some(snap), SensorKind::Derived(_)) => {
                let v = snap.derived(def.key).and_then(|d| d.value);
                (None, v.map(SensorValue::Number))
            }
            (None, _) => (None, None),
        };

        let availability = if self.is_live() && value.is_some() {
            Availability::Available
        } else {
            Availability::Unavailable
        };

        SensorUpdate {
            entity_id: entity_id(installation_id, def.key),
            key: def.key,
            name: def.name,
            value,
            unit: def.unit,
            availability,
            attribute_id: def.attribute_id(),
            raw_value: raw_value.filter(|_| matches!(value, Some(SensorValue::State(_)))),
        }
    }
}

/// Stable identity of a sensor; unaffected by token replacement.
pub fn entity_id(installation_id: u64, key: &str) -> String {
    format!("{installation_id}-{key}")
}

/// The writer half. Owned by the coordinator.
pub(crate) struct FeedStore {
    feed: watch::Sender<Arc<Feed>>,
}

impl FeedStore {
    pub(crate) fn new() -> Self {
        let (feed, _) = watch::channel(Arc::new(Feed::pending()));
        Self { feed }
    }

    pub(crate) fn current(&self) -> Arc<Feed> {
        self.feed.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Feed>> {
        self.feed.subscribe()
    }

    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        self.feed.send_replace(Arc::new(Feed {
            snapshot: Some(snapshot),
            status: FeedStatus::Live,
        }));
    }

    /// Keep the last snapshot but flag it; no-op if already in `status`.
    pub(crate) fn degrade(&self, status: FeedStatus) {
        self.feed.send_if_modified(|feed| {
            if feed.status == status {
                return false;
            }
            *feed = Arc::new(Feed {
                snapshot: feed.snapshot.clone(),
                status,
            });
            true
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::AttributeId;
    use crate::derive::DerivationEngine;
    use crate::model::{RawReading, Unit};

    fn snapshot(values: &[(u32, Option<f64>)], sensors: &SensorSet) -> Arc<Snapshot> {
        let now = Utc::now();
        let raw: Vec<RawReading> = values
            .iter()
            .map(|&(id, value)| RawReading {
                attribute_id: AttributeId(id),
                value,
                unit: None,
                fetched_at: now,
            })
            .collect();
        let derived = DerivationEngine::derive(&raw, sensors.definitions());
        Arc::new(Snapshot::new(1, now, raw, derived))
    }

    fn update<'a>(updates: &'a [SensorUpdate], key: &str) -> &'a SensorUpdate {
        updates.iter().find(|u| u.key == key).unwrap()
    }

    #[test]
    fn pending_feed_is_unavailable() {
        let sensors = SensorSet::defaults().unwrap();
        let store = FeedStore::new();
        let updates = store.current().sensor_updates(&sensors, 42);
        assert_eq!(updates.len(), sensors.len());
        assert!(
            updates
                .iter()
                .all(|u| u.availability == Availability::Unavailable)
        );
    }

    #[test]
    fn live_feed_reports_values_and_labels() {
        let sensors = SensorSet::defaults().unwrap();
        let store = FeedStore::new();
        store.publish(snapshot(
            &[(81, Some(24.0)), (82, Some(5.0)), (85, Some(5.0)), (241, None)],
            &sensors,
        ));

        let updates = store.current().sensor_updates(&sensors, 42);

        let power = update(&updates, "battery_power");
        assert_eq!(power.entity_id, "42-battery_power");
        assert_eq!(power.value, Some(SensorValue::Number(120.0)));
        assert_eq!(power.unit, Some(Unit::Watt));
        assert_eq!(power.availability, Availability::Available);

        let state = update(&updates, "battery_state");
        assert_eq!(state.value, Some(SensorValue::State("Float")));
        assert_eq!(state.raw_value, Some(5.0));

        let load = update(&updates, "load_state");
        assert_eq!(load.value, None);
        assert_eq!(load.availability, Availability::Unavailable);
    }

    #[test]
    fn stale_feed_hides_values() {
        let sensors = SensorSet::defaults().unwrap();
        let store = FeedStore::new();
        store.publish(snapshot(&[(81, Some(24.0))], &sensors));
        store.degrade(FeedStatus::Stale {
            consecutive_failures: 3,
        });

        let feed = store.current();
        assert!(feed.snapshot().is_some());
        assert!(
            feed.sensor_updates(&sensors, 1)
                .iter()
                .all(|u| u.availability == Availability::Unavailable)
        );
    }

    #[test]
    fn degrade_to_same_status_does_not_notify() {
        let store = FeedStore::new();
        let mut rx = store.subscribe();
        store.degrade(FeedStatus::AuthBlocked);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        store.degrade(FeedStatus::AuthBlocked);
        assert!(!rx.has_changed().unwrap());
    }
}
