use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::AttributeId;
use crate::model::Unit;

/// One attribute's value from one poll cycle.
///
/// `value` is `None` when VRM omitted the attribute or sent no datapoint,
/// e.g. while the charger is offline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawReading {
    pub attribute_id: AttributeId,
    pub value: Option<f64>,
    pub unit: Option<Unit>,
    pub fetched_at: DateTime<Utc>,
}

/// A value computed from raw readings of the same cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedReading {
    pub sensor_key: &'static str,
    pub value: Option<f64>,
    pub unit: Option<Unit>,
}

/// Everything one poll cycle produced.
///
/// Published behind an `Arc` and never mutated afterwards; the next cycle
/// builds a new one instead of patching this one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    sequence: u64,
    fetched_at: DateTime<Utc>,
    raw: BTreeMap<AttributeId, RawReading>,
    derived: BTreeMap<&'static str, DerivedReading>,
}

impl Snapshot {
    pub fn new(
        sequence: u64,
        fetched_at: DateTime<Utc>,
        raw: Vec<RawReading>,
        derived: Vec<DerivedReading>,
    ) -> Self {
        Self {
            sequence,
            fetched_at,
            raw: raw.into_iter().map(|r| (r.attribute_id, r)).collect(),
            derived: derived.into_iter().map(|d| (d.sensor_key, d)).collect(),
        }
    }

    /// Monotonic cycle counter, starting at 1 for the first published snapshot.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn raw(&self, id: AttributeId) -> Option<&RawReading> {
        self.raw.get(&id)
    }

    pub fn derived(&self, key: &str) -> Option<&DerivedReading> {
        self.derived.get(key)
    }

    pub fn raw_readings(&self) -> impl Iterator<Item = &RawReading> {
        self.raw.values()
    }

    pub fn derived_readings(&self) -> impl Iterator<Item = &DerivedReading> {
        self.derived.values()
    }

    /// Raw value for an attribute; `None` if absent or null.
    pub fn raw_value(&self, id: AttributeId) -> Option<f64> {
        self.raw(id).and_then(|r| r.value)
    }
}

/// Value delivered to consumers: a measurement or a state label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    State(&'static str),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v:.2}"),
            Self::State(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

/// Per-sensor record handed to consumers after every publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorUpdate {
    /// `"{installation_id}-{key}"`, stable across token replacement.
    pub entity_id: String,
    pub key: &'static str,
    pub name: &'static str,
    pub value: Option<SensorValue>,
    pub unit: Option<Unit>,
    pub availability: Availability,
    /// Source attribute for raw sensors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<AttributeId>,
    /// Unlabelled numeric value, for enumerated sensors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<f64>,
}
