// ── Attribute catalog ──
//
// Static table of the VRM attribute ids the poller understands. Pure
// lookup: ids not listed here are ignored wherever they show up.

use std::fmt;

use serde::Serialize;

use crate::model::Unit;

/// Numeric VRM attribute id (the key of a Graph widget series).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AttributeId(pub u32);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for AttributeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// What kind of value an attribute carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A plain measurement.
    Numeric,
    /// A device state code with a fixed code -> label table.
    Enumerated(&'static [(u32, &'static str)]),
}

impl ValueKind {
    /// Label for a state code. Codes outside the table render as `"Unknown"`;
    /// numeric attributes have no label.
    #[allow(clippy::float_cmp)]
    pub fn label(&self, raw: f64) -> Option<&'static str> {
        let Self::Enumerated(states) = self else {
            return None;
        };
        if raw.fract() != 0.0 || raw < 0.0 {
            return Some(UNKNOWN_STATE);
        }
        Some(
            states
                .iter()
                .find(|(code, _)| f64::from(*code) == raw)
                .map_or(UNKNOWN_STATE, |(_, label)| *label),
        )
    }
}

const UNKNOWN_STATE: &str = "Unknown";

/// Solar charger state (attribute 85).
pub const BATTERY_STATES: &[(u32, &str)] = &[
    (0, "Off"),
    (2, "Fault"),
    (3, "Bulk"),
    (4, "Absorption"),
    (5, "Float"),
    (6, "Storage"),
    (7, "Equalize"),
    (245, "Off"),
    (247, "Equalize"),
    (252, "Ext. Control"),
];

/// Load output state (attribute 241).
pub const LOAD_STATES: &[(u32, &str)] = &[(0, "Off"), (1, "On"), (2, "Fault")];

/// Catalog entry for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub id: AttributeId,
    pub name: &'static str,
    /// `None` for enumerated state codes.
    pub unit: Option<Unit>,
    pub kind: ValueKind,
}

const VICTRON_ATTRIBUTES: &[AttributeInfo] = &[
    AttributeInfo {
        id: AttributeId(81),
        name: "Battery voltage",
        unit: Some(Unit::Volt),
        kind: ValueKind::Numeric,
    },
    AttributeInfo {
        id: AttributeId(82),
        name: "Battery current",
        unit: Some(Unit::Ampere),
        kind: ValueKind::Numeric,
    },
    AttributeInfo {
        id: AttributeId(85),
        name: "Charge state",
        unit: None,
        kind: ValueKind::Enumerated(BATTERY_STATES),
    },
    AttributeInfo {
        id: AttributeId(86),
        name: "PV voltage",
        unit: Some(Unit::Volt),
        kind: ValueKind::Numeric,
    },
    AttributeInfo {
        id: AttributeId(94),
        name: "Yield today",
        unit: Some(Unit::KilowattHour),
        kind: ValueKind::Numeric,
    },
    AttributeInfo {
        id: AttributeId(241),
        name: "Load state",
        unit: None,
        kind: ValueKind::Enumerated(LOAD_STATES),
    },
    AttributeInfo {
        id: AttributeId(242),
        name: "Load current",
        unit: Some(Unit::Ampere),
        kind: ValueKind::Numeric,
    },
    AttributeInfo {
        id: AttributeId(442),
        name: "PV power",
        unit: Some(Unit::Watt),
        kind: ValueKind::Numeric,
    },
];

/// Lookup table from [`AttributeId`] to [`AttributeInfo`].
#[derive(Debug, Clone, Copy)]
pub struct AttributeCatalog {
    entries: &'static [AttributeInfo],
}

impl AttributeCatalog {
    /// Catalog over an arbitrary static table.
    pub const fn new(entries: &'static [AttributeInfo]) -> Self {
        Self { entries }
    }

    /// The Victron solar-charger attributes the default sensors use.
    pub const fn victron() -> Self {
        Self::new(VICTRON_ATTRIBUTES)
    }

    /// Look up an attribute. `None` means "ignore this id", not an error.
    pub fn lookup(&self, id: AttributeId) -> Option<&AttributeInfo> {
        self.entries.iter().find(|info| info.id == id)
    }

    pub fn contains(&self, id: AttributeId) -> bool {
        self.lookup(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeInfo> {
        self.entries.iter()
    }
}

impl Default for AttributeCatalog {
    fn default() -> Self {
        Self::victron()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_attribute() {
        let catalog = AttributeCatalog::victron();
        let info = catalog.lookup(AttributeId(442)).expect("PV power is catalogued");
        assert_eq!(info.unit, Some(Unit::Watt));
        assert_eq!(info.kind, ValueKind::Numeric);
    }

    #[test]
    fn unknown_attribute_is_none() {
        assert!(AttributeCatalog::victron().lookup(AttributeId(9999)).is_none());
    }

    #[test]
    fn ids_are_unique() {
        let catalog = AttributeCatalog::victron();
        let mut ids: Vec<_> = catalog.iter().map(|i| i.id).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn enumerated_labels() {
        let kind = ValueKind::Enumerated(BATTERY_STATES);
        assert_eq!(kind.label(5.0), Some("Float"));
        assert_eq!(kind.label(252.0), Some("Ext. Control"));
        assert_eq!(kind.label(1.0), Some("Unknown"));
        assert_eq!(kind.label(3.5), Some("Unknown"));
        assert_eq!(ValueKind::Numeric.label(5.0), None);
    }
}
