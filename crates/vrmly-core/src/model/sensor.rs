use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{AttributeCatalog, AttributeId, ValueKind};
use crate::error::CoreError;

/// Measurement unit attached to a sensor or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr)]
pub enum Unit {
    #[serde(rename = "W")]
    #[strum(serialize = "W")]
    Watt,
    #[serde(rename = "V")]
    #[strum(serialize = "V")]
    Volt,
    #[serde(rename = "A")]
    #[strum(serialize = "A")]
    Ampere,
    #[serde(rename = "kWh")]
    #[strum(serialize = "kWh")]
    KilowattHour,
}

/// How a derived sensor combines its raw inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// `numerator / denominator`; null when the denominator is zero.
    Ratio {
        numerator: AttributeId,
        denominator: AttributeId,
    },
    /// `a * b`.
    Product(AttributeId, AttributeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Reports one attribute as-is.
    Raw(AttributeId),
    /// Computed from raw attributes of the same snapshot.
    Derived(Derivation),
}

/// Static description of one logical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDefinition {
    /// Stable key; also the suffix of the sensor's entity id.
    pub key: &'static str,
    pub name: &'static str,
    pub kind: SensorKind,
    /// Fixed by the definition, never computed from inputs.
    pub unit: Option<Unit>,
    pub enabled_by_default: bool,
}

impl SensorDefinition {
    /// Attribute ids this sensor reads, in operand order.
    pub fn source_ids(&self) -> Vec<AttributeId> {
        match self.kind {
            SensorKind::Raw(id) => vec![id],
            SensorKind::Derived(Derivation::Ratio {
                numerator,
                denominator,
            }) => vec![numerator, denominator],
            SensorKind::Derived(Derivation::Product(a, b)) => vec![a, b],
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.kind, SensorKind::Derived(_))
    }

    /// The attribute a raw sensor reports, `None` for derived sensors.
    pub fn attribute_id(&self) -> Option<AttributeId> {
        match self.kind {
            SensorKind::Raw(id) => Some(id),
            SensorKind::Derived(_) => None,
        }
    }
}

const fn raw(
    key: &'static str,
    name: &'static str,
    attribute: u32,
    unit: Option<Unit>,
) -> SensorDefinition {
    SensorDefinition {
        key,
        name,
        kind: SensorKind::Raw(AttributeId(attribute)),
        unit,
        enabled_by_default: true,
    }
}

/// The default sensor table for a Victron solar charger.
pub const DEFAULT_SENSORS: &[SensorDefinition] = &[
    raw("solar_power", "Solar power", 442, Some(Unit::Watt)),
    raw("solar_voltage", "Solar voltage", 86, Some(Unit::Volt)),
    SensorDefinition {
        key: "solar_current",
        name: "Solar current",
        kind: SensorKind::Derived(Derivation::Ratio {
            numerator: AttributeId(442),
            denominator: AttributeId(86),
        }),
        unit: Some(Unit::Ampere),
        enabled_by_default: true,
    },
    raw("battery_current", "Battery current", 82, Some(Unit::Ampere)),
    raw("battery_voltage", "Battery voltage", 81, Some(Unit::Volt)),
    raw("battery_state", "Battery state", 85, None),
    SensorDefinition {
        key: "battery_power",
        name: "Battery power",
        kind: SensorKind::Derived(Derivation::Product(AttributeId(81), AttributeId(82))),
        unit: Some(Unit::Watt),
        enabled_by_default: true,
    },
    raw("load_current", "Load current", 242, Some(Unit::Ampere)),
    raw("load_state", "Load state", 241, None),
    SensorDefinition {
        key: "load_power",
        name: "Load power",
        kind: SensorKind::Derived(Derivation::Product(AttributeId(81), AttributeId(242))),
        unit: Some(Unit::Watt),
        enabled_by_default: true,
    },
    raw(
        "solar_energy_today",
        "Solar energy today",
        94,
        Some(Unit::KilowattHour),
    ),
];

/// Check a definition table against the catalog.
///
/// Every source id must be catalogued, derived sensors may only read
/// numeric attributes, and keys must be unique. The first offending
/// definition is reported by key.
pub fn validate_definitions(
    catalog: &AttributeCatalog,
    definitions: &[SensorDefinition],
) -> Result<(), CoreError> {
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(def.key) {
            return Err(CoreError::InvalidSensor {
                sensor: def.key.to_owned(),
                reason: "duplicate sensor key".into(),
            });
        }
        for id in def.source_ids() {
            let Some(info) = catalog.lookup(id) else {
                return Err(CoreError::InvalidSensor {
                    sensor: def.key.to_owned(),
                    reason: format!("attribute {id} is not in the attribute catalog"),
                });
            };
            if def.is_derived() && matches!(info.kind, ValueKind::Enumerated(_)) {
                return Err(CoreError::InvalidSensor {
                    sensor: def.key.to_owned(),
                    reason: format!("attribute {id} is a state code and cannot feed a derivation"),
                });
            }
        }
    }
    Ok(())
}

/// The validated, enabled subset of a definition table.
///
/// Built once at configuration time; cheap to clone.
#[derive(Debug, Clone)]
pub struct SensorSet {
    catalog: AttributeCatalog,
    definitions: Arc<[SensorDefinition]>,
}

impl SensorSet {
    /// Validate `definitions` and select the ones named in `enabled`.
    ///
    /// An empty `enabled` list selects every definition that is enabled by
    /// default. Unknown keys are rejected. Table order is preserved and
    /// repeated keys collapse.
    pub fn resolve(
        catalog: AttributeCatalog,
        definitions: &[SensorDefinition],
        enabled: &[String],
    ) -> Result<Self, CoreError> {
        validate_definitions(&catalog, definitions)?;

        if let Some(unknown) = enabled
            .iter()
            .find(|key| !definitions.iter().any(|def| def.key == key.as_str()))
        {
            return Err(CoreError::UnknownSensor {
                key: unknown.clone(),
            });
        }

        let selected: Vec<SensorDefinition> = definitions
            .iter()
            .filter(|def| {
                if enabled.is_empty() {
                    def.enabled_by_default
                } else {
                    enabled.iter().any(|key| key == def.key)
                }
            })
            .copied()
            .collect();

        if selected.is_empty() {
            return Err(CoreError::InvalidConfig {
                field: "sensors".into(),
                reason: "no sensors enabled".into(),
            });
        }

        Ok(Self {
            catalog,
            definitions: selected.into(),
        })
    }

    /// Every default-enabled sensor from [`DEFAULT_SENSORS`].
    pub fn defaults() -> Result<Self, CoreError> {
        Self::resolve(AttributeCatalog::victron(), DEFAULT_SENSORS, &[])
    }

    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    pub fn definitions(&self) -> &[SensorDefinition] {
        &self.definitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SensorDefinition> {
        self.definitions.iter().find(|def| def.key == key)
    }

    /// Sorted, de-duplicated attribute ids needed by the enabled sensors.
    /// This is exactly what one poll cycle requests.
    pub fn attribute_ids(&self) -> Vec<AttributeId> {
        let mut ids: Vec<AttributeId> = self
            .definitions
            .iter()
            .flat_map(SensorDefinition::source_ids)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{AttributeInfo, ValueKind};

    #[test]
    fn default_table_is_valid() {
        validate_definitions(&AttributeCatalog::victron(), DEFAULT_SENSORS)
            .expect("default sensors reference catalogued attributes");
        assert_eq!(DEFAULT_SENSORS.len(), 11);
    }

    #[test]
    fn unknown_attribute_fails_at_load_time() {
        const BROKEN: &[SensorDefinition] = &[SensorDefinition {
            key: "mystery_power",
            name: "Mystery power",
            kind: SensorKind::Derived(Derivation::Product(AttributeId(81), AttributeId(9999))),
            unit: Some(Unit::Watt),
            enabled_by_default: true,
        }];

        let err = SensorSet::resolve(AttributeCatalog::victron(), BROKEN, &[]).unwrap_err();
        match err {
            CoreError::InvalidSensor { sensor, reason } => {
                assert_eq!(sensor, "mystery_power");
                assert!(reason.contains("9999"));
            }
            other => panic!("expected InvalidSensor, got {other:?}"),
        }
    }

    #[test]
    fn derivation_from_state_code_is_rejected() {
        const BROKEN: &[SensorDefinition] = &[SensorDefinition {
            key: "state_ratio",
            name: "State ratio",
            kind: SensorKind::Derived(Derivation::Ratio {
                numerator: AttributeId(442),
                denominator: AttributeId(85),
            }),
            unit: None,
            enabled_by_default: true,
        }];

        assert!(matches!(
            validate_definitions(&AttributeCatalog::victron(), BROKEN),
            Err(CoreError::InvalidSensor { .. })
        ));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        const DUPES: &[SensorDefinition] = &[
            raw("battery_voltage", "Battery voltage", 81, Some(Unit::Volt)),
            raw("battery_voltage", "Battery voltage again", 81, Some(Unit::Volt)),
        ];
        assert!(validate_definitions(&AttributeCatalog::victron(), DUPES).is_err());
    }

    #[test]
    fn custom_catalog_is_honoured() {
        const ATTRS: &[AttributeInfo] = &[AttributeInfo {
            id: AttributeId(1),
            name: "One",
            unit: Some(Unit::Volt),
            kind: ValueKind::Numeric,
        }];
        const DEFS: &[SensorDefinition] = &[raw("one", "One", 1, Some(Unit::Volt))];

        let set = SensorSet::resolve(AttributeCatalog::new(ATTRS), DEFS, &[]).unwrap();
        assert_eq!(set.attribute_ids(), vec![AttributeId(1)]);
    }

    #[test]
    fn empty_selection_means_defaults() {
        let set = SensorSet::defaults().unwrap();
        assert_eq!(set.len(), DEFAULT_SENSORS.len());
    }

    #[test]
    fn unknown_key_is_configuration_error() {
        let err = SensorSet::resolve(
            AttributeCatalog::victron(),
            DEFAULT_SENSORS,
            &["battery_power".into(), "wind_speed".into()],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnknownSensor { ref key } if key == "wind_speed"));
    }

    #[test]
    fn selection_keeps_table_order_and_dedups() {
        let set = SensorSet::resolve(
            AttributeCatalog::victron(),
            DEFAULT_SENSORS,
            &[
                "load_power".into(),
                "solar_power".into(),
                "load_power".into(),
            ],
        )
        .unwrap();

        let keys: Vec<_> = set.iter().map(|d| d.key).collect();
        assert_eq!(keys, vec!["solar_power", "load_power"]);
    }

    #[test]
    fn attribute_ids_are_sorted_and_unique() {
        let set = SensorSet::resolve(
            AttributeCatalog::victron(),
            DEFAULT_SENSORS,
            &[
                "battery_power".into(),
                "load_power".into(),
                "battery_voltage".into(),
            ],
        )
        .unwrap();

        assert_eq!(
            set.attribute_ids(),
            vec![AttributeId(81), AttributeId(82), AttributeId(242)]
        );
    }

    #[test]
    fn full_default_set_requests_eight_attributes() {
        let ids = SensorSet::defaults().unwrap().attribute_ids();
        let raw: Vec<u32> = ids.iter().map(|id| id.0).collect();
        assert_eq!(raw, vec![81, 82, 85, 86, 94, 241, 242, 442]);
    }

    #[test]
    fn unit_symbols() {
        assert_eq!(Unit::KilowattHour.to_string(), "kWh");
        assert_eq!(serde_json::to_value(Unit::Watt).unwrap(), serde_json::json!("W"));
    }
}
