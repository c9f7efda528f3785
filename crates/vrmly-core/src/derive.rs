// ── Derived sensors ──
//
// Ratios and products of raw readings from a single cycle. Derived sensors
// only ever read raw attributes, so evaluation order does not matter.

use std::collections::HashMap;

use crate::catalog::AttributeId;
use crate::model::{Derivation, DerivedReading, RawReading, SensorDefinition, SensorKind};

/// Stateless evaluator for derived sensor definitions.
pub struct DerivationEngine;

impl DerivationEngine {
    /// Compute one [`DerivedReading`] per derived definition.
    ///
    /// Raw definitions are skipped. A missing or null input yields a null
    /// result; so does a zero denominator. Zero is never substituted.
    pub fn derive(readings: &[RawReading], definitions: &[SensorDefinition]) -> Vec<DerivedReading> {
        let values: HashMap<AttributeId, Option<f64>> = readings
            .iter()
            .map(|r| (r.attribute_id, r.value))
            .collect();
        let value_of = |id: AttributeId| values.get(&id).copied().flatten();

        definitions
            .iter()
            .filter_map(|def| {
                let SensorKind::Derived(derivation) = def.kind else {
                    return None;
                };
                let value = match derivation {
                    Derivation::Ratio {
                        numerator,
                        denominator,
                    } => ratio(value_of(numerator), value_of(denominator)),
                    Derivation::Product(a, b) => product(value_of(a), value_of(b)),
                };
                Some(DerivedReading {
                    sensor_key: def.key,
                    value,
                    unit: def.unit,
                })
            })
            .collect()
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    finite(n / d)
}

fn product(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    finite(a? * b?)
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DEFAULT_SENSORS, Unit};

    fn snapshot(values: &[(u32, Option<f64>)]) -> Vec<RawReading> {
        let now = Utc::now();
        values
            .iter()
            .map(|&(id, value)| RawReading {
                attribute_id: AttributeId(id),
                value,
                unit: None,
                fetched_at: now,
            })
            .collect()
    }

    fn derived(readings: &[RawReading], key: &str) -> DerivedReading {
        DerivationEngine::derive(readings, DEFAULT_SENSORS)
            .into_iter()
            .find(|d| d.sensor_key == key)
            .unwrap()
    }

    #[test]
    fn product_of_voltage_and_current() {
        let readings = snapshot(&[(81, Some(24.0)), (82, Some(5.0))]);
        let power = derived(&readings, "battery_power");
        assert_eq!(power.value, Some(120.0));
        assert_eq!(power.unit, Some(Unit::Watt));
    }

    #[test]
    fn product_propagates_null() {
        let readings = snapshot(&[(81, Some(24.0)), (82, None)]);
        assert_eq!(derived(&readings, "battery_power").value, None);
    }

    #[test]
    fn missing_input_is_null_not_zero() {
        let readings = snapshot(&[(81, Some(24.0))]);
        assert_eq!(derived(&readings, "load_power").value, None);
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        let readings = snapshot(&[(442, Some(300.0)), (86, Some(0.0))]);
        assert_eq!(derived(&readings, "solar_current").value, None);

        let readings = snapshot(&[(442, Some(300.0)), (86, Some(-0.0))]);
        assert_eq!(derived(&readings, "solar_current").value, None);
    }

    #[test]
    fn ratio_propagates_null_denominator() {
        let readings = snapshot(&[(442, Some(300.0)), (86, None)]);
        assert_eq!(derived(&readings, "solar_current").value, None);
    }

    #[test]
    fn ratio_of_power_and_voltage() {
        let readings = snapshot(&[(442, Some(300.0)), (86, Some(60.0))]);
        let current = derived(&readings, "solar_current");
        assert_eq!(current.value, Some(5.0));
        assert_eq!(current.unit, Some(Unit::Ampere));
    }

    #[test]
    fn only_derived_definitions_produce_readings() {
        let readings = snapshot(&[(81, Some(12.0))]);
        let keys: Vec<_> = DerivationEngine::derive(&readings, DEFAULT_SENSORS)
            .into_iter()
            .map(|d| d.sensor_key)
            .collect();
        assert_eq!(keys, vec!["solar_current", "battery_power", "load_power"]);
    }

    #[test]
    fn overflow_is_null() {
        let readings = snapshot(&[(81, Some(f64::MAX)), (82, Some(2.0))]);
        assert_eq!(derived(&readings, "battery_power").value, None);
    }
}
