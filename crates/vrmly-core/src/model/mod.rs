// ── Domain model ──
//
// Sensor definitions, per-cycle readings, and the update records handed to
// consumers.

mod reading;
mod sensor;

pub use reading::{Availability, DerivedReading, RawReading, SensorUpdate, SensorValue, Snapshot};
pub use sensor::{
    DEFAULT_SENSORS, Derivation, SensorDefinition, SensorKind, SensorSet, Unit,
    validate_definitions,
};
