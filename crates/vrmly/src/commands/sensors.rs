//! Sensor table listing. Needs no network access.

use serde::Serialize;
use tabled::Tabled;

use vrmly_core::{AttributeCatalog, DEFAULT_SENSORS, Derivation, SensorDefinition, SensorKind};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

/// Serializable view of a sensor definition.
#[derive(Debug, Serialize)]
struct SensorInfo {
    key: &'static str,
    name: &'static str,
    source: String,
    unit: Option<String>,
    enabled_by_default: bool,
}

impl SensorInfo {
    fn new(def: &SensorDefinition, catalog: AttributeCatalog) -> Self {
        let source = match def.kind {
            SensorKind::Raw(id) => catalog
                .lookup(id)
                .map_or_else(|| format!("attribute {id}"), |info| format!("{id} ({})", info.name)),
            SensorKind::Derived(Derivation::Ratio {
                numerator,
                denominator,
            }) => format!("{numerator} / {denominator}"),
            SensorKind::Derived(Derivation::Product(a, b)) => format!("{a} * {b}"),
        };
        Self {
            key: def.key,
            name: def.name,
            source,
            unit: def.unit.map(|u| u.to_string()),
            enabled_by_default: def.enabled_by_default,
        }
    }
}

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&SensorInfo> for SensorRow {
    fn from(s: &SensorInfo) -> Self {
        Self {
            key: s.key.into(),
            name: s.name.into(),
            source: s.source.clone(),
            unit: s.unit.clone().unwrap_or_default(),
            default: if s.enabled_by_default { "yes" } else { "no" }.into(),
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let catalog = AttributeCatalog::victron();
    let sensors: Vec<SensorInfo> = DEFAULT_SENSORS
        .iter()
        .map(|def| SensorInfo::new(def, catalog))
        .collect();
    let out = output::render_list(&global.output, &sensors, |s| SensorRow::from(s), |s| {
        s.key.to_owned()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
