//! One-shot poll.

use tabled::Tabled;

use vrmly_core::{PollCoordinator, PollOutcome, SensorUpdate};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::config::{self, PollOverrides};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct UpdateRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl UpdateRow {
    pub(crate) fn new(update: &SensorUpdate, color: bool) -> Self {
        Self {
            entity: update.entity_id.clone(),
            name: update.name.into(),
            value: update.value.map(|v| v.to_string()).unwrap_or_default(),
            unit: update.unit.map(|u| u.to_string()).unwrap_or_default(),
            status: output::availability_cell(update.availability, color),
        }
    }
}

/// `entity_id<TAB>value`, empty when unavailable.
pub(crate) fn plain_line(update: &SensorUpdate) -> String {
    let value = update.value.map(|v| v.to_string()).unwrap_or_default();
    format!("{}\t{value}", update.entity_id)
}

pub(crate) fn render_updates(updates: &[SensorUpdate], global: &GlobalOpts) -> String {
    let color = output::should_color(&global.color);
    output::render_list(
        &global.output,
        updates,
        |u| UpdateRow::new(u, color),
        plain_line,
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: SnapshotArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let overrides = PollOverrides {
        sensors: args.sensors,
        ..PollOverrides::default()
    };
    let engine = config::resolve_engine_config(global, &overrides)?;
    let coordinator = PollCoordinator::new(engine)?;

    match coordinator.poll_once().await {
        PollOutcome::Published(snapshot) => {
            tracing::debug!(sequence = snapshot.sequence(), "snapshot fetched");
            let updates = coordinator.subscribe().updates();
            output::print_output(&render_updates(&updates, global), global.quiet);
            Ok(())
        }
        PollOutcome::AuthBlocked => Err(CliError::AuthFailed {
            profile: config::active_profile_name(global, &config::load_config_or_default()),
        }),
        PollOutcome::Failed { error, .. } => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use vrmly_core::{Availability, SensorValue, Unit};

    use super::*;

    fn update(value: Option<SensorValue>) -> SensorUpdate {
        SensorUpdate {
            entity_id: "1234-battery_power".into(),
            key: "battery_power",
            name: "Battery power",
            value,
            unit: Some(Unit::Watt),
            availability: if value.is_some() {
                Availability::Available
            } else {
                Availability::Unavailable
            },
            attribute_id: None,
            raw_value: None,
        }
    }

    #[test]
    fn plain_line_formats_number() {
        let line = plain_line(&update(Some(SensorValue::Number(6.6))));
        assert_eq!(line, "1234-battery_power\t6.60");
    }

    #[test]
    fn plain_line_leaves_unavailable_blank() {
        assert_eq!(plain_line(&update(None)), "1234-battery_power\t");
    }

    #[test]
    fn table_row_without_color() {
        let row = UpdateRow::new(&update(None), false);
        assert_eq!(row.status, "unavailable");
        assert_eq!(row.unit, "W");
        assert!(row.value.is_empty());
    }
}
