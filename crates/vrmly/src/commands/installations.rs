//! Installation listing.

use tabled::Tabled;

use vrmly_core::{Installation, VrmSession};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct InstallationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Identifier")]
    identifier: String,
}

impl From<&Installation> for InstallationRow {
    fn from(i: &Installation) -> Self {
        Self {
            id: i.id.to_string(),
            name: i.name.clone(),
            identifier: i.identifier.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let engine = config::resolve_account_config(global)?;
    let session = VrmSession::from_config(&engine)?;
    let installations = session.list_installations().await?;
    let out = output::render_list(
        &global.output,
        &installations,
        |i| InstallationRow::from(i),
        |i| format!("{}\t{}", i.id, i.name),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
