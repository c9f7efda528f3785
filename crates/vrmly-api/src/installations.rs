// Installation discovery

use tracing::debug;

use crate::client::VrmClient;
use crate::error::Error;
use crate::models::{Installation, InstallationRecord, InstallationsResponse};

impl VrmClient {
    /// List the installations accessible with the current token.
    ///
    /// `GET installations`. Records without an `idSite` are skipped.
    pub async fn list_installations(&self) -> Result<Vec<Installation>, Error> {
        let url = self.api_url("installations")?;
        let resp: InstallationsResponse = self.get(url, &[]).await?;

        let installations: Vec<Installation> = resp
            .records
            .into_iter()
            .filter_map(InstallationRecord::into_installation)
            .collect();

        debug!(count = installations.len(), "listed installations");
        Ok(installations)
    }
}
