// ── VRM session ──
//
// Turns one Graph widget call into a full set of `RawReading`s and
// classifies failures. No retries happen here: an unauthorized response is
// returned as-is so the coordinator can hand it to the reauth gate.

use chrono::Utc;
use secrecy::SecretString;
use tracing::debug;

use vrmly_api::{Installation, TlsMode, TransportConfig, VrmClient};

use crate::catalog::{AttributeCatalog, AttributeId};
use crate::config::EngineConfig;
use crate::error::{CoreError, FetchError};
use crate::model::RawReading;

/// Authenticated access to one VRM account.
pub struct VrmSession {
    client: VrmClient,
    catalog: AttributeCatalog,
}

impl VrmSession {
    pub fn new(client: VrmClient, catalog: AttributeCatalog) -> Self {
        Self { client, catalog }
    }

    /// Build the HTTP client described by `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config
                .ca_cert
                .clone()
                .map_or(TlsMode::System, TlsMode::CustomCa),
            timeout: config.timeout,
        };
        let client = VrmClient::new(config.base_url.clone(), config.token.clone(), &transport)?;
        Ok(Self::new(client, AttributeCatalog::victron()))
    }

    /// Replace the access token; the next fetch uses it.
    pub fn set_token(&self, token: SecretString) {
        self.client.set_token(token);
    }

    /// Fetch the latest value of every id in `attribute_ids` with one request.
    ///
    /// The result has exactly one reading per requested id, in request
    /// order. Ids the server left out come back with a null value. Ids the
    /// server sent but nobody asked for are dropped.
    pub async fn fetch(
        &self,
        installation_id: u64,
        device_instance: u32,
        attribute_ids: &[AttributeId],
    ) -> Result<Vec<RawReading>, FetchError> {
        let ids: Vec<u32> = attribute_ids.iter().map(|id| id.0).collect();
        let values = self
            .client
            .latest_values(installation_id, device_instance, &ids)
            .await?;
        let fetched_at = Utc::now();

        let readings: Vec<RawReading> = attribute_ids
            .iter()
            .map(|&attribute_id| RawReading {
                attribute_id,
                value: values.get(&attribute_id.0).copied().flatten(),
                unit: self.catalog.lookup(attribute_id).and_then(|info| info.unit),
                fetched_at,
            })
            .collect();

        let missing = readings.iter().filter(|r| r.value.is_none()).count();
        if missing > 0 {
            debug!(missing, "some attributes had no current value");
        }
        Ok(readings)
    }

    /// Installations visible to the current token.
    pub async fn list_installations(&self) -> Result<Vec<Installation>, FetchError> {
        Ok(self.client.list_installations().await?)
    }
}
