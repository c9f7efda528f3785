// Graph widget endpoint
//
// Returns the most recent datapoint for each requested attribute id of one
// device instance.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::client::VrmClient;
use crate::error::Error;
use crate::models::GraphResponse;

/// Latest value per attribute id. `None` means the attribute was present in
/// the response but carried no usable datapoint.
pub type LatestValues = BTreeMap<u32, Option<f64>>;

impl VrmClient {
    /// Fetch the latest value of each attribute in `attribute_ids`.
    ///
    /// Issues a single request:
    /// `GET installations/{installation_id}/widgets/Graph?instance={n}&attributeIds[]=...`
    ///
    /// Attributes the server omits are simply absent from the returned map.
    /// A series that is `null` or has no usable newest datapoint maps to
    /// `None`; only a malformed envelope is an error.
    /// Keys that are not numeric attribute ids are skipped.
    pub async fn latest_values(
        &self,
        installation_id: u64,
        device_instance: u32,
        attribute_ids: &[u32],
    ) -> Result<LatestValues, Error> {
        let url = self.api_url(&format!("installations/{installation_id}/widgets/Graph"))?;

        let mut query = Vec::with_capacity(attribute_ids.len() + 1);
        query.push(("instance", device_instance.to_string()));
        query.extend(attribute_ids.iter().map(|id| ("attributeIds[]", id.to_string())));

        let resp: GraphResponse = self.get(url, &query).await?;

        let mut values = LatestValues::new();
        for (key, series) in resp.records.data {
            let Ok(attribute_id) = key.parse::<u32>() else {
                trace!(key = %key, "skipping non-numeric attribute key");
                continue;
            };
            let latest = series.latest();
            values.insert(attribute_id, latest);
        }

        debug!(
            installation_id,
            device_instance,
            requested = attribute_ids.len(),
            received = values.len(),
            "fetched latest attribute values"
        );
        Ok(values)
    }
}
