// Wire schemas for the VRM responses this client reads.
//
// Only the fields the poller consumes are modelled. The envelope shape is
// strict; individual graph series are read leniently so one unusable
// attribute cannot spoil the rest of the payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Failure envelope VRM sends with HTTP 200 (and some 4xx) responses:
/// `{"success": false, "errors": "...", "error_code": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub success: bool,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl ErrorEnvelope {
    /// Flatten `errors`, which VRM sends as a string or an object of
    /// field -> message(s).
    pub fn message(&self) -> String {
        match &self.errors {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "request was not successful".into(),
        }
    }
}

// ── Graph widget ────────────────────────────────────────────────────

/// `GET /installations/{id}/widgets/Graph`
#[derive(Debug, Deserialize)]
pub(crate) struct GraphResponse {
    pub records: GraphRecords,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphRecords {
    /// Attribute id (as a string key) -> time series, oldest first.
    pub data: BTreeMap<String, Series>,
}

/// One attribute's time series, kept as raw JSON.
///
/// VRM sends `null` or odd shapes for attributes it has no data for, so the
/// shape is checked per series instead of failing the whole response.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub(crate) struct Series(serde_json::Value);

impl Series {
    /// Value of the newest datapoint, if the series has a usable one.
    ///
    /// A datapoint is `[timestamp, value, ...]`; VRM may append min/max
    /// columns after the value and only index 1 is read.
    pub fn latest(&self) -> Option<f64> {
        let last = self.0.as_array()?.last()?;
        last.as_array()?.get(1)?.as_f64()
    }
}

// ── Installations ───────────────────────────────────────────────────

/// `GET /installations`
#[derive(Debug, Deserialize)]
pub(crate) struct InstallationsResponse {
    pub records: Vec<InstallationRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InstallationRecord {
    #[serde(rename = "idSite")]
    pub id_site: Option<u64>,
    pub name: Option<String>,
    pub identifier: Option<String>,
}

/// An installation (site) the token has access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Installation {
    pub id: u64,
    pub name: String,
    /// VRM portal identifier (usually the GX device serial).
    pub identifier: Option<String>,
}

impl InstallationRecord {
    /// Records without `idSite` are not usable and are dropped.
    pub fn into_installation(self) -> Option<Installation> {
        let id = self.id_site?;
        Some(Installation {
            id,
            name: self.name.unwrap_or_else(|| format!("Installation {id}")),
            identifier: self.identifier,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(value: serde_json::Value) -> Series {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn series_reads_second_column_of_newest_point() {
        let s = series(json!([
            [1_699_999_000_000_i64, 23.0],
            [1_700_000_000_000_i64, 24.5, 24.0, 25.0]
        ]));
        assert_eq!(s.latest(), Some(24.5));
    }

    #[test]
    fn short_or_null_datapoint_has_no_value() {
        assert_eq!(series(json!([[1_700_000_000_000_i64]])).latest(), None);
        assert_eq!(series(json!([[1_700_000_000_000_i64, null]])).latest(), None);
    }

    #[test]
    fn unusable_series_shapes_have_no_value() {
        assert_eq!(series(json!(null)).latest(), None);
        assert_eq!(series(json!([])).latest(), None);
        assert_eq!(series(json!([5])).latest(), None);
        assert_eq!(series(json!({ "value": 5 })).latest(), None);
        assert_eq!(series(json!([[1_700_000_000_000_i64, "n/a"]])).latest(), None);
    }

    #[test]
    fn graph_records_tolerate_null_series() {
        let resp: GraphResponse = serde_json::from_value(json!({
            "records": { "data": { "81": [[1_700_000_000_000_i64, 24.0]], "82": null } }
        }))
        .unwrap();
        assert_eq!(resp.records.data["81"].latest(), Some(24.0));
        assert_eq!(resp.records.data["82"].latest(), None);
    }

    #[test]
    fn graph_data_that_is_not_an_object_is_rejected() {
        let bad = serde_json::from_value::<GraphResponse>(json!({ "records": { "data": [] } }));
        assert!(bad.is_err());
    }

    #[test]
    fn installation_without_id_is_dropped() {
        let rec: InstallationRecord =
            serde_json::from_value(json!({ "name": "Cabin" })).unwrap();
        assert!(rec.into_installation().is_none());
    }

    #[test]
    fn installation_name_falls_back_to_id() {
        let rec: InstallationRecord = serde_json::from_value(json!({ "idSite": 42 })).unwrap();
        let inst = rec.into_installation().unwrap();
        assert_eq!(inst.name, "Installation 42");
    }

    #[test]
    fn error_envelope_flattens_object_errors() {
        let env: ErrorEnvelope = serde_json::from_value(json!({
            "success": false,
            "errors": { "instance": ["must be an integer"] },
            "error_code": "invalid_parameter"
        }))
        .unwrap();
        assert!(!env.success);
        assert!(env.message().contains("must be an integer"));
        assert_eq!(env.error_code.as_deref(), Some("invalid_parameter"));
    }
}
