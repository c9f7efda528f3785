// ── Engine configuration ──
//
// Constructed by the caller (CLI, config file, tests). The core never
// reads files or environment variables itself.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Shortest allowed poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Longest allowed poll interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Consecutive failed cycles before published values turn unavailable.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Everything needed to poll one installation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// API root, normally [`vrmly_api::API_BASE_URL`].
    pub base_url: Url,
    pub token: SecretString,
    pub installation_id: u64,
    pub device_instance: u32,
    pub poll_interval: Duration,
    /// Per-request network timeout; must not exceed `poll_interval`.
    pub timeout: Duration,
    pub failure_threshold: u32,
    /// Sensor keys to publish. Empty means the default set.
    pub enabled_sensors: Vec<String>,
    /// Extra CA certificate (PEM) to trust.
    pub ca_cert: Option<PathBuf>,
}

impl EngineConfig {
    /// Defaults for everything except the credentials and installation.
    pub fn new(token: SecretString, installation_id: u64) -> Self {
        Self {
            base_url: vrmly_api::default_base_url(),
            token,
            installation_id,
            device_instance: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            enabled_sensors: Vec::new(),
            ca_cert: None,
        }
    }

    /// Bounds checks. Sensor keys are checked separately when the
    /// [`SensorSet`](crate::SensorSet) is resolved.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval < MIN_POLL_INTERVAL || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(invalid(
                "poll interval",
                format!(
                    "{}s is outside {}..={}s",
                    self.poll_interval.as_secs(),
                    MIN_POLL_INTERVAL.as_secs(),
                    MAX_POLL_INTERVAL.as_secs()
                ),
            ));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout", "must be greater than zero".into()));
        }
        if self.timeout > self.poll_interval {
            return Err(invalid(
                "timeout",
                format!(
                    "{}s exceeds the poll interval of {}s",
                    self.timeout.as_secs(),
                    self.poll_interval.as_secs()
                ),
            ));
        }
        if self.failure_threshold == 0 {
            return Err(invalid("failure threshold", "must be at least 1".into()));
        }
        if self.installation_id == 0 {
            return Err(invalid("installation id", "must be set".into()));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> CoreError {
    CoreError::InvalidConfig {
        field: field.to_owned(),
        reason,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(SecretString::from("t".to_string()), 1234)
    }

    #[test]
    fn defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn interval_floor_is_enforced() {
        let mut cfg = config();
        cfg.poll_interval = Duration::from_secs(10);
        cfg.timeout = Duration::from_secs(5);
        assert!(matches!(
            cfg.validate(),
            Err(CoreError::InvalidConfig { ref field, .. }) if field == "poll interval"
        ));

        cfg.poll_interval = MIN_POLL_INTERVAL;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn interval_ceiling_is_enforced() {
        let mut cfg = config();
        cfg.poll_interval = MAX_POLL_INTERVAL + Duration::from_secs(1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn timeout_must_fit_in_interval() {
        let mut cfg = config();
        cfg.timeout = cfg.poll_interval + Duration::from_secs(1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut cfg = config();
        cfg.failure_threshold = 0;
        assert!(cfg.validate().unwrap_err().is_configuration());
    }
}
