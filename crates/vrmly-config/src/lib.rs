//! Shared configuration for the vrmly CLI.
//!
//! TOML profiles (one per monitored installation), token resolution
//! (env + keyring + plaintext), and translation to
//! `vrmly_core::EngineConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vrmly_core::EngineConfig;
use vrmly_core::config::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};

/// Keyring service name; entries are keyed `"{profile}/api-token"`.
pub const KEYRING_SERVICE: &str = "vrmly";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error(transparent)]
    Engine(#[from] vrmly_core::CoreError),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named installation profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the override, else `default_profile`,
    /// else `"default"`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            scan_interval: default_scan_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
fn default_scan_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

/// One monitored installation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// VRM site id (`idSite`).
    pub installation_id: u64,

    /// Display name captured when the profile was created.
    pub installation_name: Option<String>,

    /// Device instance of the solar charger on the installation.
    #[serde(default)]
    pub device_instance: u32,

    /// Access token (plaintext; prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the access token.
    pub api_token_env: Option<String>,

    /// Override the poll interval (seconds).
    pub scan_interval: Option<u64>,

    /// Enabled sensor keys. Empty means the default set.
    #[serde(default)]
    pub sensors: Vec<String>,

    pub failure_threshold: Option<u32>,

    /// Override the request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override the API root (testing, proxies).
    pub base_url: Option<String>,

    /// Path to an extra CA certificate.
    pub ca_cert: Option<PathBuf>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vrmly", "vrmly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vrmly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// `VRMLY_`-prefixed variables override file values; nested keys are
/// separated by a double underscore (`VRMLY_DEFAULTS__SCAN_INTERVAL`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VRMLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the access token: profile's env var, then keyring, then
/// plaintext in the config file.
pub fn resolve_api_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_token_env → env var lookup
    if let Some(ref env_name) = profile.api_token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.api_token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store an access token in the system keyring for `profile_name`.
pub fn store_api_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(token)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/api-token")
}

/// Build an `EngineConfig` from a profile with an already-resolved token.
///
/// Profile values win over `defaults`. The result is validated, so an
/// out-of-range interval fails here rather than at poll time.
pub fn profile_to_engine_config(
    profile: &Profile,
    defaults: &Defaults,
    token: SecretString,
) -> Result<EngineConfig, ConfigError> {
    let mut config = EngineConfig::new(token, profile.installation_id);

    if let Some(ref raw) = profile.base_url {
        config.base_url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }

    config.device_instance = profile.device_instance;
    config.poll_interval =
        Duration::from_secs(profile.scan_interval.unwrap_or(defaults.scan_interval));
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.failure_threshold = profile
        .failure_threshold
        .unwrap_or(DEFAULT_FAILURE_THRESHOLD);
    config.enabled_sensors.clone_from(&profile.sensors);
    config.ca_cert.clone_from(&profile.ca_cert);

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "boat"

[defaults]
scan_interval = 120

[profiles.boat]
installation_id = 1234
installation_name = "Boat"
device_instance = 2
api_token = "plain-token"
sensors = ["battery_power", "battery_voltage"]

[profiles.cabin]
installation_id = 5678
scan_interval = 30
timeout = 10
"#;

    fn write_sample() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_profiles_and_defaults() {
        let (_dir, path) = write_sample();
        let cfg = load_config_from(&path).unwrap();

        assert_eq!(cfg.active_profile_name(None), "boat");
        assert_eq!(cfg.active_profile_name(Some("cabin")), "cabin");
        assert_eq!(cfg.defaults.scan_interval, 120);
        assert_eq!(cfg.defaults.output, "table");

        let boat = cfg.profile("boat").unwrap();
        assert_eq!(boat.installation_id, 1234);
        assert_eq!(boat.device_instance, 2);
        assert_eq!(boat.sensors, vec!["battery_power", "battery_voltage"]);

        assert!(matches!(
            cfg.profile("nope"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_preserves_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                installation_id: 42,
                installation_name: Some("Shed".into()),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let profile = loaded.profile("default").unwrap();
        assert_eq!(profile.installation_id, 42);
        assert_eq!(profile.installation_name.as_deref(), Some("Shed"));
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let profile = Profile {
            installation_id: 1,
            api_token: Some("from-file".into()),
            api_token_env: Some("VRMLY_TEST_TOKEN_THAT_IS_NEVER_SET".into()),
            ..Profile::default()
        };
        let token = resolve_api_token(&profile, "vrmly-test-profile-without-keyring").unwrap();
        assert_eq!(token.expose_secret(), "from-file");
    }

    #[test]
    fn no_token_anywhere_is_an_error() {
        let profile = Profile {
            installation_id: 1,
            ..Profile::default()
        };
        assert!(matches!(
            resolve_api_token(&profile, "vrmly-test-profile-without-keyring"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn profile_values_override_defaults() {
        let (_dir, path) = write_sample();
        let cfg = load_config_from(&path).unwrap();
        let token = || SecretString::from("t".to_string());

        let boat = profile_to_engine_config(cfg.profile("boat").unwrap(), &cfg.defaults, token())
            .unwrap();
        assert_eq!(boat.poll_interval, Duration::from_secs(120));
        assert_eq!(boat.device_instance, 2);
        assert_eq!(boat.enabled_sensors.len(), 2);
        assert_eq!(boat.base_url.as_str(), "https://vrmapi.victronenergy.com/v2");

        let cabin = profile_to_engine_config(cfg.profile("cabin").unwrap(), &cfg.defaults, token())
            .unwrap();
        assert_eq!(cabin.poll_interval, Duration::from_secs(30));
        assert_eq!(cabin.timeout, Duration::from_secs(10));
        assert_eq!(cabin.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
    }

    #[test]
    fn out_of_range_interval_is_rejected() {
        let profile = Profile {
            installation_id: 1,
            scan_interval: Some(5),
            timeout: Some(5),
            ..Profile::default()
        };
        let err = profile_to_engine_config(
            &profile,
            &Defaults::default(),
            SecretString::from("t".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Engine(ref e) if e.is_configuration()));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let profile = Profile {
            installation_id: 1,
            base_url: Some("not a url".into()),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_engine_config(
                &profile,
                &Defaults::default(),
                SecretString::from("t".to_string())
            ),
            Err(ConfigError::Validation { .. })
        ));
    }
}
