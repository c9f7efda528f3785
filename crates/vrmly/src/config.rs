//! CLI configuration: thin wrapper around `vrmly_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--installation, --token, etc.), so a one-off run works without any
//! profile on disk.

use std::time::Duration;

use secrecy::SecretString;

use vrmly_core::EngineConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use vrmly_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config,
};

/// Per-command overrides that only some subcommands expose.
#[derive(Debug, Default)]
pub struct PollOverrides {
    pub sensors: Vec<String>,
    pub interval: Option<u64>,
    pub failure_threshold: Option<u32>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// The named profile with flag overrides applied.
///
/// A missing profile is only an error when it was asked for by name;
/// otherwise flags alone must carry the installation and token.
fn effective_profile(
    global: &GlobalOpts,
    config: &Config,
    profile_name: &str,
    overrides: &PollOverrides,
) -> Result<Profile, CliError> {
    let mut profile = match config.profiles.get(profile_name) {
        Some(p) => p.clone(),
        None if global.profile.is_some() => {
            let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name.into(),
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(id) = global.installation {
        profile.installation_id = id;
    }
    if let Some(instance) = global.instance {
        profile.device_instance = instance;
    }
    if let Some(ref url) = global.base_url {
        profile.base_url = Some(url.clone());
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    if !overrides.sensors.is_empty() {
        profile.sensors.clone_from(&overrides.sensors);
    }
    if let Some(interval) = overrides.interval {
        profile.scan_interval = Some(interval);
    }
    if let Some(threshold) = overrides.failure_threshold {
        profile.failure_threshold = Some(threshold);
    }
    Ok(profile)
}

/// Resolve the access token: `--token` / `VRMLY_API_TOKEN` first, then the
/// profile chain (env var, keyring, plaintext).
fn resolve_token(
    global: &GlobalOpts,
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }
    Ok(vrmly_config::resolve_api_token(profile, profile_name)?)
}

/// Connection settings for account-level commands that do not need an
/// installation selected. Poll settings are left at their defaults and
/// not validated.
pub fn resolve_account_config(global: &GlobalOpts) -> Result<EngineConfig, CliError> {
    let config = load_config_or_default();
    let name = active_profile_name(global, &config);
    let profile = effective_profile(global, &config, &name, &PollOverrides::default())?;
    let token = resolve_token(global, &profile, &name)?;

    let mut engine = EngineConfig::new(token, profile.installation_id);
    if let Some(ref raw) = profile.base_url {
        engine.base_url = raw.parse().map_err(|_| CliError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }
    engine.timeout = Duration::from_secs(profile.timeout.unwrap_or(config.defaults.timeout));
    engine.ca_cert = profile.ca_cert;
    Ok(engine)
}

/// Build a validated `EngineConfig` from config file, profile and flags.
pub fn resolve_engine_config(
    global: &GlobalOpts,
    overrides: &PollOverrides,
) -> Result<EngineConfig, CliError> {
    let config = load_config_or_default();
    let name = active_profile_name(global, &config);
    let profile = effective_profile(global, &config, &name, overrides)?;

    if profile.installation_id == 0 {
        return Err(CliError::NoInstallation { profile: name });
    }

    let token = resolve_token(global, &profile, &name)?;
    let engine = vrmly_config::profile_to_engine_config(&profile, &config.defaults, token)
        .map_err(CliError::from)?;
    tracing::debug!(
        profile = %name,
        installation = engine.installation_id,
        interval_secs = engine.poll_interval.as_secs(),
        "resolved engine config"
    );
    Ok(engine)
}
