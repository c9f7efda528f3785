//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use vrmly_core::{EngineConfig, VrmSession};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, Profile};
use crate::error::CliError;
use crate::output;

const SETTABLE_KEYS: &str = "installation_id, installation_name, device_instance, api_token, \
     api_token_env, scan_interval, sensors, failure_threshold, timeout, base_url, ca_cert";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the token.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "scan_interval = {}", cfg.defaults.scan_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "installation_id = {}", p.installation_id);
        if let Some(ref n) = p.installation_name {
            let _ = writeln!(out, "installation_name = \"{n}\"");
        }
        let _ = writeln!(out, "device_instance = {}", p.device_instance);
        if p.api_token.is_some() {
            let _ = writeln!(out, "api_token = \"****\"");
        }
        if let Some(ref env) = p.api_token_env {
            let _ = writeln!(out, "api_token_env = \"{env}\"");
        }
        if let Some(interval) = p.scan_interval {
            let _ = writeln!(out, "scan_interval = {interval}");
        }
        if !p.sensors.is_empty() {
            let quoted: Vec<String> = p.sensors.iter().map(|s| format!("\"{s}\"")).collect();
            let _ = writeln!(out, "sensors = [{}]", quoted.join(", "));
        }
        if let Some(threshold) = p.failure_threshold {
            let _ = writeln!(out, "failure_threshold = {threshold}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(ref url) = p.base_url {
            let _ = writeln!(out, "base_url = \"{url}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
    }

    out
}

/// Config with every plaintext token masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            timeout: cfg.defaults.timeout,
            scan_interval: cfg.defaults.scan_interval,
        },
        profiles: cfg
            .profiles
            .iter()
            .map(|(name, p)| {
                let mut p = p.clone();
                if p.api_token.is_some() {
                    p.api_token = Some("****".into());
                }
                (name.clone(), p)
            })
            .collect(),
    }
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be a number, got '{value}'"),
    })
}

fn profiles_list(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    names.sort();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Offer to store the token in the system keyring or return it for
/// plaintext config.
///
/// Returns `Some(token)` if the user chose plaintext, `None` if stored in
/// the keyring.
fn prompt_token_storage(profile_name: &str, token: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the access token?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        vrmly_config::store_api_token(profile_name, token)?;
        eprintln!("   ✓ Access token stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(token.to_owned()))
    }
}

/// Let the user pick one of the installations the token can see, falling
/// back to a typed id when the list can't be fetched.
async fn prompt_installation(token: &str) -> Result<(u64, Option<String>), CliError> {
    let engine = EngineConfig::new(SecretString::from(token.to_owned()), 0);
    let listed = match VrmSession::from_config(&engine) {
        Ok(session) => session.list_installations().await.map_err(CliError::from),
        Err(e) => Err(e.into()),
    };

    match listed {
        Ok(installations) if !installations.is_empty() => {
            let items: Vec<String> = installations
                .iter()
                .map(|i| format!("{} ({})", i.name, i.id))
                .collect();
            let selection = Select::new()
                .with_prompt("Installation")
                .items(&items)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            let chosen = &installations[selection];
            Ok((chosen.id, Some(chosen.name.clone())))
        }
        Ok(_) => Err(CliError::Validation {
            field: "installation_id".into(),
            reason: "the access token has no installations".into(),
        }),
        Err(e @ CliError::AuthFailed { .. }) => Err(e),
        Err(e) => {
            eprintln!("   Could not list installations: {e}");
            let id: u64 = Input::new()
                .with_prompt("Installation id (idSite)")
                .interact_text()
                .map_err(prompt_err)?;
            Ok((id, None))
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("vrmly configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            // 1. Profile name
            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            // 2. Access token
            eprintln!("   Create a token in VRM under Preferences > Integrations > Access tokens.");
            let token = rpassword::prompt_password("Access token: ").map_err(prompt_err)?;
            let token = token.trim().to_owned();
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "api_token".into(),
                    reason: "access token cannot be empty".into(),
                });
            }

            // 3. Installation, picked from what the token can see
            let (installation_id, installation_name) = prompt_installation(&token).await?;

            // 4. Device instance
            let device_instance: u32 = Input::new()
                .with_prompt("Solar charger device instance")
                .default(0)
                .interact_text()
                .map_err(prompt_err)?;

            // 5. Token storage
            let api_token = prompt_token_storage(&profile_name, &token)?;

            // 6. Merge into existing config
            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(
                profile_name.clone(),
                Profile {
                    installation_id,
                    installation_name,
                    device_instance,
                    api_token,
                    ..Profile::default()
                },
            );
            if cfg.profiles.len() == 1 || cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }
            save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Profile: {profile_name}");
            eprintln!("\n  Test it: vrmly snapshot");

            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            match key.as_str() {
                "installation_id" | "installation-id" => {
                    profile.installation_id = parse_number("installation_id", &value)?;
                }
                "installation_name" | "installation-name" => {
                    profile.installation_name = Some(value);
                }
                "device_instance" | "device-instance" => {
                    profile.device_instance = parse_number("device_instance", &value)?;
                }
                "api_token" | "api-token" => profile.api_token = Some(value),
                "api_token_env" | "api-token-env" => profile.api_token_env = Some(value),
                "scan_interval" | "scan-interval" => {
                    profile.scan_interval = Some(parse_number("scan_interval", &value)?);
                }
                "sensors" => {
                    profile.sensors = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect();
                }
                "failure_threshold" | "failure-threshold" => {
                    profile.failure_threshold = Some(parse_number("failure_threshold", &value)?);
                }
                "timeout" => profile.timeout = Some(parse_number("timeout", &value)?),
                "base_url" | "base-url" => profile.base_url = Some(value),
                "ca_cert" | "ca-cert" => profile.ca_cert = Some(value.into()),
                other => {
                    return Err(CliError::Validation {
                        field: other.into(),
                        reason: format!("unknown config key '{other}'. Valid keys: {SETTABLE_KEYS}"),
                    });
                }
            }

            save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: vrmly config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: profiles_list(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: profiles_list(&cfg),
                });
            }

            let token = rpassword::prompt_password("Access token: ").map_err(prompt_err)?;
            if token.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "api_token".into(),
                    reason: "access token cannot be empty".into(),
                });
            }
            vrmly_config::store_api_token(&profile_name, token.trim())?;

            eprintln!("✓ Access token stored in system keyring for profile '{profile_name}'");
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sample() -> Config {
        let mut profiles = HashMap::new();
        profiles.insert(
            "boat".to_owned(),
            Profile {
                installation_id: 1234,
                api_token: Some("secret-token".into()),
                sensors: vec!["battery_power".into()],
                ..Profile::default()
            },
        );
        Config {
            default_profile: Some("boat".into()),
            defaults: Defaults::default(),
            profiles,
        }
    }

    #[test]
    fn redacted_text_hides_token() {
        let text = format_config_redacted(&sample());
        assert!(text.contains("installation_id = 1234"));
        assert!(text.contains("api_token = \"****\""));
        assert!(text.contains("sensors = [\"battery_power\"]"));
        assert!(!text.contains("secret-token"));
    }

    #[test]
    fn redacted_config_masks_plaintext_token() {
        let cfg = redacted(&sample());
        assert_eq!(cfg.profiles["boat"].api_token.as_deref(), Some("****"));
    }

    #[test]
    fn parse_number_rejects_text() {
        let err = parse_number::<u64>("scan_interval", "soon").unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }
}
