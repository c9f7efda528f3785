//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vrmly_config::ConfigError;
use vrmly_core::{CoreError, FetchError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach VRM")]
    #[diagnostic(
        code(vrmly::connection_failed),
        help("Check your network connection. VRM reported: {message}")
    )]
    ConnectionFailed { message: String },

    #[error("TLS setup failed: {message}")]
    #[diagnostic(
        code(vrmly::tls_error),
        help("Check the ca_cert path in your profile.")
    )]
    TlsError { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("VRM rejected the access token")]
    #[diagnostic(
        code(vrmly::auth_failed),
        help(
            "Create a new access token under Preferences > Integrations in VRM.\n\
             Then run: vrmly config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(vrmly::no_credentials),
        help(
            "Configure a token with: vrmly config init\n\
             Or set the VRMLY_API_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("No installation selected for profile '{profile}'")]
    #[diagnostic(
        code(vrmly::no_installation),
        help(
            "Pass --installation <id> or set installation_id in the profile.\n\
             Run: vrmly installations to see available ids"
        )
    )]
    NoInstallation { profile: String },

    #[error("Unknown sensor '{key}'")]
    #[diagnostic(code(vrmly::unknown_sensor), help("Run: vrmly sensors to see valid keys"))]
    UnknownSensor { key: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Unexpected response from VRM: {message}")]
    #[diagnostic(code(vrmly::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vrmly::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid sensor definition '{sensor}': {reason}")]
    #[diagnostic(code(vrmly::invalid_sensor))]
    InvalidSensor { sensor: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vrmly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vrmly config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(vrmly::config))]
    Config { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::NoInstallation { .. }
            | Self::UnknownSensor { .. }
            | Self::Validation { .. }
            | Self::InvalidSensor { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<FetchError> for CliError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transient { message } => CliError::ConnectionFailed { message },
            FetchError::Unauthorized { .. } => CliError::AuthFailed {
                profile: "current".into(),
            },
            FetchError::Protocol { message } => CliError::ApiError { message },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Fetch(fetch) => fetch.into(),
            CoreError::UnknownSensor { key } => CliError::UnknownSensor { key },
            CoreError::InvalidSensor { sensor, reason } => {
                CliError::InvalidSensor { sensor, reason }
            }
            CoreError::InvalidConfig { field, reason } => CliError::Validation { field, reason },
            CoreError::Client { message } => CliError::TlsError { message },
            CoreError::AlreadyRunning => CliError::Config {
                message: "poller already running".into(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: vrmly config profiles)".into(),
            },
            ConfigError::Engine(core) => core.into(),
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(io) => CliError::Io(io),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_auth_exit_code() {
        let err: CliError = CoreError::Fetch(FetchError::Unauthorized {
            message: "401".into(),
        })
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn transient_maps_to_connection_exit_code() {
        let err: CliError = FetchError::Transient {
            message: "timed out".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn configuration_errors_are_usage_errors() {
        let err: CliError = CoreError::UnknownSensor {
            key: "wind".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
