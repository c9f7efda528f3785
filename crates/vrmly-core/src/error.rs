// ── Core error types ──
//
// `FetchError` is the three-way classification every poll cycle ends in.
// `CoreError` covers everything that stops the engine from starting.
// Neither exposes raw HTTP details; the `From<vrmly_api::Error>` impls do
// the translation.

use thiserror::Error;

/// Why one fetch failed. Decides what the coordinator does next.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network trouble, timeout, 5xx or rate limiting. Retried on schedule.
    #[error("Transient failure: {message}")]
    Transient { message: String },

    /// Token rejected. Never retried until a new token is supplied.
    #[error("Access token rejected: {message}")]
    Unauthorized { message: String },

    /// VRM answered, but not in the expected shape.
    #[error("Unexpected VRM response: {message}")]
    Protocol { message: String },
}

impl FetchError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Counted towards the consecutive-failure threshold.
    pub fn counts_as_transient(&self) -> bool {
        !self.is_unauthorized()
    }
}

impl From<vrmly_api::Error> for FetchError {
    fn from(err: vrmly_api::Error) -> Self {
        if err.is_auth_expired() {
            return Self::Unauthorized {
                message: err.to_string(),
            };
        }
        if err.is_transient() {
            return Self::Transient {
                message: err.to_string(),
            };
        }
        match err {
            // Only raised while building a client; retrying may succeed
            // once the certificate file is back.
            vrmly_api::Error::Tls(_) => Self::Transient {
                message: err.to_string(),
            },
            other => Self::Protocol {
                message: other.to_string(),
            },
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Invalid sensor definition '{sensor}': {reason}")]
    InvalidSensor { sensor: String, reason: String },

    #[error("Unknown sensor '{key}'")]
    UnknownSensor { key: String },

    #[error("Invalid {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ── Runtime errors ───────────────────────────────────────────────
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Cannot build VRM client: {message}")]
    Client { message: String },

    #[error("Poller is already running")]
    AlreadyRunning,
}

impl CoreError {
    /// `true` for errors caused by bad configuration rather than VRM.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidSensor { .. } | Self::UnknownSensor { .. } | Self::InvalidConfig { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vrmly_api::Error> for CoreError {
    fn from(err: vrmly_api::Error) -> Self {
        match err {
            vrmly_api::Error::Tls(_) | vrmly_api::Error::InvalidUrl(_) => Self::Client {
                message: err.to_string(),
            },
            other => Self::Fetch(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_unauthorized() {
        let err = vrmly_api::Error::Authentication {
            status: Some(401),
            message: "bad token".into(),
        };
        assert!(FetchError::from(err).is_unauthorized());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = vrmly_api::Error::Api {
            status: 503,
            message: "maintenance".into(),
        };
        assert!(matches!(FetchError::from(err), FetchError::Transient { .. }));

        let err = vrmly_api::Error::Timeout { timeout_secs: 30 };
        assert!(matches!(FetchError::from(err), FetchError::Transient { .. }));
    }

    #[test]
    fn shape_mismatch_is_protocol() {
        let err = vrmly_api::Error::Deserialization {
            message: "invalid type".into(),
            body: "{}".into(),
        };
        let fetch = FetchError::from(err);
        assert!(matches!(fetch, FetchError::Protocol { .. }));
        assert!(fetch.counts_as_transient());

        let err = vrmly_api::Error::Api {
            status: 404,
            message: "no such installation".into(),
        };
        assert!(matches!(FetchError::from(err), FetchError::Protocol { .. }));
    }

    #[test]
    fn configuration_errors_are_flagged() {
        assert!(CoreError::UnknownSensor { key: "x".into() }.is_configuration());
        assert!(!CoreError::AlreadyRunning.is_configuration());
    }
}
