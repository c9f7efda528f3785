use thiserror::Error;

/// Top-level error type for the `vrmly-api` crate.
///
/// Covers every failure mode of a VRM request: authentication, transport,
/// HTTP status, the `success: false` envelope, and payload shape.
/// `vrmly-core` classifies these into transient / unauthorized / protocol.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token rejected (HTTP 401/403) or unusable as a header value.
    #[error("Authentication failed: {message}")]
    Authentication { status: Option<u16>, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Rate limited by VRM. Includes retry-after in seconds when sent.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP status other than auth / rate limiting.
    #[error("VRM API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 200 with `{"success": false, "errors": ...}`.
    #[error("VRM rejected the request: {message}")]
    Rejected {
        message: String,
        code: Option<String>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON did not match the expected schema, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the token was rejected and must be replaced.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next scheduled cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => *status,
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Api {
            status: 503,
            message: "maintenance".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_auth_expired());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = Error::Api {
            status: 404,
            message: "no such installation".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn auth_errors_report_expiry() {
        let err = Error::Authentication {
            status: Some(401),
            message: "invalid token".into(),
        };
        assert!(err.is_auth_expired());
        assert!(!err.is_transient());
    }
}
