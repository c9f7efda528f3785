// VRM API HTTP client
//
// Wraps `reqwest::Client` with VRM URL construction, token header
// injection, and status / envelope classification. Endpoint methods live
// in sibling modules (`graph`, `installations`) as inherent methods so this
// module stays focused on transport mechanics.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{AUTH_HEADER, token_header};
use crate::error::Error;
use crate::models::ErrorEnvelope;
use crate::transport::TransportConfig;

const BODY_PREVIEW_CHARS: usize = 200;

/// Raw HTTP client for the VRM v2 API.
///
/// The access token can be swapped at any time with
/// [`set_token`](Self::set_token); the next request picks it up.
pub struct VrmClient {
    http: reqwest::Client,
    base_url: Url,
    token: ArcSwap<SecretString>,
    timeout: Duration,
}

impl VrmClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, normally [`API_BASE_URL`](crate::API_BASE_URL).
    pub fn new(
        base_url: Url,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token: ArcSwap::from_pointee(token),
            timeout: transport.timeout,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// The timeout is only used to label [`Error::Timeout`]; enforcement
    /// is whatever the supplied client was built with.
    pub fn with_client(http: reqwest::Client, base_url: Url, token: SecretString) -> Self {
        Self {
            http,
            base_url,
            token: ArcSwap::from_pointee(token),
            timeout: Duration::ZERO,
        }
    }

    /// The API root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Replace the access token. Takes effect on the next request.
    pub fn set_token(&self, token: SecretString) {
        debug!("access token replaced");
        self.token.store(Arc::new(token));
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL: `{base}/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET with query parameters and decode the body.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        debug!("GET {}", url);

        let header = token_header(&self.token.load())?;
        let resp = self
            .http
            .get(url)
            .header(AUTH_HEADER, header)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        self.parse_response(resp).await
    }

    fn classify_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }

    /// Map HTTP status and the `success: false` envelope to errors, then
    /// decode the body into `T`.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                status: Some(status.as_u16()),
                message: format!("access token rejected (HTTP {status})"),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(Error::RateLimited { retry_after_secs });
        }

        let body = resp.text().await.map_err(|e| self.classify_transport(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|env| env.message())
                .unwrap_or_else(|_| preview(&body));
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        // VRM reports some failures as HTTP 200 with `success: false`.
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            if !envelope.success {
                return Err(Error::Rejected {
                    message: envelope.message(),
                    code: envelope.error_code,
                });
            }
        }

        trace!(bytes = body.len(), "decoding response body");
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> VrmClient {
        VrmClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            SecretString::from("t".to_string()),
        )
    }

    #[test]
    fn api_url_joins_without_double_slash() {
        let c = client("https://vrmapi.victronenergy.com/v2/");
        let url = c.api_url("/installations/7/widgets/Graph").unwrap();
        assert_eq!(
            url.as_str(),
            "https://vrmapi.victronenergy.com/v2/installations/7/widgets/Graph"
        );
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let body = "é".repeat(500);
        assert_eq!(preview(&body).chars().count(), BODY_PREVIEW_CHARS);
    }
}
