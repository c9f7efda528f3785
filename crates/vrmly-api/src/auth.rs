use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Production VRM API root.
pub const API_BASE_URL: &str = "https://vrmapi.victronenergy.com/v2";

/// [`API_BASE_URL`] as a parsed `Url`.
pub fn default_base_url() -> Url {
    Url::parse(API_BASE_URL).expect("API_BASE_URL is a valid URL")
}

/// Header carrying the access token on every request.
///
/// VRM accepts personal access tokens as `x-authorization: Token <token>`.
/// The standard `Authorization` header is reserved for login-issued JWTs,
/// which this client does not use.
pub const AUTH_HEADER: &str = "x-authorization";

/// Build the `x-authorization` header value for an access token.
///
/// The returned value is marked sensitive so it never shows up in
/// `Debug` output of the request.
pub(crate) fn token_header(token: &SecretString) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(&format!("Token {}", token.expose_secret()))
        .map_err(|_| Error::Authentication {
            status: None,
            message: "access token contains characters not allowed in a header".into(),
        })?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn header_uses_token_scheme() {
        let token = SecretString::from("abc123".to_string());
        let value = token_header(&token).unwrap();
        assert_eq!(value.to_str().unwrap(), "Token abc123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn header_rejects_control_characters() {
        let token = SecretString::from("abc\n123".to_string());
        assert!(matches!(
            token_header(&token),
            Err(Error::Authentication { .. })
        ));
    }
}
