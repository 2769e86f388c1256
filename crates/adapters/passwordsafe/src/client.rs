//! HTTP plumbing for the Password Safe public API

use pwsafe_config::AdapterSettings;
use pwsafe_errors::{ProviderError, ProviderResult};
use reqwest::{Client, Identity, Response};
use secrecy::ExposeSecret;
use tracing::debug;
use url::Url;

use crate::credentials::ResolvedCredentials;
use crate::error::{Phase, map_api_error, map_transport_error};

/// Password Safe API endpoint set bound to one HTTP client
#[derive(Debug, Clone)]
pub struct PasswordSafeApi {
    http: Client,
    base_url: Url,
}

impl PasswordSafeApi {
    /// Build a fresh HTTP client for `credentials` and bind it to their API URL
    pub fn new(credentials: &ResolvedCredentials, settings: &AdapterSettings) -> ProviderResult<Self> {
        let http = build_http_client(credentials, settings)?;
        Ok(Self::with_client(http, credentials.api_url.clone()))
    }

    pub fn with_client(http: Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Absolute URL of an API path relative to the base URL
    pub(crate) fn endpoint(&self, path: &str) -> ProviderResult<Url> {
        self.base_url.join(path).map_err(|e| {
            ProviderError::invalid_host_url(self.base_url.as_str(), format!("cannot join {path:?}: {e}"))
        })
    }
}

/// Keep the base path when joining relative endpoints onto it
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// Client identity for mutual TLS, if a certificate is configured
pub(crate) fn client_identity(credentials: &ResolvedCredentials) -> ProviderResult<Option<Identity>> {
    let certificate = credentials.certificate.trim();
    let key = credentials.certificate_key.expose_secret().trim();

    match (certificate.is_empty(), key.is_empty()) {
        (true, true) => Ok(None),
        (false, false) => {
            let pem = format!("{}\n{}\n", key, certificate);
            Identity::from_pem(pem.as_bytes())
                .map(Some)
                .map_err(|e| ProviderError::invalid_settings(format!("client certificate: {e}")))
        }
        (false, true) => Err(ProviderError::invalid_settings(
            "certificate is set but certificateKey is empty",
        )),
        (true, false) => Err(ProviderError::invalid_settings(
            "certificateKey is set but certificate is empty",
        )),
    }
}

/// Build the reqwest client used for one retrieval
pub fn build_http_client(
    credentials: &ResolvedCredentials,
    settings: &AdapterSettings,
) -> ProviderResult<Client> {
    let mut builder = Client::builder()
        .user_agent(concat!("adapter-passwordsafe/", env!("CARGO_PKG_VERSION")))
        .timeout(settings.client_timeout())
        .danger_accept_invalid_certs(!settings.verify_ca);

    if let Some(identity) = client_identity(credentials)? {
        debug!("Presenting client certificate for mutual TLS");
        builder = builder.identity(identity);
    }

    builder
        .build()
        .map_err(|e| ProviderError::invalid_settings(format!("failed to build HTTP client: {e}")))
}

/// Return the response if it succeeded, otherwise map its status and body
pub(crate) async fn ensure_success(
    response: Response,
    phase: Phase,
    context: &str,
) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_api_error(phase, status, &body, context))
}

/// Send a prepared request and check its status
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    phase: Phase,
    context: &str,
) -> ProviderResult<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| map_transport_error(phase, e, context))?;
    ensure_success(response, phase, context).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ResolvedCredentials;

    #[test]
    fn test_normalize_base_url_keeps_path() {
        let url = normalize_base_url(
            Url::parse("https://vault.example.com/BeyondTrust/api/public/v3?x=1").unwrap(),
        );
        assert_eq!(
            url.as_str(),
            "https://vault.example.com/BeyondTrust/api/public/v3/"
        );
        assert_eq!(
            url.join("Auth/connect/token").unwrap().as_str(),
            "https://vault.example.com/BeyondTrust/api/public/v3/Auth/connect/token"
        );
    }

    #[test]
    fn test_endpoint_on_bare_host() {
        let api = PasswordSafeApi::with_client(
            Client::new(),
            Url::parse("https://vault.example.com").unwrap(),
        );
        assert_eq!(
            api.endpoint("secrets-safe/secrets").unwrap().as_str(),
            "https://vault.example.com/secrets-safe/secrets"
        );
    }

    #[test]
    fn test_identity_requires_both_halves() {
        let mut credentials = ResolvedCredentials::for_tests("https://vault.example.com");
        assert!(client_identity(&credentials).unwrap().is_none());

        credentials.certificate = "-----BEGIN CERTIFICATE-----".to_string();
        let err = client_identity(&credentials).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSettings(_)));
    }

    #[test]
    fn test_build_http_client_without_certificate() {
        let credentials = ResolvedCredentials::for_tests("https://vault.example.com");
        assert!(build_http_client(&credentials, &AdapterSettings::default()).is_ok());
    }
}
