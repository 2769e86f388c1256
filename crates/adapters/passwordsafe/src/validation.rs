//! Structural validation of declared stores
//!
//! Runs when the host accepts a store and again before a client is built.
//! It never resolves credentials and never touches the network.

use pwsafe_config::{PasswordSafeProviderSpec, RetrievalType, SecretStore};
use pwsafe_errors::{ProviderError, ProviderResult};
use pwsafe_ports::Warnings;
use url::Url;

/// Validate a store declaration and return the provider block it carries
pub fn validate_store(store: Option<&SecretStore>) -> ProviderResult<(&PasswordSafeProviderSpec, Warnings)> {
    let store = store.ok_or(ProviderError::NilStore)?;
    let spec = store.spec.as_ref().ok_or(ProviderError::MissingSpec)?;
    let provider = spec.provider.as_ref().ok_or(ProviderError::MissingProvider)?;
    let passwordsafe = provider
        .passwordsafe
        .as_ref()
        .ok_or_else(|| ProviderError::missing_provider_block(store.metadata.to_string()))?;

    let url = parse_api_url(&passwordsafe.api_url)?;

    let mut warnings = Warnings::new();
    if url.scheme() != "https" {
        warnings.push(format!(
            "apiUrl {} does not use https; credentials will be sent in clear text",
            passwordsafe.api_url
        ));
    }
    if passwordsafe.retrieval_type.trim().is_empty() {
        warnings.push(
            "retrievalType is not set; every fetch will fail until it is SECRET or MANAGED_ACCOUNT"
                .to_string(),
        );
    } else if let Err(e) = passwordsafe.retrieval_type.parse::<RetrievalType>() {
        warnings.push(format!(
            "{e}; every fetch will fail until it is SECRET or MANAGED_ACCOUNT"
        ));
    }

    Ok((passwordsafe, warnings))
}

/// Parse the API base URL; it must be absolute and carry a host
pub(crate) fn parse_api_url(raw: &str) -> ProviderResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ProviderError::invalid_host_url(raw, e.to_string()))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ProviderError::invalid_host_url(raw, "missing host")),
    }
}
