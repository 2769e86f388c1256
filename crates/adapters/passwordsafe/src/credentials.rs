//! Resolution of value-or-reference credential fields
//!
//! A field is either a literal value or a reference to one key of a secret
//! held in the external key-value store. References are looked up exactly
//! once, while the client is being constructed; lookup failures are not
//! retried.

use std::fmt;

use pwsafe_config::{PasswordSafeProviderSpec, SecretValueDescriptor};
use pwsafe_errors::{ProviderError, ProviderResult};
use pwsafe_ports::SecretReader;
use secrecy::{ExposeSecret, Secret};
use tracing::debug;
use url::Url;

use crate::validation::parse_api_url;

pub const FIELD_CLIENT_ID: &str = "clientId";
pub const FIELD_CLIENT_SECRET: &str = "clientSecret";
pub const FIELD_CERTIFICATE: &str = "certificate";
pub const FIELD_CERTIFICATE_KEY: &str = "certificateKey";

/// Credentials and endpoint of one store, resolved at client construction
pub struct ResolvedCredentials {
    pub api_url: Url,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// PEM certificate, empty when mutual TLS is not used
    pub certificate: String,
    pub certificate_key: Secret<String>,
    /// Declared retrieval type, parsed per request
    pub retrieval_type: String,
}

impl ResolvedCredentials {
    /// Resolve every credential field of `spec`.
    ///
    /// References without a namespace are looked up in `default_namespace`.
    pub async fn resolve(
        spec: &PasswordSafeProviderSpec,
        reader: &dyn SecretReader,
        default_namespace: &str,
    ) -> ProviderResult<Self> {
        let api_url = parse_api_url(&spec.api_url)?;

        let client_id =
            resolve_required(spec.client_id.as_ref(), FIELD_CLIENT_ID, reader, default_namespace)
                .await?;
        let client_secret = resolve_required(
            spec.client_secret.as_ref(),
            FIELD_CLIENT_SECRET,
            reader,
            default_namespace,
        )
        .await?;
        let certificate = resolve_optional(
            spec.certificate.as_ref(),
            FIELD_CERTIFICATE,
            reader,
            default_namespace,
        )
        .await?;
        let certificate_key = resolve_optional(
            spec.certificate_key.as_ref(),
            FIELD_CERTIFICATE_KEY,
            reader,
            default_namespace,
        )
        .await?;

        Ok(Self {
            api_url,
            client_id,
            client_secret: Secret::new(client_secret),
            certificate,
            certificate_key: Secret::new(certificate_key),
            retrieval_type: spec.retrieval_type.clone(),
        })
    }

    pub fn uses_client_certificate(&self) -> bool {
        !self.certificate.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(api_url: &str) -> Self {
        Self {
            api_url: Url::parse(api_url).unwrap(),
            client_id: "abc".to_string(),
            client_secret: Secret::new("xyz".to_string()),
            certificate: String::new(),
            certificate_key: Secret::new(String::new()),
            retrieval_type: "SECRET".to_string(),
        }
    }
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("api_url", &self.api_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("certificate", &self.uses_client_certificate())
            .field(
                "certificate_key",
                &(!self.certificate_key.expose_secret().is_empty()),
            )
            .field("retrieval_type", &self.retrieval_type)
            .finish()
    }
}

/// Check the value/reference invariants of a descriptor
pub fn validate_descriptor(descriptor: &SecretValueDescriptor, field: &str) -> ProviderResult<()> {
    match &descriptor.secret_ref {
        Some(selector) => {
            if !descriptor.value.is_empty() {
                return Err(ProviderError::ConflictingCredentialSource {
                    field: field.to_string(),
                });
            }
            if selector.name.is_empty() {
                return Err(ProviderError::MissingSecretName {
                    field: field.to_string(),
                });
            }
            if selector.key.is_empty() {
                return Err(ProviderError::MissingSecretKey {
                    field: field.to_string(),
                });
            }
            Ok(())
        }
        None if descriptor.value.is_empty() => Err(ProviderError::MissingSource {
            field: field.to_string(),
        }),
        None => Ok(()),
    }
}

/// Turn a descriptor into its concrete value
pub async fn resolve_descriptor(
    descriptor: &SecretValueDescriptor,
    field: &str,
    reader: &dyn SecretReader,
    default_namespace: &str,
) -> ProviderResult<String> {
    validate_descriptor(descriptor, field)?;

    let Some(selector) = &descriptor.secret_ref else {
        return Ok(descriptor.value.clone());
    };

    let namespace = selector.namespace.as_deref().unwrap_or(default_namespace);
    debug!(
        field,
        namespace,
        secret = %selector.name,
        key = %selector.key,
        "Resolving credential reference"
    );

    let data = reader
        .get_secret(namespace, &selector.name)
        .await
        .map_err(|e| ProviderError::StoreLookupFailed {
            field: field.to_string(),
            namespace: namespace.to_string(),
            name: selector.name.clone(),
            message: e.to_string(),
        })?;

    let value = data
        .get(&selector.key)
        .ok_or_else(|| ProviderError::NoSuchKey {
            field: field.to_string(),
            key: selector.key.clone(),
        })?;

    String::from_utf8(value.clone()).map_err(|_| ProviderError::InvalidCredentialEncoding {
        field: field.to_string(),
        key: selector.key.clone(),
    })
}

async fn resolve_required(
    descriptor: Option<&SecretValueDescriptor>,
    field: &str,
    reader: &dyn SecretReader,
    default_namespace: &str,
) -> ProviderResult<String> {
    match descriptor {
        Some(descriptor) => resolve_descriptor(descriptor, field, reader, default_namespace).await,
        None => Err(ProviderError::MissingSource {
            field: field.to_string(),
        }),
    }
}

async fn resolve_optional(
    descriptor: Option<&SecretValueDescriptor>,
    field: &str,
    reader: &dyn SecretReader,
    default_namespace: &str,
) -> ProviderResult<String> {
    match descriptor {
        Some(descriptor) => resolve_descriptor(descriptor, field, reader, default_namespace).await,
        None => Ok(String::new()),
    }
}
