//! pwsafe-errors - error taxonomy for the Password Safe provider
//!
//! Every failure the provider can surface is a [`ProviderError`]. Errors are
//! grouped into an [`ErrorCategory`] that decides how the host treats them:
//! configuration and credential errors are fatal, authentication errors are
//! the only class retried automatically, retrieval errors surface as-is.

use thiserror::Error;

/// Coarse classification of a [`ProviderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Store declaration or adapter settings are malformed
    Configuration,
    /// A value-or-reference credential could not be resolved
    CredentialResolution,
    /// Token acquisition against the vault failed
    Authentication,
    /// Fetching the secret itself failed
    Retrieval,
    /// The caller used the client in a way it does not support
    Usage,
}

/// Provider error type
#[derive(Debug, Error)]
pub enum ProviderError {
    // ---- configuration ----
    #[error("nil store found")]
    NilStore,

    #[error("store is missing spec")]
    MissingSpec,

    #[error("store spec is missing provider")]
    MissingProvider,

    #[error("invalid provider spec: missing passwordsafe block in store {store}")]
    MissingProviderBlock { store: String },

    #[error("invalid host URL {url:?}: {reason}")]
    InvalidHostUrl { url: String, reason: String },

    #[error("invalid adapter settings: {0}")]
    InvalidSettings(String),

    // ---- credential resolution ----
    #[error("{field}: cannot specify both secret reference and value")]
    ConflictingCredentialSource { field: String },

    #[error("{field}: must specify either secret reference or direct value")]
    MissingSource { field: String },

    #[error("{field}: must specify a secret name")]
    MissingSecretName { field: String },

    #[error("{field}: must specify a secret key")]
    MissingSecretKey { field: String },

    #[error("{field}: failed to read secret {namespace}/{name}: {message}")]
    StoreLookupFailed {
        field: String,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("{field}: no such key in secret: {key:?}")]
    NoSuchKey { field: String, key: String },

    #[error("{field}: value of key {key:?} is not valid UTF-8")]
    InvalidCredentialEncoding { field: String, key: String },

    // ---- authentication ----
    #[error("authentication failed{}: {message}", status_suffix(.status))]
    Authentication { status: Option<u16>, message: String },

    #[error("authentication retries exhausted after {attempts} attempt(s): {source}")]
    AuthenticationExhausted {
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },

    // ---- retrieval ----
    #[error("malformed secret key {key:?}: expected exactly two segments separated by {separator:?}")]
    MalformedKey { key: String, separator: String },

    #[error("unsupported retrieval type: {0:?}")]
    UnsupportedRetrievalType(String),

    #[error("secret not found: {0}")]
    SecretNotFound(String),

    #[error("secret {key} is {size} bytes, larger than the {limit} byte limit")]
    SecretTooLarge { key: String, size: usize, limit: usize },

    #[error("retrieval failed{}: {message}", status_suffix(.status))]
    Retrieval { status: Option<u16>, message: String },

    // ---- usage ----
    #[error("{0} not implemented")]
    NotImplemented(&'static str),

    #[error("secrets client is closed")]
    ClientClosed,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl ProviderError {
    pub fn missing_provider_block(store: impl Into<String>) -> Self {
        Self::MissingProviderBlock {
            store: store.into(),
        }
    }

    pub fn invalid_host_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHostUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_settings(msg: impl Into<String>) -> Self {
        Self::InvalidSettings(msg.into())
    }

    pub fn authentication(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Authentication {
            status,
            message: msg.into(),
        }
    }

    pub fn retrieval(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Retrieval {
            status,
            message: msg.into(),
        }
    }

    pub fn secret_not_found(msg: impl Into<String>) -> Self {
        Self::SecretNotFound(msg.into())
    }

    pub fn unsupported_retrieval_type(value: impl Into<String>) -> Self {
        Self::UnsupportedRetrievalType(value.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NilStore
            | Self::MissingSpec
            | Self::MissingProvider
            | Self::MissingProviderBlock { .. }
            | Self::InvalidHostUrl { .. }
            | Self::InvalidSettings(_) => ErrorCategory::Configuration,
            Self::ConflictingCredentialSource { .. }
            | Self::MissingSource { .. }
            | Self::MissingSecretName { .. }
            | Self::MissingSecretKey { .. }
            | Self::StoreLookupFailed { .. }
            | Self::NoSuchKey { .. }
            | Self::InvalidCredentialEncoding { .. } => ErrorCategory::CredentialResolution,
            Self::Authentication { .. } | Self::AuthenticationExhausted { .. } => {
                ErrorCategory::Authentication
            }
            Self::MalformedKey { .. }
            | Self::UnsupportedRetrievalType(_)
            | Self::SecretNotFound(_)
            | Self::SecretTooLarge { .. }
            | Self::Retrieval { .. } => ErrorCategory::Retrieval,
            Self::NotImplemented(_) | Self::ClientClosed => ErrorCategory::Usage,
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Transport failures (no status), 408, 429 and 5xx are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Authentication { status, .. } | Self::Retrieval { status, .. } => match status {
                None => true,
                Some(s) => *s == 408 || *s == 429 || (500..=599).contains(s),
            },
            _ => false,
        }
    }

    /// Status the vault answered with, if the failure came from an HTTP response
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Retrieval { status, .. } => *status,
            Self::AuthenticationExhausted { source, .. } => source.upstream_status(),
            _ => None,
        }
    }

    /// HTTP status code a host should report this error with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NilStore
            | Self::MissingSpec
            | Self::MissingProvider
            | Self::MissingProviderBlock { .. }
            | Self::InvalidHostUrl { .. }
            | Self::InvalidSettings(_)
            | Self::ConflictingCredentialSource { .. }
            | Self::MissingSource { .. }
            | Self::MissingSecretName { .. }
            | Self::MissingSecretKey { .. }
            | Self::InvalidCredentialEncoding { .. }
            | Self::MalformedKey { .. }
            | Self::UnsupportedRetrievalType(_) => 400,
            Self::NoSuchKey { .. } | Self::SecretNotFound(_) => 404,
            Self::StoreLookupFailed { .. } => 502,
            Self::Authentication { .. } => 401,
            Self::AuthenticationExhausted { .. } => 503,
            Self::SecretTooLarge { .. } => 413,
            Self::Retrieval { .. } => 502,
            Self::NotImplemented(_) => 501,
            Self::ClientClosed => 409,
        }
    }
}

/// Result type alias
pub type ProviderResult<T> = Result<T, ProviderError>;
