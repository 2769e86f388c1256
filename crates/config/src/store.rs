//! Declared secret-store resources
//!
//! These mirror the store objects the orchestration host hands to a
//! provider. Every level is optional so that validation can report exactly
//! which part of a declaration is missing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Object metadata of a declared store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl fmt::Display for ObjectMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A declared secret store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretStore {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Option<SecretStoreSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretStoreSpec {
    #[serde(default)]
    pub provider: Option<ProviderSpec>,
}

/// Provider selection block; only the Password Safe provider lives here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    #[serde(default, alias = "beyondtrust")]
    pub passwordsafe: Option<PasswordSafeProviderSpec>,
}

/// Password Safe provider declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSafeProviderSpec {
    /// Base URL of the Password Safe public API, e.g. `https://host/BeyondTrust/api/public/v3/`
    #[serde(alias = "apiurl")]
    pub api_url: String,

    #[serde(default, alias = "clientid")]
    pub client_id: Option<SecretValueDescriptor>,

    #[serde(default, alias = "clientsecret")]
    pub client_secret: Option<SecretValueDescriptor>,

    /// PEM client certificate for mutual TLS
    #[serde(default)]
    pub certificate: Option<SecretValueDescriptor>,

    /// PEM private key matching `certificate`
    #[serde(default, alias = "certificatekey")]
    pub certificate_key: Option<SecretValueDescriptor>,

    /// `SECRET` or `MANAGED_ACCOUNT`; kept verbatim and parsed per request
    #[serde(default, alias = "retrievaltype")]
    pub retrieval_type: String,
}

/// Value-or-reference credential field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretValueDescriptor {
    /// Literal value, used when no reference is set
    #[serde(default)]
    pub value: String,

    /// Reference to a key inside an externally stored secret
    #[serde(default)]
    pub secret_ref: Option<SecretKeySelector>,
}

impl SecretValueDescriptor {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret_ref: None,
        }
    }

    pub fn reference(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            value: String::new(),
            secret_ref: Some(SecretKeySelector {
                name: name.into(),
                key: key.into(),
                namespace: None,
            }),
        }
    }
}

/// Points at one key of one externally stored secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// How a key is looked up in the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetrievalType {
    /// Secrets Safe secret addressed as `folder/title`
    Secret,
    /// Managed account credential addressed as `system/account`
    ManagedAccount,
}

impl RetrievalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "SECRET",
            Self::ManagedAccount => "MANAGED_ACCOUNT",
        }
    }
}

impl fmt::Display for RetrievalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a declared retrieval type is not one of the known values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRetrievalType(pub String);

impl fmt::Display for UnknownRetrievalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown retrieval type {:?}", self.0)
    }
}

impl std::error::Error for UnknownRetrievalType {}

impl FromStr for RetrievalType {
    type Err = UnknownRetrievalType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SECRET" => Ok(Self::Secret),
            "MANAGED_ACCOUNT" => Ok(Self::ManagedAccount),
            _ => Err(UnknownRetrievalType(s.to_string())),
        }
    }
}
