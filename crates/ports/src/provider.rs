//! Provider and client contracts the host drives

use std::collections::HashMap;

use async_trait::async_trait;
use pwsafe_config::SecretStore;
use pwsafe_errors::ProviderResult;

use crate::SecretReader;

/// Non-fatal remarks produced while validating a store
pub type Warnings = Vec<String>;

/// What a provider's clients can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capabilities {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Capabilities {
    pub fn can_read(&self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Outcome of a client connectivity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Ready,
    Unknown,
    Error,
}

/// Reference to one remote secret to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub key: String,
}

impl RemoteRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Criteria for enumerating remote secrets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretFind {
    pub path: Option<String>,
    pub name_regexp: Option<String>,
}

/// Destination of a pushed secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSecretRemoteRef {
    pub remote_key: String,
}

/// A value to write to the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSecretData {
    pub remote_ref: PushSecretRemoteRef,
    pub value: Vec<u8>,
}

/// Per-store client produced by [`Provider::new_client`]
#[async_trait]
pub trait SecretsClient: std::fmt::Debug + Send + Sync {
    /// Fetch one secret value
    async fn get_secret(&self, remote_ref: &RemoteRef) -> ProviderResult<Vec<u8>>;

    /// Fetch a secret and split it into key/value pairs
    async fn get_secret_map(
        &self,
        remote_ref: &RemoteRef,
    ) -> ProviderResult<HashMap<String, Vec<u8>>>;

    /// Enumerate every secret matching `find`
    async fn get_all_secrets(&self, find: &SecretFind)
    -> ProviderResult<HashMap<String, Vec<u8>>>;

    async fn push_secret(&self, data: &PushSecretData) -> ProviderResult<()>;

    async fn delete_secret(&self, remote_ref: &PushSecretRemoteRef) -> ProviderResult<()>;

    async fn secret_exists(&self, remote_ref: &PushSecretRemoteRef) -> ProviderResult<bool>;

    /// Check that the client can reach and authenticate against its backend
    async fn validate(&self) -> ProviderResult<ValidationResult>;

    /// Release the client; calling it again is a no-op
    async fn close(&self) -> ProviderResult<()>;
}

/// A secret-store provider
#[async_trait]
pub trait Provider: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Structural validation of a store declaration; never touches the network.
    /// `None` stands for a store the host failed to load.
    fn validate_store(&self, store: Option<&SecretStore>) -> ProviderResult<Warnings>;

    /// Build a client for `store`, resolving credentials through `reader`.
    /// References without a namespace resolve in `namespace`.
    async fn new_client(
        &self,
        store: &SecretStore,
        reader: &dyn SecretReader,
        namespace: &str,
    ) -> ProviderResult<Box<dyn SecretsClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        assert!(Capabilities::ReadOnly.can_read());
        assert!(!Capabilities::ReadOnly.can_write());
        assert!(Capabilities::ReadWrite.can_write());
        assert!(!Capabilities::WriteOnly.can_read());
    }
}
