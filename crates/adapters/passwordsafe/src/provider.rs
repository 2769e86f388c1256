//! Provider facade the host framework drives

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pwsafe_config::{AdapterSettings, SecretStore};
use pwsafe_errors::{ProviderError, ProviderResult};
use pwsafe_ports::{
    Capabilities, Provider, ProviderRegistry, PushSecretData, PushSecretRemoteRef, RemoteRef,
    SecretFind, SecretReader, SecretsClient, ValidationResult, Warnings,
};
use tracing::{debug, info, warn};

use crate::auth::{authenticate, sign_out_quietly};
use crate::client::{PasswordSafeApi, client_identity};
use crate::credentials::ResolvedCredentials;
use crate::dispatch::RetrievalPlan;
use crate::health::check_connectivity;
use crate::validation;

/// Name of the store provider block this provider serves
pub const PROVIDER_NAME: &str = "passwordsafe";

/// Password Safe secret-store provider
#[derive(Debug, Clone, Default)]
pub struct PasswordSafeProvider {
    settings: Arc<AdapterSettings>,
}

impl PasswordSafeProvider {
    pub fn new(settings: AdapterSettings) -> ProviderResult<Self> {
        settings
            .validate()
            .map_err(|e| ProviderError::invalid_settings(e.to_string()))?;
        Ok(Self {
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }
}

#[async_trait]
impl Provider for PasswordSafeProvider {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ReadOnly
    }

    fn validate_store(&self, store: Option<&SecretStore>) -> ProviderResult<Warnings> {
        let (_, warnings) = validation::validate_store(store)?;
        for warning in &warnings {
            warn!(warning = %warning, "Store validation warning");
        }
        Ok(warnings)
    }

    async fn new_client(
        &self,
        store: &SecretStore,
        reader: &dyn SecretReader,
        namespace: &str,
    ) -> ProviderResult<Box<dyn SecretsClient>> {
        let (spec, _) = validation::validate_store(Some(store))?;
        let credentials = ResolvedCredentials::resolve(spec, reader, namespace).await?;
        // reject a half-configured or unreadable client certificate up front
        client_identity(&credentials)?;

        info!(
            store = %store.metadata,
            api_url = %credentials.api_url,
            retrieval_type = %credentials.retrieval_type,
            mtls = credentials.uses_client_certificate(),
            "Password Safe client constructed"
        );

        Ok(Box::new(PasswordSafeClient {
            store: store.metadata.to_string(),
            credentials,
            settings: Arc::clone(&self.settings),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Read-only client bound to one store's resolved credentials
pub struct PasswordSafeClient {
    store: String,
    credentials: ResolvedCredentials,
    settings: Arc<AdapterSettings>,
    closed: AtomicBool,
}

impl PasswordSafeClient {
    fn ensure_open(&self) -> ProviderResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ProviderError::ClientClosed);
        }
        Ok(())
    }

    /// Authenticate and fetch the secret at `key`.
    ///
    /// The key and retrieval type are checked before any request is sent.
    /// Each call builds its own HTTP client and session.
    pub async fn fetch_secret(&self, key: &str) -> ProviderResult<Vec<u8>> {
        self.ensure_open()?;
        let plan = RetrievalPlan::new(key, &self.credentials.retrieval_type, &self.settings)?;

        let api = PasswordSafeApi::new(&self.credentials, &self.settings)?;
        let session = authenticate(&api, &self.credentials, &self.settings.retry).await?;

        let result = plan.execute(&api, &session).await;
        sign_out_quietly(&api, &session).await;

        match &result {
            Ok(value) => debug!(store = %self.store, key, size = value.len(), "Secret retrieved"),
            Err(e) => warn!(store = %self.store, key, error = %e, "Secret retrieval failed"),
        }
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PasswordSafeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordSafeClient")
            .field("store", &self.store)
            .field("credentials", &self.credentials)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl SecretsClient for PasswordSafeClient {
    async fn get_secret(&self, remote_ref: &RemoteRef) -> ProviderResult<Vec<u8>> {
        self.fetch_secret(&remote_ref.key).await
    }

    async fn get_secret_map(
        &self,
        _remote_ref: &RemoteRef,
    ) -> ProviderResult<HashMap<String, Vec<u8>>> {
        Err(ProviderError::NotImplemented("get secret map"))
    }

    async fn get_all_secrets(
        &self,
        _find: &SecretFind,
    ) -> ProviderResult<HashMap<String, Vec<u8>>> {
        Err(ProviderError::NotImplemented("get all secrets"))
    }

    async fn push_secret(&self, _data: &PushSecretData) -> ProviderResult<()> {
        Err(ProviderError::NotImplemented("push secret"))
    }

    async fn delete_secret(&self, _remote_ref: &PushSecretRemoteRef) -> ProviderResult<()> {
        Err(ProviderError::NotImplemented("delete secret"))
    }

    async fn secret_exists(&self, _remote_ref: &PushSecretRemoteRef) -> ProviderResult<bool> {
        Err(ProviderError::NotImplemented("secret exists"))
    }

    async fn validate(&self) -> ProviderResult<ValidationResult> {
        self.ensure_open()?;
        let status = check_connectivity(&self.credentials, &self.settings).await;
        if status.is_healthy() {
            Ok(ValidationResult::Ready)
        } else {
            Ok(ValidationResult::Error)
        }
    }

    async fn close(&self) -> ProviderResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(store = %self.store, "Password Safe client closed");
        }
        Ok(())
    }
}

/// Register the Password Safe provider under [`PROVIDER_NAME`]
pub fn register(registry: &mut ProviderRegistry, settings: AdapterSettings) -> ProviderResult<()> {
    let provider = PasswordSafeProvider::new(settings)?;
    registry
        .register(PROVIDER_NAME, Arc::new(provider))
        .map_err(|e| ProviderError::invalid_settings(e.to_string()))?;
    info!(provider = PROVIDER_NAME, "Registered secret-store provider");
    Ok(())
}
