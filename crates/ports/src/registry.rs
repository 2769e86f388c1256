//! Explicit provider registry
//!
//! The host owns a [`ProviderRegistry`] and fills it at start-up by calling
//! each provider crate's `register` function.

use std::collections::BTreeMap;
use std::sync::Arc;

use pwsafe_config::SecretStore;
use thiserror::Error;

use crate::Provider;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("provider {0:?} is already registered")]
    AlreadyRegistered(String),
}

/// Registered providers, keyed by the name of their store provider block
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Provider whose block is set in the store's provider spec
    pub fn for_store(&self, store: &SecretStore) -> Option<Arc<dyn Provider>> {
        let provider = store.spec.as_ref()?.provider.as_ref()?;
        if provider.passwordsafe.is_some() {
            return self.get("passwordsafe");
        }
        None
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capabilities, SecretReader, SecretsClient, Warnings};
    use async_trait::async_trait;
    use pwsafe_config::{PasswordSafeProviderSpec, ProviderSpec, SecretStoreSpec};
    use pwsafe_errors::{ProviderError, ProviderResult};

    struct NoopProvider;

    #[async_trait]
    impl Provider for NoopProvider {
        fn capabilities(&self) -> Capabilities {
            Capabilities::ReadOnly
        }

        fn validate_store(&self, _store: Option<&SecretStore>) -> ProviderResult<Warnings> {
            Ok(Vec::new())
        }

        async fn new_client(
            &self,
            _store: &SecretStore,
            _reader: &dyn SecretReader,
            _namespace: &str,
        ) -> ProviderResult<Box<dyn SecretsClient>> {
            Err(ProviderError::NotImplemented("new client"))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        registry
            .register("passwordsafe", Arc::new(NoopProvider))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("passwordsafe").is_some());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["passwordsafe"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("passwordsafe", Arc::new(NoopProvider))
            .unwrap();
        let err = registry
            .register("passwordsafe", Arc::new(NoopProvider))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(name) if name == "passwordsafe"));
    }

    #[test]
    fn test_for_store_picks_provider_block() {
        let mut registry = ProviderRegistry::new();
        registry
            .register("passwordsafe", Arc::new(NoopProvider))
            .unwrap();

        let store = SecretStore {
            spec: Some(SecretStoreSpec {
                provider: Some(ProviderSpec {
                    passwordsafe: Some(PasswordSafeProviderSpec::default()),
                }),
            }),
            ..Default::default()
        };
        assert!(registry.for_store(&store).is_some());
        assert!(registry.for_store(&SecretStore::default()).is_none());
    }
}
