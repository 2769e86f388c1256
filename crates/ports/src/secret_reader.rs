//! Access to the external key-value store holding indirected credentials

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretReaderError {
    #[error("secret {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the external key-value store
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Fetch every key of the secret `name` in `namespace`
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, Vec<u8>>, SecretReaderError>;
}
