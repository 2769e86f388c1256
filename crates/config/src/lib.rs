//! pwsafe-config - store declarations and adapter settings
//!
//! Store declarations ([`store`]) come from the orchestration host. Adapter
//! settings are process-wide tunables loaded from TOML files and
//! `PASSWORDSAFE_` environment variables.

pub mod store;

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use store::{
    ObjectMeta, PasswordSafeProviderSpec, ProviderSpec, RetrievalType, SecretKeySelector,
    SecretStore, SecretStoreSpec, SecretValueDescriptor, UnknownRetrievalType,
};

/// Largest file-backed secret the vault API serves
pub const MAX_FILE_SECRET_SIZE_BYTES: usize = 5_000_000;

/// Upper bound for the authentication retry window
pub const MAX_RETRY_ELAPSED_SECS: u64 = 15 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Backoff settings for the authentication handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// Jitter applied to every interval, as a fraction of it
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,
    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: u64,
    /// Keep retrying failures that look permanent (4xx rejections)
    #[serde(default = "default_retry_client_errors")]
    pub retry_client_errors: bool,
}

fn default_initial_interval_ms() -> u64 {
    1000
}

fn default_randomization_factor() -> f64 {
    0.5
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_interval_secs() -> u64 {
    60
}

fn default_max_elapsed_secs() -> u64 {
    MAX_RETRY_ELAPSED_SECS
}

fn default_retry_client_errors() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            randomization_factor: default_randomization_factor(),
            multiplier: default_multiplier(),
            max_interval_secs: default_max_interval_secs(),
            max_elapsed_secs: default_max_elapsed_secs(),
            retry_client_errors: default_retry_client_errors(),
        }
    }
}

impl RetrySettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_secs)
    }
}

/// Adapter-wide tunables shared by every store the provider serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSettings {
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,
    #[serde(default = "default_verify_ca")]
    pub verify_ca: bool,
    /// Separator between the two segments of a secret key
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_max_file_secret_size_bytes")]
    pub max_file_secret_size_bytes: usize,
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_client_timeout_secs() -> u64 {
    5
}

fn default_verify_ca() -> bool {
    true
}

fn default_separator() -> String {
    "/".to_string()
}

fn default_max_file_secret_size_bytes() -> usize {
    MAX_FILE_SECRET_SIZE_BYTES
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            client_timeout_secs: default_client_timeout_secs(),
            verify_ca: default_verify_ca(),
            separator: default_separator(),
            max_file_secret_size_bytes: default_max_file_secret_size_bytes(),
            retry: RetrySettings::default(),
        }
    }
}

impl AdapterSettings {
    /// Load settings from `{config_dir}/default.toml`, `{config_dir}/{APP_ENV}.toml`
    /// and `PASSWORDSAFE_*` environment variables, in that order of precedence.
    ///
    /// Nested keys use a double underscore, e.g. `PASSWORDSAFE_RETRY__MAX_ELAPSED_SECS`.
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let settings: Self = Self::figment()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("PASSWORDSAFE_").split("__"))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Base figment holding the built-in defaults
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=300).contains(&self.client_timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "client_timeout_secs must be between 1 and 300, got {}",
                self.client_timeout_secs
            )));
        }
        if self.separator.chars().count() != 1 {
            return Err(ConfigError::Invalid(format!(
                "separator must be a single character, got {:?}",
                self.separator
            )));
        }
        if !(1..=MAX_FILE_SECRET_SIZE_BYTES).contains(&self.max_file_secret_size_bytes) {
            return Err(ConfigError::Invalid(format!(
                "max_file_secret_size_bytes must be between 1 and {}, got {}",
                MAX_FILE_SECRET_SIZE_BYTES, self.max_file_secret_size_bytes
            )));
        }

        let retry = &self.retry;
        if !(0.0..=1.0).contains(&retry.randomization_factor) {
            return Err(ConfigError::Invalid(format!(
                "retry.randomization_factor must be within [0, 1], got {}",
                retry.randomization_factor
            )));
        }
        if !(retry.multiplier.is_finite() && retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be at least 1, got {}",
                retry.multiplier
            )));
        }
        if retry.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.initial_interval_ms must be positive".to_string(),
            ));
        }
        if !(1..=MAX_RETRY_ELAPSED_SECS).contains(&retry.max_elapsed_secs) {
            return Err(ConfigError::Invalid(format!(
                "retry.max_elapsed_secs must be between 1 and {}, got {}",
                MAX_RETRY_ELAPSED_SECS, retry.max_elapsed_secs
            )));
        }
        Ok(())
    }
}
