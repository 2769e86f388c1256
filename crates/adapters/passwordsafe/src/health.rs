//! Connectivity check for Password Safe

use pwsafe_config::AdapterSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{handshake, sign_out_quietly};
use crate::client::PasswordSafeApi;
use crate::credentials::ResolvedCredentials;

/// Connectivity check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    /// Whether the API answered at all
    pub accessible: bool,

    /// Whether the handshake completed
    pub authenticated: bool,

    /// Handshake time in milliseconds
    pub response_time_ms: Option<u64>,

    /// Error message if the check failed
    pub error: Option<String>,
}

impl ConnectivityStatus {
    pub fn healthy() -> Self {
        Self {
            accessible: true,
            authenticated: true,
            response_time_ms: None,
            error: None,
        }
    }

    pub fn unhealthy(error: String) -> Self {
        Self {
            accessible: false,
            authenticated: false,
            response_time_ms: None,
            error: Some(error),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.accessible && self.authenticated
    }
}

/// Authenticate once, without retries, then sign out
pub async fn check_connectivity(
    credentials: &ResolvedCredentials,
    settings: &AdapterSettings,
) -> ConnectivityStatus {
    debug!(api_url = %credentials.api_url, "Performing Password Safe connectivity check");

    let api = match PasswordSafeApi::new(credentials, settings) {
        Ok(api) => api,
        Err(e) => return ConnectivityStatus::unhealthy(e.to_string()),
    };

    let start = std::time::Instant::now();
    match handshake(&api, credentials).await {
        Ok(session) => {
            let response_time_ms = start.elapsed().as_millis() as u64;
            debug!("Password Safe connectivity check passed in {}ms", response_time_ms);
            sign_out_quietly(&api, &session).await;

            ConnectivityStatus {
                response_time_ms: Some(response_time_ms),
                ..ConnectivityStatus::healthy()
            }
        }
        Err(e) => {
            warn!("Password Safe connectivity check failed: {}", e);
            ConnectivityStatus {
                // an HTTP status means the server answered
                accessible: e.upstream_status().is_some(),
                ..ConnectivityStatus::unhealthy(e.to_string())
            }
        }
    }
}
