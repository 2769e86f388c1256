//! Authentication against the Password Safe API
//!
//! The handshake is two calls: an OAuth client-credentials token request,
//! then `Auth/SignAppIn` with the issued bearer token. The whole handshake
//! runs under [`ExponentialBackoff`]. Sessions are never cached; every
//! retrieval authenticates again.

use std::fmt;

use chrono::{DateTime, Utc};
use pwsafe_config::RetrySettings;
use pwsafe_errors::{ProviderError, ProviderResult};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::backoff::{ExponentialBackoff, RetryError, retry};
use crate::client::{PasswordSafeApi, send};
use crate::credentials::ResolvedCredentials;
use crate::error::{Phase, map_transport_error};

const TOKEN_PATH: &str = "Auth/connect/token";
const SIGN_APP_IN_PATH: &str = "Auth/SignAppIn";
const SIGN_OUT_PATH: &str = "Auth/Signout";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    scope: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignAppInResponse {
    #[serde(default)]
    user_id: Option<u64>,
    #[serde(default)]
    user_name: Option<String>,
}

/// An authenticated API session, valid for a single retrieval
pub struct AuthSession {
    access_token: Secret<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: String,
}

impl AuthSession {
    pub(crate) fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Authenticate, retrying the handshake under the configured backoff.
///
/// When `policy.retry_client_errors` is off, failures that are not
/// transient end the loop right away with the underlying error.
pub async fn authenticate(
    api: &PasswordSafeApi,
    credentials: &ResolvedCredentials,
    policy: &RetrySettings,
) -> ProviderResult<AuthSession> {
    let mut backoff = ExponentialBackoff::new(policy);
    let should_retry = |e: &ProviderError| policy.retry_client_errors || e.is_retryable();

    match retry(&mut backoff, "authenticate", should_retry, || {
        handshake(api, credentials)
    })
    .await
    {
        Ok(session) => Ok(session),
        Err(RetryError::Permanent(e)) => Err(e),
        Err(RetryError::Exhausted { last, attempts }) => Err(ProviderError::AuthenticationExhausted {
            attempts,
            source: Box::new(last),
        }),
    }
}

/// One attempt of the token + sign-in handshake
pub async fn handshake(
    api: &PasswordSafeApi,
    credentials: &ResolvedCredentials,
) -> ProviderResult<AuthSession> {
    let session = request_token(api, credentials).await?;
    sign_app_in(api, &session).await?;
    Ok(session)
}

async fn request_token(
    api: &PasswordSafeApi,
    credentials: &ResolvedCredentials,
) -> ProviderResult<AuthSession> {
    const CONTEXT: &str = "Requesting access token";

    debug!(client_id = %credentials.client_id, "Requesting access token");
    let form = [
        ("client_id", credentials.client_id.as_str()),
        ("client_secret", credentials.client_secret.expose_secret().as_str()),
        ("grant_type", "client_credentials"),
    ];
    let request = api.http().post(api.endpoint(TOKEN_PATH)?).form(&form);
    let response = send(request, Phase::Authentication, CONTEXT).await?;

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| map_transport_error(Phase::Authentication, e, CONTEXT))?;

    if token.access_token.is_empty() {
        return Err(ProviderError::authentication(
            None,
            format!("{}: response carried no access token", CONTEXT),
        ));
    }

    let expires_at = chrono::Duration::try_seconds(token.expires_in)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    Ok(AuthSession {
        access_token: Secret::new(token.access_token),
        expires_at,
        token_type: token.token_type,
        scope: token.scope,
    })
}

async fn sign_app_in(api: &PasswordSafeApi, session: &AuthSession) -> ProviderResult<()> {
    const CONTEXT: &str = "Signing in application";

    let request = api
        .http()
        .post(api.endpoint(SIGN_APP_IN_PATH)?)
        .bearer_auth(session.access_token());
    let response = send(request, Phase::Authentication, CONTEXT).await?;

    // the user payload is informational; an unexpected body does not fail sign-in
    match response.json::<SignAppInResponse>().await {
        Ok(user) => info!(
            user_id = user.user_id,
            user_name = user.user_name.as_deref().unwrap_or_default(),
            "Signed in to Password Safe"
        ),
        Err(e) => debug!(error = %e, "Signed in to Password Safe; user payload not understood"),
    }
    Ok(())
}

/// End the API session
pub async fn sign_out(api: &PasswordSafeApi, session: &AuthSession) -> ProviderResult<()> {
    let request = api
        .http()
        .post(api.endpoint(SIGN_OUT_PATH)?)
        .bearer_auth(session.access_token());
    send(request, Phase::Authentication, "Signing out").await?;
    debug!("Signed out of Password Safe");
    Ok(())
}

/// Sign out, logging instead of returning a failure
pub(crate) async fn sign_out_quietly(api: &PasswordSafeApi, session: &AuthSession) {
    if let Err(e) = sign_out(api, session).await {
        warn!(error = %e, "Failed to sign out of Password Safe");
    }
}
