//! Managed account retrieval: a credential checked out through a request
//!
//! Lookup, request, read, then check-in. Check-in releases the request
//! before its duration runs out; a failed check-in is logged and the
//! credential is still returned.

use pwsafe_errors::{ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::AuthSession;
use crate::client::{PasswordSafeApi, send};
use crate::error::{Phase, map_transport_error};

const MANAGED_ACCOUNTS_PATH: &str = "ManagedAccounts";
const REQUESTS_PATH: &str = "Requests";
const CREDENTIALS_PATH: &str = "Credentials";

/// Minutes a credential request stays open
const REQUEST_DURATION_MINUTES: u32 = 5;
const REQUEST_REASON: &str = "secret-store provider retrieval";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManagedAccount {
    system_id: u64,
    account_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialRequest<'a> {
    #[serde(rename = "SystemID")]
    system_id: u64,
    #[serde(rename = "AccountID")]
    account_id: u64,
    duration_minutes: u32,
    reason: &'a str,
    conflict_option: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CheckIn<'a> {
    reason: &'a str,
}

/// Fetch the current credential of `account` on `system`
pub async fn get_credential(
    api: &PasswordSafeApi,
    session: &AuthSession,
    system: &str,
    account: &str,
    separator: &str,
) -> ProviderResult<Vec<u8>> {
    let context = format!("Managed account {}{}{}", system, separator, account);
    debug!(system, account, "Looking up managed account");

    let managed = find_account(api, session, system, account, &context).await?;
    let request_id = create_request(api, session, &managed, &context).await?;
    debug!(request_id = %request_id, "Credential request opened");

    let credential = read_credential(api, session, &request_id, &context).await;

    if let Err(e) = check_in(api, session, &request_id).await {
        warn!(request_id = %request_id, error = %e, "Failed to check in credential request");
    }

    credential
}

async fn find_account(
    api: &PasswordSafeApi,
    session: &AuthSession,
    system: &str,
    account: &str,
    context: &str,
) -> ProviderResult<ManagedAccount> {
    let request = api
        .http()
        .get(api.endpoint(MANAGED_ACCOUNTS_PATH)?)
        .bearer_auth(session.access_token())
        .query(&[("systemName", system), ("accountName", account)]);
    let response = send(request, Phase::Retrieval, context).await?;
    response
        .json()
        .await
        .map_err(|e| map_transport_error(Phase::Retrieval, e, context))
}

async fn create_request(
    api: &PasswordSafeApi,
    session: &AuthSession,
    managed: &ManagedAccount,
    context: &str,
) -> ProviderResult<String> {
    let body = CredentialRequest {
        system_id: managed.system_id,
        account_id: managed.account_id,
        duration_minutes: REQUEST_DURATION_MINUTES,
        reason: REQUEST_REASON,
        conflict_option: "reuse",
    };
    let request = api
        .http()
        .post(api.endpoint(REQUESTS_PATH)?)
        .bearer_auth(session.access_token())
        .json(&body);
    let response = send(request, Phase::Retrieval, context).await?;
    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(Phase::Retrieval, e, context))?;

    let id = text.trim().trim_matches('"');
    if id.is_empty() {
        return Err(ProviderError::retrieval(
            None,
            format!("{}: request response carried no id", context),
        ));
    }
    Ok(id.to_string())
}

async fn read_credential(
    api: &PasswordSafeApi,
    session: &AuthSession,
    request_id: &str,
    context: &str,
) -> ProviderResult<Vec<u8>> {
    let request = api
        .http()
        .get(api.endpoint(&format!("{}/{}", CREDENTIALS_PATH, request_id))?)
        .bearer_auth(session.access_token());
    let response = send(request, Phase::Retrieval, context).await?;
    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(Phase::Retrieval, e, context))?;

    // the credential arrives as a JSON string literal
    let credential = serde_json::from_str::<String>(&text).unwrap_or(text);
    Ok(credential.into_bytes())
}

async fn check_in(
    api: &PasswordSafeApi,
    session: &AuthSession,
    request_id: &str,
) -> ProviderResult<()> {
    let request = api
        .http()
        .put(api.endpoint(&format!("{}/{}/checkin", REQUESTS_PATH, request_id))?)
        .bearer_auth(session.access_token())
        .json(&CheckIn { reason: "" });
    send(request, Phase::Retrieval, "Checking in credential request").await?;
    Ok(())
}
