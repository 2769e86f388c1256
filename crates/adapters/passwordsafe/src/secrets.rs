//! Secrets Safe retrieval: one secret addressed by folder path and title

use pwsafe_errors::{ProviderError, ProviderResult};
use serde::Deserialize;
use tracing::debug;

use crate::auth::AuthSession;
use crate::client::{PasswordSafeApi, send};
use crate::error::{Phase, map_transport_error};

const SECRETS_PATH: &str = "secrets-safe/secrets";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecretRecord {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    secret_type: String,
}

impl SecretRecord {
    fn is_file(&self) -> bool {
        self.secret_type.eq_ignore_ascii_case("file")
    }
}

/// Fetch the secret titled `title` in folder `folder`.
///
/// File secrets are downloaded and must not exceed `max_file_size` bytes.
pub async fn get_secret(
    api: &PasswordSafeApi,
    session: &AuthSession,
    folder: &str,
    title: &str,
    separator: &str,
    max_file_size: usize,
) -> ProviderResult<Vec<u8>> {
    let key = format!("{}{}{}", folder, separator, title);
    let context = format!("Secret {}", key);
    debug!(folder, title, "Looking up secret");

    let request = api
        .http()
        .get(api.endpoint(SECRETS_PATH)?)
        .bearer_auth(session.access_token())
        .query(&[("title", title), ("path", folder), ("separator", separator)]);
    let response = send(request, Phase::Retrieval, &context).await?;
    let records: Vec<SecretRecord> = response
        .json()
        .await
        .map_err(|e| map_transport_error(Phase::Retrieval, e, &context))?;

    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::secret_not_found(context.clone()))?;

    if record.is_file() {
        return download_file(api, session, &record.id, &key, max_file_size).await;
    }

    let password = record.password.ok_or_else(|| {
        ProviderError::retrieval(None, format!("{}: response carried no password", context))
    })?;
    debug!(id = %record.id, title = %record.title, "Secret found");
    Ok(password.into_bytes())
}

async fn download_file(
    api: &PasswordSafeApi,
    session: &AuthSession,
    id: &str,
    key: &str,
    max_file_size: usize,
) -> ProviderResult<Vec<u8>> {
    let context = format!("File secret {}", key);
    let too_large = |size: usize| ProviderError::SecretTooLarge {
        key: key.to_string(),
        size,
        limit: max_file_size,
    };

    let request = api
        .http()
        .get(api.endpoint(&format!("{}/{}/file/download", SECRETS_PATH, id))?)
        .bearer_auth(session.access_token());
    let mut response = send(request, Phase::Retrieval, &context).await?;

    if let Some(length) = response.content_length() {
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        if length > max_file_size {
            return Err(too_large(length));
        }
    }

    // chunked bodies carry no length; stop reading once the limit is passed
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| map_transport_error(Phase::Retrieval, e, &context))?
    {
        let size = body.len() + chunk.len();
        if size > max_file_size {
            return Err(too_large(size));
        }
        body.extend_from_slice(&chunk);
    }

    debug!(id, size = body.len(), "File secret downloaded");
    Ok(body)
}
