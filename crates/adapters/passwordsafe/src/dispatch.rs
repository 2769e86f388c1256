//! Routing of a secret key to its retrieval strategy

use std::fmt;

use pwsafe_config::{AdapterSettings, RetrievalType};
use pwsafe_errors::{ProviderError, ProviderResult};
use tracing::debug;

use crate::auth::AuthSession;
use crate::client::PasswordSafeApi;
use crate::{managed_account, secrets};

/// A retrieval key split into exactly two non-empty segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKeyPath {
    first: String,
    second: String,
    separator: String,
}

impl SecretKeyPath {
    /// Split `key` on `separator`.
    ///
    /// Fewer or more than two segments, or an empty segment, is a
    /// `MalformedKey` error.
    pub fn parse(key: &str, separator: &str) -> ProviderResult<Self> {
        let malformed = || ProviderError::MalformedKey {
            key: key.to_string(),
            separator: separator.to_string(),
        };
        if separator.is_empty() {
            return Err(malformed());
        }

        let mut segments = key.split(separator);
        match (segments.next(), segments.next(), segments.next()) {
            (Some(first), Some(second), None) if !first.is_empty() && !second.is_empty() => {
                Ok(Self {
                    first: first.to_string(),
                    second: second.to_string(),
                    separator: separator.to_string(),
                })
            }
            _ => Err(malformed()),
        }
    }

    /// Folder path or system name
    pub fn first(&self) -> &str {
        &self.first
    }

    /// Secret title or account name
    pub fn second(&self) -> &str {
        &self.second
    }
}

impl fmt::Display for SecretKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, self.separator, self.second)
    }
}

/// A validated retrieval, ready to run against an authenticated session
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    pub retrieval_type: RetrievalType,
    pub path: SecretKeyPath,
    max_file_size: usize,
}

impl RetrievalPlan {
    /// Parse the retrieval type and key. No network I/O happens here, so a
    /// bad plan fails before authentication.
    pub fn new(key: &str, retrieval_type: &str, settings: &AdapterSettings) -> ProviderResult<Self> {
        let retrieval_type = retrieval_type
            .parse::<RetrievalType>()
            .map_err(|e| ProviderError::unsupported_retrieval_type(e.0))?;
        let path = SecretKeyPath::parse(key, &settings.separator)?;

        Ok(Self {
            retrieval_type,
            path,
            max_file_size: settings.max_file_secret_size_bytes,
        })
    }

    pub async fn execute(
        &self,
        api: &PasswordSafeApi,
        session: &AuthSession,
    ) -> ProviderResult<Vec<u8>> {
        debug!(
            retrieval_type = %self.retrieval_type,
            key = %self.path,
            "Dispatching retrieval"
        );
        match self.retrieval_type {
            RetrievalType::Secret => {
                secrets::get_secret(
                    api,
                    session,
                    self.path.first(),
                    self.path.second(),
                    &self.path.separator,
                    self.max_file_size,
                )
                .await
            }
            RetrievalType::ManagedAccount => {
                managed_account::get_credential(
                    api,
                    session,
                    self.path.first(),
                    self.path.second(),
                    &self.path.separator,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_two_segments() {
        let path = SecretKeyPath::parse("myfolder/mytitle", "/").unwrap();
        assert_eq!(path.first(), "myfolder");
        assert_eq!(path.second(), "mytitle");
        assert_eq!(path.to_string(), "myfolder/mytitle");
    }

    #[test]
    fn test_custom_separator() {
        let path = SecretKeyPath::parse("db01|svc_app", "|").unwrap();
        assert_eq!(path.first(), "db01");
        assert_eq!(path.second(), "svc_app");
    }

    #[test]
    fn test_malformed_keys() {
        for key in ["a", "a/b/c", "/b", "a/", "", "/"] {
            let err = SecretKeyPath::parse(key, "/").unwrap_err();
            assert!(
                matches!(err, ProviderError::MalformedKey { .. }),
                "{key:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_plan_rejects_unknown_type_before_key() {
        let err = RetrievalPlan::new("a/b/c", "CERTIFICATE", &AdapterSettings::default()).unwrap_err();
        match err {
            ProviderError::UnsupportedRetrievalType(value) => assert_eq!(value, "CERTIFICATE"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plan_parses_type_case_insensitively() {
        let plan = RetrievalPlan::new("db01/svc_app", "managed_account", &AdapterSettings::default())
            .unwrap();
        assert_eq!(plan.retrieval_type, RetrievalType::ManagedAccount);
    }

    #[tokio::test]
    async fn test_secret_plan_passes_both_segments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets-safe/secrets"))
            .and(query_param("path", "myfolder"))
            .and(query_param("title", "mytitle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "Id": "1", "Title": "mytitle", "Password": "value" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = PasswordSafeApi::with_client(Client::new(), Url::parse(&server.uri()).unwrap());
        let session = crate::auth::tests_support::session("token-1");
        let plan = RetrievalPlan::new("myfolder/mytitle", "SECRET", &AdapterSettings::default())
            .unwrap();

        assert_eq!(plan.execute(&api, &session).await.unwrap(), b"value");
    }
}
