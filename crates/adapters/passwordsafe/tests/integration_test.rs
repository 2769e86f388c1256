//! End-to-end tests for the Password Safe adapter
//!
//! The vault API is served by wiremock; the external key-value store is a
//! mockall mock of the `SecretReader` port.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use adapter_passwordsafe::{PROVIDER_NAME, PasswordSafeProvider, register};
use pwsafe_config::{
    AdapterSettings, ObjectMeta, PasswordSafeProviderSpec, ProviderSpec, RetrySettings,
    SecretStore, SecretStoreSpec, SecretValueDescriptor,
};
use pwsafe_errors::{ErrorCategory, ProviderError};
use pwsafe_ports::{
    MockSecretReader, Provider, ProviderRegistry, RemoteRef, SecretsClient, ValidationResult,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_tracing() {
    pwsafe_telemetry::try_init_tracing("debug");
}

fn store_for(api_url: &str, retrieval_type: &str) -> SecretStore {
    SecretStore {
        metadata: ObjectMeta {
            name: "pwsafe".to_string(),
            namespace: Some("apps".to_string()),
        },
        spec: Some(SecretStoreSpec {
            provider: Some(ProviderSpec {
                passwordsafe: Some(PasswordSafeProviderSpec {
                    api_url: api_url.to_string(),
                    client_id: Some(SecretValueDescriptor::literal("abc")),
                    client_secret: Some(SecretValueDescriptor::literal("xyz")),
                    retrieval_type: retrieval_type.to_string(),
                    ..Default::default()
                }),
            }),
        }),
    }
}

fn fast_settings() -> AdapterSettings {
    AdapterSettings {
        retry: RetrySettings {
            initial_interval_ms: 20,
            max_interval_secs: 1,
            max_elapsed_secs: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn idle_reader() -> MockSecretReader {
    let mut reader = MockSecretReader::new();
    reader.expect_get_secret().never();
    reader
}

async fn build_client(
    settings: AdapterSettings,
    store: &SecretStore,
) -> Box<dyn SecretsClient> {
    PasswordSafeProvider::new(settings)
        .unwrap()
        .new_client(store, &idle_reader(), "apps")
        .await
        .unwrap()
}

async fn mount_handshake(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/Auth/connect/token"))
        .and(body_string_contains("client_id=abc"))
        .and(body_string_contains("client_secret=xyz"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "token-1",
            "expires_in": 3600,
            "token_type": "Bearer",
            "scope": "publicapi"
        })))
        .expect(expected)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Auth/SignAppIn"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "UserId": 1,
            "UserName": "svc-sync"
        })))
        .expect(expected)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Auth/Signout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_secret_with_literal_credentials() {
    init_tracing();
    let server = MockServer::start().await;
    mount_handshake(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/secrets-safe/secrets"))
        .and(query_param("path", "myfolder"))
        .and(query_param("title", "mytitle"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "Id": "9152f5b6", "Title": "mytitle", "Password": "credential_in_sub_3_password", "SecretType": "Credential" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(fast_settings(), &store_for(&server.uri(), "SECRET")).await;
    let value = client
        .get_secret(&RemoteRef::new("myfolder/mytitle"))
        .await
        .unwrap();

    assert_eq!(value, b"credential_in_sub_3_password");
}

#[tokio::test]
async fn test_fetch_managed_account_credential() {
    init_tracing();
    let server = MockServer::start().await;
    mount_handshake(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/ManagedAccounts"))
        .and(query_param("systemName", "db01"))
        .and(query_param("accountName", "svc_app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "SystemId": 5,
            "AccountId": 9
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Requests"))
        .respond_with(ResponseTemplate::new(201).set_body_string("41"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Credentials/41"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"managed-pass\""))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/Requests/41/checkin"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(fast_settings(), &store_for(&server.uri(), "MANAGED_ACCOUNT")).await;
    let value = client
        .get_secret(&RemoteRef::new("db01/svc_app"))
        .await
        .unwrap();

    assert_eq!(value, b"managed-pass");
}

#[tokio::test]
async fn test_reference_to_missing_key_fails_construction_without_network() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut store = store_for(&server.uri(), "SECRET");
    if let Some(spec) = store
        .spec
        .as_mut()
        .and_then(|s| s.provider.as_mut())
        .and_then(|p| p.passwordsafe.as_mut())
    {
        spec.client_id = Some(SecretValueDescriptor::reference("pwsafe-creds", "id"));
    }

    let mut reader = MockSecretReader::new();
    reader.expect_get_secret().times(1).returning(|_, _| {
        Ok(HashMap::from([(
            "secret".to_string(),
            b"xyz".to_vec(),
        )]))
    });

    let err = PasswordSafeProvider::default()
        .new_client(&store, &reader, "apps")
        .await
        .unwrap_err();

    match &err {
        ProviderError::NoSuchKey { key, .. } => assert_eq!(key, "id"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::CredentialResolution);
}

#[test]
fn test_unparsable_api_url_fails_validation() {
    let provider = PasswordSafeProvider::default();
    let err = provider
        .validate_store(Some(&store_for("not a url", "SECRET")))
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidHostUrl { .. }));
    assert_eq!(err.category(), ErrorCategory::Configuration);
}

#[tokio::test]
async fn test_persistent_server_errors_exhaust_authentication() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Auth/connect/token"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets-safe/secrets"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let settings = fast_settings();
    let window = settings.retry.max_elapsed();
    let client = build_client(settings, &store_for(&server.uri(), "SECRET")).await;

    let start = Instant::now();
    let err = client
        .get_secret(&RemoteRef::new("myfolder/mytitle"))
        .await
        .unwrap_err();
    let elapsed = start.elapsed();

    match &err {
        ProviderError::AuthenticationExhausted { attempts, source } => {
            assert!(*attempts > 1);
            assert_eq!(source.upstream_status(), Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // the last attempt may start just inside the window
    assert!(elapsed < window + Duration::from_secs(5));
}

#[tokio::test]
async fn test_bad_key_or_type_fails_before_authentication() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Auth/connect/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = build_client(fast_settings(), &store_for(&server.uri(), "SECRET")).await;
    for key in ["mytitle", "a/b/c"] {
        let err = client.get_secret(&RemoteRef::new(key)).await.unwrap_err();
        assert!(
            matches!(err, ProviderError::MalformedKey { .. }),
            "{key}: {err:?}"
        );
    }

    let client = build_client(fast_settings(), &store_for(&server.uri(), "CERTIFICATE")).await;
    let err = client
        .get_secret(&RemoteRef::new("myfolder/mytitle"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::UnsupportedRetrievalType(_)));
}

#[tokio::test]
async fn test_validate_reports_ready_and_error() {
    init_tracing();
    let server = MockServer::start().await;
    mount_handshake(&server, 1).await;

    let client = build_client(fast_settings(), &store_for(&server.uri(), "SECRET")).await;
    assert_eq!(client.validate().await.unwrap(), ValidationResult::Ready);

    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Auth/connect/token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&rejecting)
        .await;

    let client = build_client(fast_settings(), &store_for(&rejecting.uri(), "SECRET")).await;
    assert_eq!(client.validate().await.unwrap(), ValidationResult::Error);
}

#[tokio::test]
async fn test_closed_client_refuses_fetch() {
    let server = MockServer::start().await;
    let client = build_client(fast_settings(), &store_for(&server.uri(), "SECRET")).await;

    client.close().await.unwrap();
    let err = client
        .get_secret(&RemoteRef::new("myfolder/mytitle"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ClientClosed));
}

#[test]
fn test_registry_resolves_provider_for_store() {
    let mut registry = ProviderRegistry::new();
    register(&mut registry, AdapterSettings::default()).unwrap();

    let store = store_for("https://vault.example.com", "SECRET");
    let provider = registry.for_store(&store).expect("provider should be registered");
    assert!(provider.capabilities().can_read());
    assert!(!provider.capabilities().can_write());
    assert!(registry.names().any(|name| name == PROVIDER_NAME));
}
