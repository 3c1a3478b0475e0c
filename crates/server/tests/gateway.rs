//! Store gateway and credential tests against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use fhir_proxy_core::{
    ClinicalResource, FhirProxy, IdentityTag, ProxyError, ProxyResult, Store, StoreError,
    TokenProvider, decode_str,
};
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fhir_proxy_server::gateway::{
    CLOUD_PLATFORM_SCOPE, HealthcareStore, MetadataTokenProvider, ServiceAccountTokenProvider,
    StaticTokenProvider,
};

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const FHIR_JSON: &str = "application/fhir+json;charset=utf-8";

fn store_for(server: &MockServer) -> HealthcareStore {
    HealthcareStore::new(&format!("{}/fhir", server.uri()), Duration::from_secs(5)).unwrap()
}

fn metadata_for(server: &MockServer) -> MetadataTokenProvider {
    MetadataTokenProvider::new(&server.uri(), Duration::from_secs(5)).unwrap()
}

/// Service account key fixture whose `token_uri` points at `server`
fn service_account_for(server: &MockServer) -> ServiceAccountTokenProvider {
    let mut key: serde_json::Value =
        serde_json::from_str(include_str!("fixtures/service_account.json")).unwrap();
    key["token_uri"] = json!(format!("{}/token", server.uri()));
    ServiceAccountTokenProvider::from_json(&key.to_string(), Duration::from_secs(5)).unwrap()
}

fn patient() -> ClinicalResource {
    decode_str(r#"{"resourceType":"Patient","active":true}"#).unwrap()
}

#[tokio::test]
async fn test_create_returns_assigned_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fhir/Patient"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(header("Content-Type", FHIR_JSON))
        .and(body_partial_json(json!({"resourceType": "Patient", "active": true})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"resourceType": "Patient", "id": "new-id", "active": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store_for(&server).create(&patient(), "tok-1").await.unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.assigned_id.as_deref(), Some("new-id"));
    assert_eq!(outcome.error_detail, None);
}

#[tokio::test]
async fn test_create_falls_back_to_location_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fhir/Patient"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Location", "https://store/fhir/Patient/loc-7/_history/1"),
        )
        .mount(&server)
        .await;

    let outcome = store_for(&server).create(&patient(), "tok").await.unwrap();

    assert!(outcome.created);
    assert_eq!(outcome.assigned_id.as_deref(), Some("loc-7"));
}

#[tokio::test]
async fn test_success_without_create_is_not_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fhir/Patient"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "information", "code": "duplicate", "diagnostics": "already exists"}]
        })))
        .mount(&server)
        .await;

    let outcome = store_for(&server).create(&patient(), "tok").await.unwrap();

    assert!(!outcome.created);
    assert_eq!(outcome.assigned_id, None);
    assert_eq!(outcome.error_detail.as_deref(), Some("already exists"));
}

#[tokio::test]
async fn test_error_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fhir/Patient"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "resourceType": "OperationOutcome",
            "issue": [{"severity": "error", "code": "forbidden", "diagnostics": "permission denied"}]
        })))
        .mount(&server)
        .await;

    let err = store_for(&server).create(&patient(), "tok").await.unwrap_err();

    match err {
        StoreError::Rejected { status, detail } => {
            assert_eq!(status, 403);
            assert_eq!(detail, "permission denied");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_store_is_transport_error() {
    // Reserve a port, then release it so nothing is listening there
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let base = format!("http://127.0.0.1:{}/fhir", port);

    let store = HealthcareStore::new(&base, Duration::from_secs(2)).unwrap();
    let err = store.create(&patient(), "tok").await.unwrap_err();

    assert!(matches!(err, StoreError::Transport(_)));
}

#[tokio::test]
async fn test_metadata_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(header("Metadata-Flavor", "Google"))
        .and(query_param("scopes", CLOUD_PLATFORM_SCOPE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = metadata_for(&server)
        .bearer_token()
        .await
        .unwrap();

    assert_eq!(token, "ya29.token");
}

#[tokio::test]
async fn test_metadata_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_string("no service account"))
        .mount(&server)
        .await;

    let err = metadata_for(&server)
        .bearer_token()
        .await
        .unwrap_err();

    assert!(err.0.contains("no service account"));
}

#[tokio::test]
async fn test_metadata_empty_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": ""})))
        .mount(&server)
        .await;

    let result = metadata_for(&server).bearer_token().await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_metadata_server_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let provider = MetadataTokenProvider::new(&server.uri(), Duration::from_millis(200)).unwrap();
    let started = std::time::Instant::now();
    let result = provider.bearer_token().await;

    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[derive(serde::Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
}

#[tokio::test]
async fn test_service_account_token_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "sa-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = service_account_for(&server);
    assert_eq!(
        provider.client_email(),
        "fhir-proxy@test-project.iam.gserviceaccount.com"
    );

    // Second call is served from the cache
    assert_eq!(provider.bearer_token().await.unwrap(), "sa-token");
    assert_eq!(provider.bearer_token().await.unwrap(), "sa-token");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let assertion = body
        .split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .unwrap();

    let token_uri = format!("{}/token", server.uri());
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.set_audience(&[token_uri.as_str()]);
    let key = jsonwebtoken::DecodingKey::from_rsa_pem(include_bytes!(
        "fixtures/service_account.pub.pem"
    ))
    .unwrap();
    let claims = jsonwebtoken::decode::<AssertionClaims>(assertion, &key, &validation)
        .unwrap()
        .claims;

    assert_eq!(claims.iss, "fhir-proxy@test-project.iam.gserviceaccount.com");
    assert_eq!(claims.scope, CLOUD_PLATFORM_SCOPE);
    assert_eq!(claims.aud, token_uri);
}

#[tokio::test]
async fn test_service_account_short_lived_token_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "short", "expires_in": 30})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let provider = service_account_for(&server);
    provider.bearer_token().await.unwrap();
    provider.bearer_token().await.unwrap();
}

#[tokio::test]
async fn test_service_account_exchange_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    let err = service_account_for(&server).bearer_token().await.unwrap_err();

    assert!(err.0.contains("invalid_grant"));
}

#[test]
fn test_service_account_key_errors() {
    let timeout = Duration::from_secs(5);

    assert!(ServiceAccountTokenProvider::from_json("{}", timeout).is_err());
    assert!(
        ServiceAccountTokenProvider::from_json(
            r#"{"client_email":"a@b","private_key":"not a pem","token_uri":"https://t"}"#,
            timeout
        )
        .is_err()
    );
    assert!(
        ServiceAccountTokenProvider::from_file(
            std::path::Path::new("/nonexistent/service_account.json"),
            timeout
        )
        .is_err()
    );
}

#[tokio::test]
async fn test_static_token() {
    let token = StaticTokenProvider::new("fixed").bearer_token().await.unwrap();
    assert_eq!(token, "fixed");
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "meta-tok"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fhir/Observation"))
        .and(header("Authorization", "Bearer meta-tok"))
        .and(body_partial_json(json!({
            "resourceType": "Observation",
            "identifier": [{"system": "http://demo-fhir", "value": "demo-test"}],
            "valueQuantity": {"value": 98.6}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"resourceType": "Observation", "id": "obs-1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let proxy = FhirProxy::new(
        Arc::new(store_for(&server)),
        Arc::new(metadata_for(&server)),
        IdentityTag::new("http://demo-fhir", "demo-test"),
    );

    let result = proxy
        .process(br#"{"resourceType":"Observation","valueQuantity":{"value":98.6}}"#)
        .await
        .unwrap();

    match result {
        ProxyResult::Submitted { outcome, envelope } => {
            assert!(outcome.created);
            assert_eq!(outcome.assigned_id.as_deref(), Some("obs-1"));
            assert_eq!(envelope.entry.len(), 1);
        }
        other => panic!("expected Submitted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pipeline_credential_failure_skips_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let proxy = FhirProxy::new(
        Arc::new(store_for(&server)),
        Arc::new(metadata_for(&server)),
        IdentityTag::default(),
    );

    let err = proxy
        .process(br#"{"resourceType":"Patient"}"#)
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Credential(_)));
}
