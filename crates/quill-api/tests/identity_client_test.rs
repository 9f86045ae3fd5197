//! Clerk client tests against a mock Backend API.

use quill_api::{ClerkClient, IdentityProvider};
use quill_core::Error;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_user_parses_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/user_2abc"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user_2abc",
            "email_addresses": [
                { "id": "idn_1", "email_address": "ada@example.com" },
                { "id": "idn_2", "email_address": "ada@work.example" }
            ],
            "first_name": "Ada",
            "last_name": "Lovelace",
            "username": null,
            "image_url": "https://img.example/ada.png",
            "created_at": 1790000000000i64,
            "public_metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClerkClient::new(&server.uri(), "sk_test_123").unwrap();
    let user = client.get_user("user_2abc").await.unwrap();

    assert_eq!(user.id, "user_2abc");
    assert_eq!(user.email(), Some("ada@example.com"));
    assert_eq!(user.full_name().as_deref(), Some("Ada Lovelace"));

    let row = user.to_new_user();
    assert_eq!(row.id, "user_2abc");
    assert_eq!(row.email.as_deref(), Some("ada@example.com"));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/user_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{ "code": "resource_not_found" }]
        })))
        .mount(&server)
        .await;

    let client = ClerkClient::new(&server.uri(), "sk").unwrap();
    let err = client.get_user("user_missing").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_provider_failure_is_identity_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = ClerkClient::new(&format!("{}/", server.uri()), "sk").unwrap();
    let err = client.get_user("user_1").await.unwrap_err();
    assert!(matches!(err, Error::Identity(_)));
}

#[tokio::test]
async fn test_invalid_user_id_is_rejected_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ClerkClient::new(&server.uri(), "sk").unwrap();
    let err = client.get_user("../admin").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
