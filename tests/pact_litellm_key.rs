//! Pact contract tests for the LiteLLM key management API
//!
//! These tests define the contract between the provider and the LiteLLM proxy
//! `/key/*` endpoints. The real `KeyClient` is pointed at the Pact mock server.

mod common;

use common::init_rustls;
use pact_consumer::prelude::*;
use provider_litellm::controller::reconciler::{ClientParams, ErrorKind, ExternalClient};
use provider_litellm::crd::{Key, KeyObservation, KeyParameters, KeySpec};
use provider_litellm::provider::key::KeyClient;
use provider_litellm::provider::litellm::LiteLlmClient;
use serde_json::json;
use std::time::Duration;
use zeroize::Zeroizing;

fn key_client(base_url: String) -> KeyClient {
    // mock_server.url() ends with a slash; the client trims it
    KeyClient::new(
        LiteLlmClient::new(ClientParams {
            api_base: base_url,
            api_key: Zeroizing::new("sk-master".to_string()),
            timeout: Duration::from_secs(5),
        })
        .expect("Failed to create LiteLLM client"),
    )
}

fn svc_key() -> Key {
    Key::new(
        "svc-a",
        KeySpec {
            for_provider: KeyParameters {
                duration: Some("24h".to_string()),
                key_alias: Some("svc-a".to_string()),
                ..Default::default()
            },
            ..Default::default()
        },
    )
}

fn generated(mut key: Key) -> Key {
    key.set_at_provider(KeyObservation {
        key: Some("sk-123".to_string()),
        status: Some("generated".to_string()),
        ..Default::default()
    });
    key
}

#[tokio::test]
async fn test_litellm_generate_key_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("generate a virtual key", "", |mut i| {
        i.given("the master key is valid");
        i.request
            .method("POST")
            .path("/key/generate")
            .header("authorization", "Bearer sk-master")
            .header("content-type", "application/json")
            .json_body(json!({
                "duration": "24h",
                "key_alias": "svc-a"
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "key": "sk-123",
                "expires": "2026-10-18T00:00:00Z",
                "status": "generated"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = svc_key();

    let details = client.create(&mut key).await.expect("create should succeed");

    assert_eq!(details.get("key").map(Vec::as_slice), Some(b"sk-123".as_slice()));
    let observed = key.status.and_then(|s| s.at_provider).unwrap();
    assert_eq!(observed.key.as_deref(), Some("sk-123"));
    assert_eq!(observed.status.as_deref(), Some("generated"));
    assert_eq!(observed.expires.as_deref(), Some("2026-10-18T00:00:00Z"));
}

#[tokio::test]
async fn test_litellm_key_info_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("get info for an existing key", "", |mut i| {
        i.given("key sk-123 exists");
        i.request
            .method("GET")
            .path("/key/info")
            .query_param("key", "sk-123")
            .header("authorization", "Bearer sk-master");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "key": "sk-123",
                "info": {
                    "key_alias": "svc-a",
                    "expires": "2026-10-18T00:00:00Z",
                    "models": [],
                    "blocked": null
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = generated(svc_key());

    let observation = client.observe(&mut key).await.expect("observe should succeed");

    assert!(observation.exists);
    assert!(observation.up_to_date);
    assert_eq!(
        observation.connection_details.get("key").map(Vec::as_slice),
        Some(b"sk-123".as_slice())
    );
    let observed = key.status.and_then(|s| s.at_provider).unwrap();
    assert_eq!(observed.status.as_deref(), Some("active"));
}

#[tokio::test]
async fn test_litellm_key_info_not_found_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("get info for a deleted key", "", |mut i| {
        i.given("key sk-123 does not exist");
        i.request
            .method("GET")
            .path("/key/info")
            .query_param("key", "sk-123")
            .header("authorization", "Bearer sk-master");
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({
                "detail": "Key not found"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = generated(svc_key());

    let observation = client.observe(&mut key).await.expect("observe should succeed");
    assert!(!observation.exists);
}

#[tokio::test]
async fn test_litellm_adopt_key_by_alias_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("list keys carrying an alias", "", |mut i| {
        i.given("a key with alias svc-a exists");
        i.request
            .method("GET")
            .path("/key/list")
            .query_param("key_alias", "svc-a")
            .query_param("return_full_object", "true")
            .header("authorization", "Bearer sk-master");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "keys": [
                    {
                        "token": "88dc28d0f030c55ed4ab77ed8faf098196cb1c05df778539800c9f1243fe6b4b",
                        "key_alias": "svc-a",
                        "expires": "2026-10-18T00:00:00Z",
                        "models": [],
                        "blocked": null
                    }
                ],
                "total_count": 1,
                "current_page": 1,
                "total_pages": 1
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = svc_key();

    let observation = client.observe(&mut key).await.expect("observe should succeed");

    assert!(observation.exists);
    assert!(observation.up_to_date);
    // The listed token is a hash, not a usable key
    assert!(observation.connection_details.is_empty());
    assert_eq!(
        key.external_id(),
        Some("88dc28d0f030c55ed4ab77ed8faf098196cb1c05df778539800c9f1243fe6b4b")
    );
}

#[tokio::test]
async fn test_litellm_key_alias_not_listed_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("list keys for an unused alias", "", |mut i| {
        i.given("no key with alias svc-a exists");
        i.request
            .method("GET")
            .path("/key/list")
            .query_param("key_alias", "svc-a")
            .query_param("return_full_object", "true")
            .header("authorization", "Bearer sk-master");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "keys": [],
                "total_count": 0,
                "current_page": 1,
                "total_pages": 0
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = svc_key();

    let observation = client.observe(&mut key).await.expect("observe should succeed");

    assert!(!observation.exists);
    assert_eq!(key.external_id(), None);
}

#[tokio::test]
async fn test_litellm_update_key_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("update an existing key", "", |mut i| {
        i.given("key sk-123 exists");
        i.request
            .method("POST")
            .path("/key/update")
            .header("authorization", "Bearer sk-master")
            .header("content-type", "application/json")
            .json_body(json!({
                "key": "sk-123",
                "key_alias": "svc-a"
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "key": "sk-123",
                "key_alias": "svc-a"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = generated(svc_key());

    let details = client.update(&mut key).await.expect("update should succeed");
    assert_eq!(details.get("key").map(Vec::as_slice), Some(b"sk-123".as_slice()));
}

#[tokio::test]
async fn test_litellm_delete_key_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("delete an existing key", "", |mut i| {
        i.given("key sk-123 exists");
        i.request
            .method("POST")
            .path("/key/delete")
            .header("authorization", "Bearer sk-master")
            .header("content-type", "application/json")
            .json_body(json!({
                "keys": ["sk-123"]
            }));
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "deleted_keys": ["sk-123"]
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = generated(svc_key());

    client.delete(&mut key).await.expect("delete should succeed");
}

#[tokio::test]
async fn test_litellm_rejected_master_key_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Provider-LiteLLM", "LiteLLM-Proxy");

    pact_builder.interaction("generate a key with an invalid master key", "", |mut i| {
        i.given("the master key is revoked");
        i.request
            .method("POST")
            .path("/key/generate")
            .header("authorization", "Bearer sk-master");
        i.response
            .status(401)
            .header("content-type", "application/json")
            .json_body(json!({
                "error": {
                    "message": "Authentication Error, invalid user key"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = key_client(mock_server.url().to_string());
    let mut key = svc_key();

    let err = client.create(&mut key).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransientTransportError);
    assert!(err.to_string().contains("HTTP 401: Authentication Error"));
    assert!(key.status.is_none());
}
