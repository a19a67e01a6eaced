//! Resolver tests

use super::*;
use crate::coordinator::RetryPolicy;
use crate::error::Error;
use crate::types::PageKey;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resolver(server: &MockServer, retries: u32) -> RpcResolver {
    RpcResolver::new(
        RpcResolverConfig::new(server.uri()).with_retry(RetryPolicy::immediate(retries)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_resolve_current_to_validated_minus_one() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "ledger"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "ledger": {"ledger_index": "71698272"},
                "ledger_index": 71698272,
                "status": "success",
                "validated": true
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resolved = resolver(&server, 0).resolve(PageKey::Current).await.unwrap();
    assert_eq!(resolved, PageKey::Index(71698271));
}

#[tokio::test]
async fn test_explicit_key_skips_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let resolved = resolver(&server, 0).resolve(PageKey::Index(42)).await.unwrap();
    assert_eq!(resolved, PageKey::Index(42));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"ledger": {"ledger_index": "12"}, "status": "success"}
        })))
        .mount(&server)
        .await;

    assert_eq!(resolver(&server, 3).latest_validated().await.unwrap(), 12);
}

#[tokio::test]
async fn test_rpc_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"error": "noNetwork", "status": "error"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let result = resolver(&server, 2).latest_validated().await;
    assert!(matches!(
        result,
        Err(Error::MaxRetriesExceeded { max_retries: 2, .. })
    ));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let result = resolver(&server, 5).latest_validated().await;
    assert!(matches!(result, Err(Error::HttpStatus { status: 403, .. })));
}

#[test]
fn test_invalid_url_rejected() {
    assert!(RpcResolver::new(RpcResolverConfig::new("not a url")).is_err());
}
