//! Remote editorial lock endpoint behavior.

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use cumulus_core::ports::remote_store::RemoteStore;

use crate::common::setup_store;

#[tokio::test]
async fn lock_granted() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/entries/f-1/lock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "locked": true
        })))
        .mount(&server)
        .await;

    assert!(store.lock("f-1").await.unwrap());
}

#[tokio::test]
async fn lock_refused_in_body() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/entries/f-1/lock"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "locked": false
        })))
        .mount(&server)
        .await;

    assert!(!store.lock("f-1").await.unwrap());
}

#[tokio::test]
async fn lock_conflict_status_is_refusal_not_error() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/entries/f-1/lock"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    assert!(!store.lock("f-1").await.unwrap());
}

#[tokio::test]
async fn lock_server_error_is_an_error() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/entries/f-1/lock"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(store.lock("f-1").await.is_err());
}

#[tokio::test]
async fn unlock_deletes_lock() {
    let (server, store) = setup_store().await;
    Mock::given(method("DELETE"))
        .and(path("/entries/f-1/lock"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.unlock("f-1").await.unwrap();
}
