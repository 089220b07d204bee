//! Upload, content update, buffered and streamed download.

use wiremock::matchers::{body_bytes, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use cumulus_core::ports::remote_store::RemoteStore;

use crate::common::{file_entry, setup_store};

#[tokio::test]
async fn upload_file_sends_raw_body_with_name_and_parent() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/files"))
        .and(query_param("name", "notes.txt"))
        .and(query_param("parent_id", "d-1"))
        .and(body_bytes(b"hello remote".to_vec()))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(file_entry("f-77", "notes.txt", Some("d-1"), 12)),
        )
        .mount(&server)
        .await;

    let entry = store
        .upload_file("notes.txt", Some("d-1"), b"hello remote")
        .await
        .unwrap();
    assert_eq!(entry.id, "f-77");
    assert_eq!(entry.size, Some(12));
}

#[tokio::test]
async fn update_file_content_puts_raw_body() {
    let (server, store) = setup_store().await;
    Mock::given(method("PUT"))
        .and(path("/entries/f-77/content"))
        .and(body_bytes(b"v2".to_vec()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.update_file_content("f-77", b"v2").await.unwrap();
}

#[tokio::test]
async fn download_entry_returns_bytes() {
    let (server, store) = setup_store().await;
    Mock::given(method("GET"))
        .and(path("/entries/f-77/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"file payload".to_vec()))
        .mount(&server)
        .await;

    let data = store.download_entry("f-77").await.unwrap();
    assert_eq!(data, b"file payload");
}

#[tokio::test]
async fn download_entry_to_streams_into_dest() {
    let (server, store) = setup_store().await;
    let payload = vec![7u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/entries/f-88/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let dest = dir.path().join("staged.part");

    let written = store.download_entry_to("f-88", &dest).await.unwrap();
    assert_eq!(written, payload.len() as u64);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), payload);
}

#[tokio::test]
async fn download_entry_to_fails_on_missing_entry() {
    let (server, store) = setup_store().await;
    Mock::given(method("GET"))
        .and(path("/entries/f-404/content"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let dest = dir.path().join("staged.part");
    assert!(store.download_entry_to("f-404", &dest).await.is_err());
}
