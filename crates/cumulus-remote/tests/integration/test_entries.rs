//! Listing, folder creation, metadata, delete/restore.

use wiremock::matchers::{body_json, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

use cumulus_core::ports::remote_store::{EntryKind, MetadataPatch, RemoteStore};

use crate::common::{file_entry, folder_entry, mount_listing, setup_store};

#[tokio::test]
async fn list_entries_parses_files_and_folders() {
    let (server, store) = setup_store().await;
    mount_listing(
        &server,
        serde_json::json!([
            folder_entry("d-1", "Reports", None),
            file_entry("f-1", "Q1.pdf", Some("d-1"), 2048),
        ]),
    )
    .await;

    let entries = store.list_entries().await.unwrap();
    assert_eq!(entries.len(), 2);

    let folder = &entries[0];
    assert_eq!(folder.kind, EntryKind::Folder);
    assert!(folder.parent_id.is_none());

    let file = &entries[1];
    assert_eq!(file.kind, EntryKind::File);
    assert_eq!(file.parent_id.as_deref(), Some("d-1"));
    assert_eq!(file.size, Some(2048));
    assert!(file.modified.is_some());
}

#[tokio::test]
async fn list_entries_propagates_server_error() {
    let (server, store) = setup_store().await;
    Mock::given(method("GET"))
        .and(path("/entries"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(store.list_entries().await.is_err());
}

#[tokio::test]
async fn create_folder_posts_name_and_parent() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_json(serde_json::json!({
            "name": "Reports",
            "parent_id": "d-root"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(folder_entry("d-9", "Reports", Some("d-root"))),
        )
        .mount(&server)
        .await;

    let entry = store.create_folder("Reports", Some("d-root")).await.unwrap();
    assert_eq!(entry.id, "d-9");
    assert_eq!(entry.kind, EntryKind::Folder);
}

#[tokio::test]
async fn create_folder_at_root_omits_parent() {
    let (server, store) = setup_store().await;
    Mock::given(method("POST"))
        .and(path("/folders"))
        .and(body_json(serde_json::json!({ "name": "Top" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(folder_entry("d-2", "Top", None)))
        .mount(&server)
        .await;

    let entry = store.create_folder("Top", None).await.unwrap();
    assert_eq!(entry.id, "d-2");
}

#[tokio::test]
async fn requests_carry_client_identity() {
    let (server, store) = setup_store().await;
    Mock::given(method("GET"))
        .and(path("/entries"))
        .and(header_exists("x-cumulus-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    store.list_entries().await.unwrap();
}

#[tokio::test]
async fn update_metadata_patches_entry() {
    let (server, store) = setup_store().await;
    Mock::given(method("PATCH"))
        .and(path("/entries/f-1"))
        .and(body_json(serde_json::json!({ "name": "renamed.txt" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let patch = MetadataPatch {
        name: Some("renamed.txt".to_string()),
        parent_id: None,
    };
    store.update_metadata("f-1", &patch).await.unwrap();
}

#[tokio::test]
async fn delete_and_restore_round_trip() {
    let (server, store) = setup_store().await;
    Mock::given(method("DELETE"))
        .and(path("/entries/f-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/entries/f-1/restore"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.delete_entry("f-1").await.unwrap();
    store.restore_entry("f-1").await.unwrap();
}
