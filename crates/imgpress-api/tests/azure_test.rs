//! Azure Blob Storage upload, listing and tier integration tests.
//!
//! Run with: `cargo test -p imgpress-api --test azure_test`

mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::MultipartForm;
use helpers::fixtures::{file_part, jpeg, png};
use helpers::mocks::MockBlobStore;
use helpers::{entry_count, setup_test_app, setup_test_app_with, Backends};
use imgpress_api::constants::UPLOAD_SUMMARY_HEADER;

#[tokio::test]
async fn test_upload_creates_container_before_blobs() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part("file", file_part(jpeg(16, 16), "a.jpg", "image/jpeg"))
        .add_part("file", file_part(png(16, 16), "b.png", "image/png"))
        .add_text("container", "photos");
    let response = app.client().post("/azure").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/azure");
    assert_eq!(
        response.header(UPLOAD_SUMMARY_HEADER),
        "published=2; rejected=0; failed=0"
    );

    assert_eq!(
        app.store.calls(),
        [
            "create:photos",
            "upload:photos/a.jpg:image/jpeg",
            "upload:photos/b.png:image/jpeg",
        ]
    );
    assert_eq!(entry_count(&app.inbound_dir()), 0);
    assert_eq!(entry_count(&app.outbound_dir()), 0);
}

#[tokio::test]
async fn test_upload_into_existing_container() {
    let app = setup_test_app_with(Backends {
        store: Some(MockBlobStore::with_container("photos", &["old.jpg"])),
        ..Backends::default()
    })
    .await;

    let form = MultipartForm::new()
        .add_text("container", "photos")
        .add_part("file", file_part(png(8, 8), "new.png", "image/png"));
    let response = app.client().post("/azure").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let containers = app.store.containers.lock().unwrap().clone();
    assert_eq!(containers["photos"], ["old.jpg", "new.png"]);
}

#[tokio::test]
async fn test_invalid_container_name_fails_every_file() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_text("container", "Bad_Name")
        .add_part("file", file_part(png(8, 8), "a.png", "image/png"))
        .add_part("file", file_part(png(8, 8), "b.png", "image/png"));
    let response = app.client().post("/azure").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.header(UPLOAD_SUMMARY_HEADER),
        "published=0; rejected=0; failed=2"
    );
    assert!(app.store.calls().is_empty());
    assert_eq!(entry_count(&app.inbound_dir()), 0);
}

#[tokio::test]
async fn test_missing_container_field_is_bad_request() {
    let app = setup_test_app().await;

    let form =
        MultipartForm::new().add_part("file", file_part(png(8, 8), "a.png", "image/png"));
    let response = app.client().post("/azure").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(app.store.calls().is_empty());
}

#[tokio::test]
async fn test_tier_is_applied_to_every_blob() {
    let app = setup_test_app_with(Backends {
        store: Some(MockBlobStore::with_container(
            "photos",
            &["a.jpg", "b.jpg", "c.jpg", "d.jpg"],
        )),
        ..Backends::default()
    })
    .await;

    let response = app
        .client()
        .post("/azure/tier")
        .form(&[("container", "photos"), ("tier", "archive")])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/azure");
    assert_eq!(
        app.store.calls(),
        [
            "tier:a.jpg:Archive",
            "tier:b.jpg:Archive",
            "tier:c.jpg:Archive",
            "tier:d.jpg:Archive",
        ]
    );
}

#[tokio::test]
async fn test_tier_on_empty_container_issues_no_calls() {
    let app = setup_test_app_with(Backends {
        store: Some(MockBlobStore::with_container("empty", &[])),
        ..Backends::default()
    })
    .await;

    let response = app
        .client()
        .post("/azure/tier")
        .form(&[("container", "empty"), ("tier", "Cool")])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert!(app.store.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_tier_is_bad_request() {
    let app = setup_test_app_with(Backends {
        store: Some(MockBlobStore::with_container("photos", &["a.jpg"])),
        ..Backends::default()
    })
    .await;

    let response = app
        .client()
        .post("/azure/tier")
        .form(&[("container", "photos"), ("tier", "Frozen")])
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
    assert!(app.store.calls().is_empty());
}

#[tokio::test]
async fn test_view_lists_containers() {
    let store = MockBlobStore::with_container("photos", &[]);
    store
        .containers
        .lock()
        .unwrap()
        .insert("archive-2023".to_string(), Vec::new());
    let app = setup_test_app_with(Backends {
        store: Some(store),
        ..Backends::default()
    })
    .await;

    let response = app.client().get("/azure").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains(r#"<option value="photos">photos</option>"#));
    assert!(html.contains(r#"<option value="archive-2023">archive-2023</option>"#));
}

#[tokio::test]
async fn test_view_without_connection_string_is_configuration_error() {
    let app = setup_test_app_with(Backends {
        store: None,
        ..Backends::default()
    })
    .await;

    let response = app.client().get("/azure").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "CONFIGURATION_ERROR");
}
