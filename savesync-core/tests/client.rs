use std::collections::HashMap;

use futures_util::TryStreamExt;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};
use savesync_core::{
    APP_DATA_SPACE, ApiErrorClass, DriveClient, FOLDER_MIME_TYPE, FileMetadataPatch, NewFile,
};

#[tokio::test]
async fn about_includes_bearer_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/about"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "displayName": "Player One",
                "emailAddress": "player@example.com"
            }
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let about = client.about().await.unwrap();

    assert_eq!(about.user.email_address.as_deref(), Some("player@example.com"));
    assert_eq!(about.user.display_name.as_deref(), Some("Player One"));
}

#[tokio::test]
async fn list_files_scopes_to_app_data_and_forwards_page_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("spaces", APP_DATA_SPACE))
        .and(query_param("q", "'folder-1' in parents and trashed = false"))
        .and(query_param("fields", "nextPageToken, files(id)"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {
                    "id": "a",
                    "name": "game1.srm",
                    "size": "3",
                    "modifiedTime": "2024-01-01T00:00:00.000Z",
                    "md5Checksum": "abc",
                    "appProperties": { "localPath": "game1.srm" },
                    "parents": ["folder-1"]
                }
            ]
        })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let page = client
        .list_files(
            "'folder-1' in parents and trashed = false",
            "nextPageToken, files(id)",
            Some("page-2"),
        )
        .await
        .unwrap();

    assert_eq!(page.next_page_token, None);
    assert_eq!(page.files.len(), 1);
    let file = &page.files[0];
    assert_eq!(file.id, "a");
    assert_eq!(file.size, Some(3));
    assert_eq!(file.md5_checksum.as_deref(), Some("abc"));
    assert_eq!(file.parents.as_deref(), Some(&["folder-1".to_string()][..]));
}

#[tokio::test]
async fn create_file_posts_metadata_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(query_param("fields", "id"))
        .and(body_json(json!({
            "name": "game1.srm",
            "mimeType": "application/x-binary",
            "parents": ["folder-1"],
            "appProperties": { "localPath": "nested/game1.srm" },
            "modifiedTime": "2024-01-01T00:00:00Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-id" })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let created = client
        .create_file(&NewFile {
            name: "game1.srm".into(),
            mime_type: "application/x-binary".into(),
            parents: vec!["folder-1".into()],
            app_properties: Some(HashMap::from([(
                "localPath".to_string(),
                "nested/game1.srm".to_string(),
            )])),
            modified_time: Some("2024-01-01T00:00:00Z".into()),
        })
        .await
        .unwrap();

    assert_eq!(created.id, "new-id");
}

#[tokio::test]
async fn create_folder_uses_folder_mime_type() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/drive/v3/files"))
        .and(body_json(json!({
            "name": "saves",
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [APP_DATA_SPACE]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "folder-9" })))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let created = client
        .create_file(&NewFile {
            name: "saves".into(),
            mime_type: FOLDER_MIME_TYPE.into(),
            parents: vec![APP_DATA_SPACE.into()],
            ..NewFile::default()
        })
        .await
        .unwrap();

    assert_eq!(created.id, "folder-9");
}

#[tokio::test]
async fn create_with_content_sends_metadata_and_bytes_together() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header_regex("content-type", "^multipart/related; boundary=.+"))
        .and(body_string_contains(r#""localPath":"nested/game1.srm""#))
        .and(body_string_contains(r#""modifiedTime":"2024-01-01T00:00:00Z""#))
        .and(body_string_contains("Content-Type: application/x-binary\r\n\r\npayload\r\n"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-id" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("game1.srm");
    std::fs::write(&source, b"payload").unwrap();

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let created = client
        .create_file_with_content(
            &NewFile {
                name: "game1.srm".into(),
                mime_type: "application/x-binary".into(),
                parents: vec!["folder-1".into()],
                app_properties: Some(HashMap::from([(
                    "localPath".to_string(),
                    "nested/game1.srm".to_string(),
                )])),
                modified_time: Some("2024-01-01T00:00:00Z".into()),
            },
            &source,
        )
        .await
        .unwrap();

    assert_eq!(created.id, "new-id");
}

#[tokio::test]
async fn update_with_content_patches_file_in_one_request() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/file-1"))
        .and(query_param("uploadType", "multipart"))
        .and(body_string_contains(r#"{"modifiedTime":"2024-02-02T00:00:00Z"}"#))
        .and(body_string_contains("\r\n\r\nnew bytes\r\n--"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let source = dir.path().join("game.srm");
    std::fs::write(&source, b"new bytes").unwrap();

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let updated = client
        .update_file_with_content(
            "file-1",
            &FileMetadataPatch {
                modified_time: Some("2024-02-02T00:00:00Z".into()),
            },
            &source,
            "application/x-binary",
        )
        .await
        .unwrap();

    assert_eq!(updated.id, "file-1");
}

#[tokio::test]
async fn missing_upload_source_fails_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "x" })))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client
        .create_file_with_content(
            &NewFile {
                name: "gone.srm".into(),
                ..NewFile::default()
            },
            &dir.path().join("gone.srm"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, savesync_core::DriveError::Io(_)));
}

#[tokio::test]
async fn download_returns_media_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello"))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let chunks: Vec<Vec<u8>> = client
        .download("file-1")
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(chunks.concat(), b"hello");
}

#[tokio::test]
async fn api_errors_carry_classification() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend error"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/about"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client.list_files("trashed = false", "", None).await.unwrap_err();
    assert_eq!(err.classification(), Some(ApiErrorClass::Transient));
    assert!(err.is_retryable());

    let err = client.about().await.unwrap_err();
    assert_eq!(err.classification(), Some(ApiErrorClass::Auth));
    assert!(!err.is_retryable());
}
