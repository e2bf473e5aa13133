//! Profile endpoints against a temp-dir document.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};

use storynest_integration_tests::TestApp;

#[tokio::test]
async fn test_update_then_fetch_round_trip() {
    let app = TestApp::new().await;
    let user_data = json!({
        "childName": "Maya",
        "pronouns": "she",
        "favourites": { "animal": "otter", "colours": ["teal", "gold"] }
    });

    let (status, body) = app
        .post_json("/api/updateUserData", &json!({ "pin": "4821", "userData": user_data }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = app.get("/api/profiles/4821").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pin"], "4821");
    assert_eq!(body["userData"], user_data);
}

#[tokio::test]
async fn test_update_preserves_other_profiles() {
    let app = TestApp::new().await;
    app.post_json(
        "/api/updateUserData",
        &json!({ "pin": "1111", "userData": { "childName": "Ada" } }),
    )
    .await;
    app.post_json(
        "/api/updateUserData",
        &json!({ "pin": "2222", "userData": { "childName": "Ben" } }),
    )
    .await;

    let (_, first) = app.get("/api/profiles/1111").await;
    assert_eq!(first["userData"]["childName"], "Ada");

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(app.data_file()).unwrap()).unwrap();
    let profiles = raw["user_profiles"].as_object().unwrap();
    assert_eq!(profiles.len(), 2);
}

#[tokio::test]
async fn test_update_replaces_whole_record() {
    let app = TestApp::new().await;
    app.post_json(
        "/api/updateUserData",
        &json!({ "pin": "4821", "userData": { "childName": "Maya", "pronouns": "she" } }),
    )
    .await;
    app.post_json(
        "/api/updateUserData",
        &json!({ "pin": "4821", "userData": { "childName": "Maya" } }),
    )
    .await;

    let (_, body) = app.get("/api/profiles/4821").await;
    assert_eq!(body["userData"], json!({ "childName": "Maya" }));
}

#[tokio::test]
async fn test_missing_pin_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post_json("/api/updateUserData", &json!({ "userData": {} }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "pin is required");
}

#[tokio::test]
async fn test_non_object_user_data_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post_json("/api/updateUserData", &json!({ "pin": "4821", "userData": [1, 2] }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("JSON object"));
    assert!(app.store.list_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app.post_raw("/api/updateUserData", "{ not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_profile_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/profiles/9999").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Profile not found");
}

#[tokio::test]
async fn test_corrupt_document_is_server_error_and_untouched() {
    let app = TestApp::new().await;
    std::fs::write(app.data_file(), "{ truncated").unwrap();

    let (status, body) = app
        .post_json(
            "/api/updateUserData",
            &json!({ "pin": "4821", "userData": { "childName": "Maya" } }),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Profile data is unreadable");
    assert!(!body.to_string().contains(".json"));
    assert_eq!(std::fs::read_to_string(app.data_file()).unwrap(), "{ truncated");
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);

    std::fs::write(app.data_file(), "[]").unwrap();
    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = TestApp::new().await;
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
