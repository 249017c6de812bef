// SPDX-License-Identifier: MIT

//! API input validation tests.
//!
//! All validation here happens before any store access, so the offline mock
//! store never gets in the way.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use mongodb::bson::oid::ObjectId;
use tower::ServiceExt;

mod common;

fn authed_json_request(method: &str, uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_create_folder_empty_name() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(ObjectId::new(), &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/folders",
            &token,
            r#"{"name": "   "}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rename_folder_malformed_id_is_not_found() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(ObjectId::new(), &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed_json_request(
            "PUT",
            "/api/folders/not-an-object-id",
            &token,
            r#"{"name": "Work"}"#,
        ))
        .await
        .unwrap();

    // Malformed ids are indistinguishable from absent folders
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_snippet_malformed_folder_id_is_not_found() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(ObjectId::new(), &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed_json_request(
            "POST",
            "/api/folders/zzz/snippets",
            &token,
            r#"{"shortcutKey": "gm", "content": "good morning"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_snippet_without_fields() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(ObjectId::new(), &state.config.jwt_signing_key);

    let folder_id = ObjectId::new().to_hex();
    let snippet_id = ObjectId::new().to_hex();

    let response = app
        .oneshot(authed_json_request(
            "PUT",
            &format!("/api/folders/{}/snippet/{}", folder_id, snippet_id),
            &token,
            "{}",
        ))
        .await
        .unwrap();

    // "No valid fields" is rejected before any lookup
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_empty_fields() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"firstName": "", "lastName": "Doe", "email": "a@b.c", "password": "longenough"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"firstName": "Jane", "lastName": "Doe", "email": "a@b.c", "password": "short"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_rejects_empty_password() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "a@b.c", "password": ""}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_otp_rejects_empty_otp() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/verify-otp")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "a@b.c", "otp": "  "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
