// SPDX-License-Identifier: MIT

//! Snippet listing pagination/sort parameter tests.
//!
//! Parameters are validated before the folder lookup, so these run against
//! the offline mock store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use mongodb::bson::oid::ObjectId;
use tower::ServiceExt;

mod common;

async fn list_status(query: &str) -> StatusCode {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(ObjectId::new(), &state.config.jwt_signing_key);
    let folder_id = ObjectId::new().to_hex();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/folders/{}/snippets{}", folder_id, query))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    response.status()
}

#[tokio::test]
async fn test_unknown_sort_field_rejected() {
    assert_eq!(
        list_status("?sortBy=passwordHash").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_bad_order_direction_rejected() {
    assert_eq!(
        list_status("?orderBy=sideways").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_zero_limit_rejected() {
    assert_eq!(list_status("?limit=0").await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_limit_rejected() {
    assert_eq!(list_status("?limit=1000").await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_projection_field_rejected() {
    assert_eq!(
        list_status("?fields=passwordHash").await,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_valid_parameters_reach_the_store() {
    // Past validation the offline mock store answers with 500, not 400
    assert_eq!(
        list_status("?limit=5&skip=10&sortBy=content&orderBy=desc&fields=shortcutKey,content")
            .await,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
