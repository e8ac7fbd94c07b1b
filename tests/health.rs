mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use solid_choice_api::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.status, "ok");
}

#[tokio::test]
async fn health_route_and_fallback() {
    let app = common::app(common::build_state(
        common::lazy_pool(),
        common::StubIdentity::default(),
        None,
    ));

    let response = common::send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json_body(response).await["status"], "ok");

    let response = common::send(&app, Request::get("/nope").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(common::json_body(response).await["error"], "Not Found");
}
