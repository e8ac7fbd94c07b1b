//! Router-level checks that must hold before any store access.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;
use solid_choice_api::payments::stripe::sign_payload;

fn app() -> axum::Router {
    common::app(common::build_state(
        common::lazy_pool(),
        common::StubIdentity::default(),
        None,
    ))
}

#[tokio::test]
async fn cart_requires_bearer_token() {
    let app = app();
    for method in ["GET", "POST", "PATCH", "DELETE"] {
        let request = Request::builder()
            .method(method)
            .uri("/api/cart")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = common::send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method}");
        assert_eq!(common::json_body(response).await["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let app = app();
    let request = Request::post("/api/cart/checkout")
        .header(header::AUTHORIZATION, "Bearer not-a-session")
        .body(Body::empty())
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let app = app();
    for (method, uri) in common::admin_routes() {
        let request = Request::builder()
            .method(method)
            .uri(uri.as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = common::send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn stripe_webhook_without_signature_is_rejected() {
    let app = app();
    let body = json!({ "type": "payment_intent.succeeded", "data": { "object": { "id": "pi_1" } } });
    let request = Request::post("/api/webhooks/stripe")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(common::json_body(response).await["error"], "Invalid signature");
}

#[tokio::test]
async fn stripe_webhook_with_wrong_secret_is_rejected() {
    let app = app();
    let body = json!({ "type": "payment_intent.succeeded", "data": { "object": { "id": "pi_1" } } })
        .to_string();
    let now = chrono::Utc::now().timestamp();
    let request = Request::post("/api/webhooks/stripe")
        .header("Stripe-Signature", sign_payload(body.as_bytes(), "whsec_other", now))
        .body(Body::from(body))
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stripe_webhook_with_extreme_timestamp_is_rejected() {
    let app = app();
    let body = json!({ "type": "payment_intent.succeeded" }).to_string();
    for ts in [i64::MIN, i64::MAX] {
        let request = Request::post("/api/webhooks/stripe")
            .header("Stripe-Signature", format!("t={ts},v1=00"))
            .body(Body::from(body.clone()))
            .unwrap();
        let response = common::send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "t={ts}");
    }
}

#[tokio::test]
async fn signed_stripe_event_without_order_reference_is_acknowledged() {
    let app = app();
    let body = json!({ "type": "customer.created", "data": { "object": { "id": "cus_1" } } })
        .to_string();
    let now = chrono::Utc::now().timestamp();
    let request = Request::post("/api/webhooks/stripe")
        .header(
            "Stripe-Signature",
            sign_payload(body.as_bytes(), common::STRIPE_WEBHOOK_SECRET, now),
        )
        .body(Body::from(body))
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json_body(response).await, json!({ "ok": true }));
}

#[tokio::test]
async fn pagarme_token_mismatch_is_unauthorized() {
    let app = app();
    let request = Request::post("/api/webhooks/pagarme?token=wrong")
        .body(Body::from(json!({ "type": "order.paid" }).to_string()))
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pagarme_event_without_identifier_is_a_noop() {
    let app = app();
    let uri = format!("/api/webhooks/pagarme?token={}", common::PAGARME_TOKEN);
    let request = Request::post(uri.as_str())
        .body(Body::from(json!({ "type": "order.paid", "data": { "status": "paid" } }).to_string()))
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(common::json_body(response).await, json!({ "ok": true }));
}
