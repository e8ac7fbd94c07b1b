use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;

use crate::{
    error::AppResult,
    payments::events::{PaymentProviderAdapter, WebhookRequest},
    response::OkResponse,
    routes::params::{AppQuery, WebhookQuery},
    services::reconcile_service,
    state::AppState,
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pagarme", post(pagarme_webhook))
        .route("/stripe", post(stripe_webhook))
}

async fn handle(
    state: &AppState,
    adapter: &dyn PaymentProviderAdapter,
    request: WebhookRequest<'_>,
) -> AppResult<Json<OkResponse>> {
    let event = adapter.accept(&request).inspect_err(|err| {
        tracing::warn!(provider = adapter.provider(), error = %err, "webhook rejected");
    })?;
    reconcile_service::reconcile(state, event).await?;
    Ok(Json(OkResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/pagarme",
    params(("token" = Option<String>, Query, description = "Shared secret, checked when configured")),
    request_body(content = serde_json::Value, description = "Provider event payload"),
    responses(
        (status = 200, description = "Event acknowledged", body = OkResponse),
        (status = 401, description = "Token mismatch"),
    ),
    tag = "Webhooks"
)]
pub async fn pagarme_webhook(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<WebhookQuery>,
    body: Bytes,
) -> AppResult<Json<OkResponse>> {
    let request = WebhookRequest {
        signature: None,
        query_token: query.token.as_deref(),
        body: &body,
        now: Utc::now().timestamp(),
    };
    handle(&state, state.pagarme.as_ref(), request).await
}

#[utoipa::path(
    post,
    path = "/api/webhooks/stripe",
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    request_body(content = serde_json::Value, description = "Raw signed event"),
    responses(
        (status = 200, description = "Event acknowledged", body = OkResponse),
        (status = 400, description = "Missing or invalid signature"),
        (status = 500, description = "Internal Server Error"),
    ),
    tag = "Webhooks"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<OkResponse>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let request = WebhookRequest {
        signature,
        query_token: None,
        body: &body,
        now: Utc::now().timestamp(),
    };
    handle(&state, state.stripe_webhooks.as_ref(), request).await
}
