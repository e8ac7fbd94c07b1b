use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{PatchShippingRequest, PaymentIntentResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, OrderWithItems},
    response::{ItemResponse, ListResponse, OkResponse},
    routes::params::{AppJson, AppPath, AppQuery, OrderListQuery},
    services::{order_service, public_order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route(
            "/public/{token}",
            get(get_public_order).patch(patch_public_order),
        )
        .route("/public/{token}/payment-intent", post(create_payment_intent))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders of the current user", body = ListResponse<Order>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ListResponse<Order>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ItemResponse<OrderWithItems>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ItemResponse<OrderWithItems>>> {
    let order = order_service::get_order(&state, &user, id).await?;
    Ok(Json(ItemResponse::new(order)))
}

#[utoipa::path(
    get,
    path = "/api/orders/public/{token}",
    params(("token" = String, Path, description = "Public order token")),
    responses(
        (status = 200, description = "Order with items", body = ItemResponse<OrderWithItems>),
        (status = 404, description = "Unknown token"),
    ),
    tag = "Public orders"
)]
pub async fn get_public_order(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
) -> AppResult<Json<ItemResponse<OrderWithItems>>> {
    let order = public_order_service::get_by_token(&state, &token).await?;
    Ok(Json(ItemResponse::new(order)))
}

#[utoipa::path(
    patch,
    path = "/api/orders/public/{token}",
    params(("token" = String, Path, description = "Public order token")),
    request_body = PatchShippingRequest,
    responses(
        (status = 200, description = "Shipping fields stored", body = OkResponse),
        (status = 500, description = "Internal Server Error"),
    ),
    tag = "Public orders"
)]
pub async fn patch_public_order(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
    AppJson(payload): AppJson<PatchShippingRequest>,
) -> AppResult<Json<OkResponse>> {
    let resp = public_order_service::patch_shipping(&state, &token, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/public/{token}/payment-intent",
    params(("token" = String, Path, description = "Public order token")),
    responses(
        (status = 200, description = "Client secret for the in-page card form", body = PaymentIntentResponse),
        (status = 400, description = "Order already paid or canceled"),
        (status = 404, description = "Unknown token"),
        (status = 500, description = "Payment gateway failure"),
    ),
    tag = "Public orders"
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    AppPath(token): AppPath<String>,
) -> AppResult<Json<PaymentIntentResponse>> {
    let resp = public_order_service::create_payment_intent(&state, &token).await?;
    Ok(Json(resp))
}
