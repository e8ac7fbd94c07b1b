use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::{
        cart::{
            AddToCartRequest, AddToCartResponse, CartView, RemoveCartItemRequest,
            UpdateCartItemRequest, UpdateCartItemResponse,
        },
        orders::{CheckoutRequest, CheckoutResponse},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::OkResponse,
    routes::params::AppJson,
    services::{cart_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart_list)
                .post(add_to_cart)
                .patch(update_cart_item)
                .delete(remove_from_cart),
        )
        .route("/checkout", post(checkout))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart of the current user, newest items first", body = CartView),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(State(state): State<AppState>, user: AuthUser) -> AppResult<Json<CartView>> {
    let view = cart_service::list_items(&state.pool, &user).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added; repeated adds accumulate", body = AddToCartResponse),
        (status = 400, description = "Invalid product or quantity"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<AddToCartRequest>,
) -> AppResult<Json<AddToCartResponse>> {
    let resp = cart_service::add_item(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart",
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity set; 0 removes the item", body = UpdateCartItemResponse),
        (status = 400, description = "Invalid item or quantity"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpdateCartItemRequest>,
) -> AppResult<Json<UpdateCartItemResponse>> {
    let resp = cart_service::update_item(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    request_body = RemoveCartItemRequest,
    responses(
        (status = 200, description = "Removed (also when already absent)", body = OkResponse),
        (status = 400, description = "Invalid item id"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<RemoveCartItemRequest>,
) -> AppResult<Json<OkResponse>> {
    let resp = cart_service::remove_item(&state.pool, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart/checkout",
    request_body(content = CheckoutRequest, description = "Defaults to the WhatsApp handoff"),
    responses(
        (status = 200, description = "Order created from the cart", body = CheckoutResponse),
        (status = 400, description = "Cart is empty"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Payment gateway failure"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    body: Bytes,
) -> AppResult<Json<CheckoutResponse>> {
    // body is optional
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };

    let resp = order_service::checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}
