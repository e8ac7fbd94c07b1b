use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    models::{ShippingFields, UserAddress},
    response::{ItemResponse, OkResponse},
    routes::params::AppJson,
    services::account_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/address", get(get_address).put(save_address))
}

#[utoipa::path(
    get,
    path = "/api/account/address",
    responses(
        (status = 200, description = "Saved shipping address", body = ItemResponse<UserAddress>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn get_address(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ItemResponse<UserAddress>>> {
    let address = account_service::get_address(&state.pool, &user).await?;
    Ok(Json(ItemResponse::new(address)))
}

#[utoipa::path(
    put,
    path = "/api/account/address",
    request_body = ShippingFields,
    responses(
        (status = 200, description = "Address saved", body = OkResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn save_address(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(fields): AppJson<ShippingFields>,
) -> AppResult<Json<OkResponse>> {
    let resp = account_service::save_address(&state.pool, &user, fields).await?;
    Ok(Json(resp))
}
