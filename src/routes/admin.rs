use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    dto::{
        orders::{AdminContext, AdminOrderPatch},
        products::{CatalogNodeInput, ProductInput},
    },
    error::AppResult,
    landing::LandingContent,
    middleware::auth::AdminUser,
    models::{CatalogNode, Order, OrderWithItems, Product},
    response::{ItemResponse, ListResponse, OkResponse},
    routes::params::{AppJson, AppPath, AppQuery, OrderListQuery, ProductQuery},
    services::{admin_service, catalog_service, landing_service, product_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(admin_me))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/catalog-nodes", get(list_catalog_nodes).post(create_catalog_node))
        .route(
            "/catalog-nodes/{id}",
            axum::routing::put(update_catalog_node).delete(delete_catalog_node),
        )
        .route("/orders", get(list_all_orders))
        .route("/orders/{id}", get(get_order_admin).patch(update_order))
        .route("/landing", get(get_landing).put(save_landing))
}

#[utoipa::path(
    get,
    path = "/api/admin/me",
    responses(
        (status = 200, description = "Caller's admin context", body = AdminContext),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn admin_me(admin: AdminUser) -> Json<AdminContext> {
    Json(admin_service::admin_context(&admin))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search name, brand or description")
    ),
    responses(
        (status = 200, description = "Products (admin)", body = ListResponse<Product>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<ProductQuery>,
) -> AppResult<Json<ListResponse<Product>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ItemResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ItemResponse<Product>>> {
    let product = product_service::get_product(&state, id).await?;
    Ok(Json(ItemResponse::new(product)))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product created", body = ItemResponse<Product>),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_product(
    State(state): State<AppState>,
    admin: AdminUser,
    AppJson(payload): AppJson<ProductInput>,
) -> AppResult<Json<ItemResponse<Product>>> {
    let product = product_service::create_product(&state, &admin, payload).await?;
    Ok(Json(ItemResponse::new(product)))
}

#[utoipa::path(
    put,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = ItemResponse<Product>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_product(
    State(state): State<AppState>,
    admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ProductInput>,
) -> AppResult<Json<ItemResponse<Product>>> {
    let product = product_service::update_product(&state, &admin, id, payload).await?;
    Ok(Json(ItemResponse::new(product)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = OkResponse),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<OkResponse>> {
    let resp = product_service::delete_product(&state, &admin, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/catalog-nodes",
    responses((status = 200, description = "Catalog nodes", body = ListResponse<CatalogNode>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_catalog_nodes(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ListResponse<CatalogNode>>> {
    let resp = catalog_service::list_nodes(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/catalog-nodes",
    request_body = CatalogNodeInput,
    responses(
        (status = 200, description = "Node created", body = ItemResponse<CatalogNode>),
        (status = 400, description = "Bad request"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_catalog_node(
    State(state): State<AppState>,
    admin: AdminUser,
    AppJson(payload): AppJson<CatalogNodeInput>,
) -> AppResult<Json<ItemResponse<CatalogNode>>> {
    let node = catalog_service::create_node(&state, &admin, payload).await?;
    Ok(Json(ItemResponse::new(node)))
}

#[utoipa::path(
    put,
    path = "/api/admin/catalog-nodes/{id}",
    params(("id" = Uuid, Path, description = "Catalog node ID")),
    request_body = CatalogNodeInput,
    responses(
        (status = 200, description = "Node updated", body = ItemResponse<CatalogNode>),
        (status = 404, description = "Node not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_catalog_node(
    State(state): State<AppState>,
    admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CatalogNodeInput>,
) -> AppResult<Json<ItemResponse<CatalogNode>>> {
    let node = catalog_service::update_node(&state, &admin, id, payload).await?;
    Ok(Json(ItemResponse::new(node)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/catalog-nodes/{id}",
    params(("id" = Uuid, Path, description = "Catalog node ID")),
    responses(
        (status = 200, description = "Node deleted", body = OkResponse),
        (status = 404, description = "Node not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_catalog_node(
    State(state): State<AppState>,
    admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<OkResponse>> {
    let resp = catalog_service::delete_node(&state, &admin, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Get all orders (admin only)", body = ListResponse<Order>),
        (status = 400, description = "Unknown status filter"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal Server Error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> AppResult<Json<ListResponse<Order>>> {
    let resp = admin_service::list_all_orders(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ItemResponse<OrderWithItems>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ItemResponse<OrderWithItems>>> {
    let order = admin_service::get_order_admin(&state, id).await?;
    Ok(Json(ItemResponse::new(order)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = AdminOrderPatch,
    responses(
        (status = 200, description = "Order updated", body = ItemResponse<Order>),
        (status = 400, description = "Invalid status"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order(
    State(state): State<AppState>,
    admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<AdminOrderPatch>,
) -> AppResult<Json<ItemResponse<Order>>> {
    let order = admin_service::update_order(&state, &admin, id, payload).await?;
    Ok(Json(ItemResponse::new(order)))
}

#[utoipa::path(
    get,
    path = "/api/admin/landing",
    responses((status = 200, description = "Landing content (migrated)", body = ItemResponse<LandingContent>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_landing(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ItemResponse<LandingContent>>> {
    let content = landing_service::get_landing(&state).await?;
    Ok(Json(ItemResponse::new(content)))
}

#[utoipa::path(
    put,
    path = "/api/admin/landing",
    request_body = LandingContent,
    responses(
        (status = 200, description = "Landing content saved", body = OkResponse),
        (status = 400, description = "Malformed document"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn save_landing(
    State(state): State<AppState>,
    admin: AdminUser,
    AppJson(document): AppJson<Value>,
) -> AppResult<Json<OkResponse>> {
    let resp = landing_service::save_landing(&state, &admin, document).await?;
    Ok(Json(resp))
}
