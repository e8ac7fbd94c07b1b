use axum::{Json, Router, extract::State, routing::get};

use crate::{
    error::AppResult,
    landing::LandingContent,
    models::{CatalogNode, Product},
    response::{ItemResponse, ListResponse},
    routes::params::{AppPath, AppQuery, ProductQuery},
    services::{catalog_service, landing_service, product_service},
    state::AppState,
};

/// Public catalog: products, catalog tree and landing content.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{slug}", get(get_product))
        .route("/catalog-nodes", get(list_catalog_nodes))
        .route("/landing", get(get_landing))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search name, brand or description"),
        ("category" = Option<String>, Query, description = "Exact category, case-insensitive"),
        ("catalog_node_id" = Option<uuid::Uuid>, Query, description = "Catalog node"),
        ("sort_by" = Option<String>, Query, description = "Sort by: created_at, price, name"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "List products", body = ListResponse<Product>),
        (status = 400, description = "Invalid query"),
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ProductQuery>,
) -> AppResult<Json<ListResponse<Product>>> {
    let resp = product_service::list_products(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product detail", body = ItemResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(slug): AppPath<String>,
) -> AppResult<Json<ItemResponse<Product>>> {
    let product = product_service::get_by_slug(&state, &slug).await?;
    Ok(Json(ItemResponse::new(product)))
}

#[utoipa::path(
    get,
    path = "/api/catalog-nodes",
    responses((status = 200, description = "All catalog nodes in display order", body = ListResponse<CatalogNode>)),
    tag = "Catalog"
)]
pub async fn list_catalog_nodes(
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<CatalogNode>>> {
    let resp = catalog_service::list_nodes(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/landing",
    responses((status = 200, description = "Landing page content", body = ItemResponse<LandingContent>)),
    tag = "Catalog"
)]
pub async fn get_landing(
    State(state): State<AppState>,
) -> AppResult<Json<ItemResponse<LandingContent>>> {
    let content = landing_service::get_landing(&state).await?;
    Ok(Json(ItemResponse::new(content)))
}
