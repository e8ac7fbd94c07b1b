use axum::{Router, routing::get};

use crate::{error::AppError, state::AppState};

pub mod account;
pub mod admin;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod webhooks;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/account", account::router())
        .nest("/webhooks", webhooks::router())
        .nest("/admin", admin::router())
}

/// Full application router with state bound; transport layers are added
/// by the binary.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
