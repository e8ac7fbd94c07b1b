use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::CartItem;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Option<String>,
    /// Positive whole number; numeric strings are accepted.
    #[schema(value_type = f64)]
    pub quantity: Option<Value>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub item_id: Option<String>,
    #[schema(value_type = f64)]
    pub quantity: Option<Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveCartItemRequest {
    pub item_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddToCartResponse {
    pub ok: bool,
    pub item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateCartItemResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}
