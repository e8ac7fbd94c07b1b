use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Admin product form. Every field is optional so the same shape serves
/// create and partial update; list fields accept an array or text with one
/// entry per comma or line.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub badge: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub price_cents: Option<Value>,
    pub hero_image: Option<String>,
    #[schema(value_type = Option<Vec<String>>)]
    pub images: Option<Value>,
    #[schema(value_type = Option<Vec<String>>)]
    pub sizes: Option<Value>,
    #[schema(value_type = Option<Vec<String>>)]
    pub colors: Option<Value>,
    pub catalog_node_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CatalogNodeInput {
    pub kind: Option<String>,
    pub parent_id: Option<String>,
    pub label: Option<String>,
    pub slug: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub sort_order: Option<Value>,
}
