use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    AwaitingPayment,
    Paid,
    Confirmed,
    Shipping,
    OutForDelivery,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::AwaitingPayment,
        OrderStatus::Paid,
        OrderStatus::Confirmed,
        OrderStatus::Shipping,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::AwaitingPayment => "awaiting_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipping => "shipping",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Orders in these states can no longer be paid.
    pub fn is_settled(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Canceled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            // legacy spelling still found in older rows
            .or_else(|| (s == "cancelled").then_some(OrderStatus::Canceled))
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub badge: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub price_label: String,
    pub hero_image: Option<String>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub catalog_node_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a product embedded in cart and order lines.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub price_cents: Option<i64>,
    pub hero_image: Option<String>,
    pub sizes: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub size: Option<String>,
    pub created_at: DateTime<Utc>,
    pub product: Option<ProductSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub email: Option<String>,
    pub source: String,
    pub payment_link: Option<String>,
    pub public_token: String,
    pub gateway_provider: Option<String>,
    pub gateway_order_id: Option<String>,
    pub shipping: ShippingFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: Option<i64>,
    pub line_total_cents: Option<i64>,
    pub product: Option<ProductSnapshot>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Shipping contact attached to an order or saved on an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingFields {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ShippingFields {
    /// Trim every field and turn blank strings into `None`.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            name: clean(self.name),
            phone: clean(self.phone),
            address: clean(self.address),
            city: clean(self.city),
            state: clean(self.state),
            zip: clean(self.zip),
            notes: clean(self.notes),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Serialize, ToSchema, FromRow)]
pub struct UserAddress {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogNode {
    pub id: Uuid,
    pub kind: String,
    pub parent_id: Option<Uuid>,
    pub label: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub sort_order: i32,
}
