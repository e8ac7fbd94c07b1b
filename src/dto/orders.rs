use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ShippingFields;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutProvider {
    #[default]
    Whatsapp,
    Stripe,
}

impl CheckoutProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckoutProvider::Whatsapp => "whatsapp",
            CheckoutProvider::Stripe => "stripe",
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub provider: Option<CheckoutProvider>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub ok: bool,
    pub order_id: Uuid,
    pub public_token: String,
    pub total_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

/// Body of `PATCH /api/orders/public/{token}`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PatchShippingRequest {
    #[serde(flatten)]
    pub shipping: ShippingFields,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
}

/// Admin patch: either field may be sent alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminOrderPatch {
    pub status: Option<String>,
    /// Empty string clears the link.
    pub payment_link: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminContext {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_admin: bool,
}
