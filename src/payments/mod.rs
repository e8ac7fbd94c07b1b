//! Outbound payment gateway calls and inbound webhook parsing.

pub mod events;
pub mod stripe;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;

pub const PROVIDER_STRIPE: &str = "stripe";
pub const PROVIDER_PAGARME: &str = "pagarme";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionLine {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub customer_email: Option<String>,
    pub currency: String,
    pub lines: Vec<SessionLine>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted payment provider used for in-page card forms and hosted checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn create_payment_intent(
        &self,
        order_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> AppResult<PaymentIntent>;

    async fn retrieve_payment_intent(&self, intent_id: &str) -> AppResult<PaymentIntent>;

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession>;
}
