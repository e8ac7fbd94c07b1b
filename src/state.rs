use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrderItemSchema, OrmConn},
    identity::IdentityGateway,
    payments::{
        PaymentGateway,
        events::{PagarmeAdapter, StripeAdapter},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub identity: Arc<dyn IdentityGateway>,
    /// `None` when no payment gateway credentials are configured.
    pub payments: Option<Arc<dyn PaymentGateway>>,
    pub pagarme: Arc<PagarmeAdapter>,
    pub stripe_webhooks: Arc<StripeAdapter>,
    pub order_item_schema: OrderItemSchema,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        orm: OrmConn,
        config: AppConfig,
        identity: Arc<dyn IdentityGateway>,
        payments: Option<Arc<dyn PaymentGateway>>,
        order_item_schema: OrderItemSchema,
    ) -> Self {
        let pagarme = Arc::new(PagarmeAdapter::new(config.pagarme_webhook_token.clone()));
        let stripe_webhooks = Arc::new(StripeAdapter::new(config.stripe_webhook_secret.clone()));
        Self {
            pool,
            orm,
            config: Arc::new(config),
            identity,
            payments,
            pagarme,
            stripe_webhooks,
            order_item_schema,
        }
    }
}
