use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    dto::orders::{PatchShippingRequest, PaymentIntentResponse},
    entity::orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    models::{OrderStatus, OrderWithItems},
    payments::PaymentGateway,
    response::OkResponse,
    services::order_service,
    state::AppState,
};

/// Prefix of gateway references that are already payment intents.
const INTENT_PREFIX: &str = "pi_";

async fn find_by_token(state: &AppState, token: &str) -> AppResult<Option<OrderModel>> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    Ok(Orders::find()
        .filter(OrderCol::PublicToken.eq(token))
        .one(&state.orm)
        .await?)
}

pub async fn get_by_token(state: &AppState, token: &str) -> AppResult<OrderWithItems> {
    let order = find_by_token(state, token).await?.ok_or(AppError::NotFound)?;
    order_service::with_items(state, order).await
}

/// Overwrite the order's shipping contact. Blank fields are stored as null;
/// an unknown token is silently a no-op.
pub async fn patch_shipping(
    state: &AppState,
    token: &str,
    payload: PatchShippingRequest,
) -> AppResult<OkResponse> {
    let shipping = payload.shipping.normalized();

    let result = Orders::update_many()
        .col_expr(OrderCol::ShippingName, Expr::value(shipping.name))
        .col_expr(OrderCol::ShippingPhone, Expr::value(shipping.phone))
        .col_expr(OrderCol::ShippingAddress, Expr::value(shipping.address))
        .col_expr(OrderCol::ShippingCity, Expr::value(shipping.city))
        .col_expr(OrderCol::ShippingState, Expr::value(shipping.state))
        .col_expr(OrderCol::ShippingZip, Expr::value(shipping.zip))
        .col_expr(OrderCol::ShippingNotes, Expr::value(shipping.notes))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(OrderCol::PublicToken.eq(token.trim()))
        .exec(&state.orm)
        .await?;

    tracing::debug!(rows = result.rows_affected, "public order shipping updated");
    Ok(OkResponse::ok())
}

/// The fields of an order that decide how it gets paid.
#[derive(Debug, Clone)]
pub struct PayableOrder {
    pub id: Uuid,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub gateway_order_id: Option<String>,
}

/// Result of resolving the intent for an order. `created` is set when a
/// new intent was opened and its id must be stored on the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIntent {
    pub client_secret: String,
    pub created: Option<String>,
}

/// Reuse the order's existing payment intent or open a new one.
///
/// Creation is keyed on the order id at the gateway, so two concurrent
/// callers for a fresh order end up with the same intent.
pub async fn resolve_client_secret(
    gateway: &dyn PaymentGateway,
    order: &PayableOrder,
    currency: &str,
) -> AppResult<ResolvedIntent> {
    if order.status.is_settled() || order.total_cents <= 0 {
        return Err(AppError::OrderNotPayable);
    }

    if let Some(existing) = order
        .gateway_order_id
        .as_deref()
        .filter(|id| id.starts_with(INTENT_PREFIX))
    {
        let intent = gateway.retrieve_payment_intent(existing).await?;
        if let Some(client_secret) = intent.client_secret {
            return Ok(ResolvedIntent {
                client_secret,
                created: None,
            });
        }
        tracing::warn!(intent_id = existing, "stored intent has no client secret; opening a new one");
    }

    let intent = gateway
        .create_payment_intent(order.id, order.total_cents, currency)
        .await?;
    let client_secret = intent
        .client_secret
        .ok_or_else(|| AppError::Upstream("payment intent returned without client secret".into()))?;

    Ok(ResolvedIntent {
        client_secret,
        created: Some(intent.id),
    })
}

pub async fn create_payment_intent(state: &AppState, token: &str) -> AppResult<PaymentIntentResponse> {
    let order = find_by_token(state, token).await?.ok_or(AppError::NotFound)?;
    let gateway = state
        .payments
        .clone()
        .ok_or_else(|| AppError::Upstream("payment gateway is not configured".into()))?;
    let status = order
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;

    let payable = PayableOrder {
        id: order.id,
        status,
        total_cents: order.total_cents,
        gateway_order_id: order.gateway_order_id.clone(),
    };

    let resolved = resolve_client_secret(gateway.as_ref(), &payable, &state.config.currency).await?;

    if let Some(intent_id) = resolved.created {
        Orders::update_many()
            .col_expr(OrderCol::GatewayProvider, Expr::value(gateway.provider()))
            .col_expr(OrderCol::GatewayOrderId, Expr::value(intent_id.clone()))
            .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(OrderCol::Id.eq(order.id))
            .exec(&state.orm)
            .await?;
        tracing::info!(order_id = %order.id, %intent_id, "payment intent opened");
    }

    Ok(PaymentIntentResponse {
        client_secret: resolved.client_secret,
    })
}
