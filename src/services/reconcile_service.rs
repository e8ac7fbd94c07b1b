use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::{
    audit,
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::AppResult,
    payments::events::{OrderTarget, PaymentEvent},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The event did not name an order; acknowledged without changes.
    Ignored,
    Applied { rows: u64 },
}

/// Apply a normalized provider event to the order it refers to.
///
/// Redelivery of the same event is harmless: every column is set to the
/// same value again. Shipping fields are only overwritten when the event
/// carries them.
pub async fn reconcile(state: &AppState, event: PaymentEvent) -> AppResult<ReconcileOutcome> {
    let Some(target) = event.target.clone() else {
        tracing::info!(
            provider = event.provider,
            event_type = %event.event_type,
            "webhook event without order reference ignored"
        );
        return Ok(ReconcileOutcome::Ignored);
    };

    let mut update = Orders::update_many()
        .col_expr(OrderCol::GatewayProvider, Expr::value(event.provider))
        .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()));

    if let Some(status) = event.status {
        update = update.col_expr(OrderCol::Status, Expr::value(status.as_str()));
    }
    if let Some(reference) = event.external_ref.clone() {
        update = update.col_expr(OrderCol::GatewayOrderId, Expr::value(reference));
    }
    if let Some(shipping) = event.shipping.clone().filter(|s| !s.is_empty()) {
        let fields = [
            (OrderCol::ShippingName, shipping.name),
            (OrderCol::ShippingPhone, shipping.phone),
            (OrderCol::ShippingAddress, shipping.address),
            (OrderCol::ShippingCity, shipping.city),
            (OrderCol::ShippingState, shipping.state),
            (OrderCol::ShippingZip, shipping.zip),
        ];
        for (column, value) in fields {
            if let Some(value) = value {
                update = update.col_expr(column, Expr::value(value));
            }
        }
    }

    update = match &target {
        OrderTarget::Id(id) => update.filter(OrderCol::Id.eq(*id)),
        OrderTarget::GatewayRef(reference) => {
            update.filter(OrderCol::GatewayOrderId.eq(reference.as_str()))
        }
    };

    let result = update.exec(&state.orm).await?;

    tracing::info!(
        provider = event.provider,
        event_type = %event.event_type,
        status = ?event.status,
        rows = result.rows_affected,
        "payment webhook reconciled"
    );

    audit::record(
        &state.pool,
        None,
        "payment_webhook",
        "orders",
        serde_json::json!({
            "provider": event.provider,
            "event_type": event.event_type,
            "target": describe_target(&target),
            "status": event.status.map(|s| s.as_str()),
            "rows": result.rows_affected,
        }),
    )
    .await;

    Ok(ReconcileOutcome::Applied {
        rows: result.rows_affected,
    })
}

fn describe_target(target: &OrderTarget) -> String {
    match target {
        OrderTarget::Id(id) => id.to_string(),
        OrderTarget::GatewayRef(reference) => reference.clone(),
    }
}
