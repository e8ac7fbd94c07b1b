use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait};
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{AdminContext, AdminOrderPatch},
    entity::orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AdminUser,
    models::{Order, OrderStatus, OrderWithItems},
    response::ListResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn admin_context(AdminUser(admin): &AdminUser) -> AdminContext {
    AdminContext {
        user_id: admin.user_id,
        email: admin.email.clone(),
        is_admin: admin.is_admin,
    }
}

pub async fn list_all_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ListResponse<Order>> {
    let mut condition = Condition::all();
    if let Some(status) = query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let status = parse_status(status)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }
    order_service::paged_orders(state, condition, &query).await
}

pub async fn get_order_admin(state: &AppState, id: Uuid) -> AppResult<OrderWithItems> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    order_service::with_items(state, order).await
}

pub async fn update_order(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    id: Uuid,
    payload: AdminOrderPatch,
) -> AppResult<Order> {
    if payload.status.is_none() && payload.payment_link.is_none() {
        return Err(AppError::BadRequest("nothing to update".into()));
    }
    let status = payload.status.as_deref().map(parse_status).transpose()?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: OrderActive = existing.into();
    if let Some(status) = status {
        active.status = Set(status.as_str().to_string());
    }
    if let Some(link) = payload.payment_link {
        let link = link.trim().to_string();
        active.payment_link = Set((!link.is_empty()).then_some(link));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "order_update",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "status": order.status,
            "payment_link": order.payment_link,
        }),
    )
    .await;

    order_service::order_from_entity(order)
}

pub fn parse_status(raw: &str) -> AppResult<OrderStatus> {
    raw.parse::<OrderStatus>().map_err(AppError::BadRequest)
}
