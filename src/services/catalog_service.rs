use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use sea_orm::ActiveValue::NotSet;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::CatalogNodeInput,
    entity::catalog_nodes::{ActiveModel, Column, Entity as CatalogNodes, Model as NodeModel},
    error::{AppError, AppResult},
    middleware::auth::AdminUser,
    models::CatalogNode,
    response::{ListResponse, OkResponse},
    services::product_service::{clean_text, parse_optional_id, slugify},
    state::AppState,
};

const DEFAULT_KIND: &str = "category";

/// Every node, siblings in display order. Clients assemble the tree from
/// `parent_id`.
pub async fn list_nodes(state: &AppState) -> AppResult<ListResponse<CatalogNode>> {
    let nodes = CatalogNodes::find()
        .order_by_asc(Column::SortOrder)
        .order_by_asc(Column::Label)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(node_from_entity)
        .collect();
    Ok(ListResponse::new(nodes))
}

pub async fn create_node(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    payload: CatalogNodeInput,
) -> AppResult<CatalogNode> {
    let label = clean_text(payload.label)
        .ok_or_else(|| AppError::BadRequest("label is required".into()))?;
    let slug = clean_text(payload.slug)
        .map(|s| slugify(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&label));

    let node = ActiveModel {
        id: Set(Uuid::new_v4()),
        kind: Set(clean_text(payload.kind).unwrap_or_else(|| DEFAULT_KIND.to_string())),
        parent_id: Set(parse_optional_id(payload.parent_id, "parent_id")?),
        label: Set(label),
        slug: Set(slug),
        logo_url: Set(clean_text(payload.logo_url)),
        banner_url: Set(clean_text(payload.banner_url)),
        sort_order: Set(coerce_sort_order(payload.sort_order.as_ref())?),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "catalog_node_create",
        "catalog_nodes",
        serde_json::json!({ "node_id": node.id }),
    )
    .await;

    Ok(node_from_entity(node))
}

pub async fn update_node(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    id: Uuid,
    payload: CatalogNodeInput,
) -> AppResult<CatalogNode> {
    let existing = CatalogNodes::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    if let Some(kind) = clean_text(payload.kind) {
        active.kind = Set(kind);
    }
    if payload.parent_id.is_some() {
        let parent_id = parse_optional_id(payload.parent_id, "parent_id")?;
        if parent_id == Some(id) {
            return Err(AppError::BadRequest("a node cannot be its own parent".into()));
        }
        active.parent_id = Set(parent_id);
    }
    if let Some(label) = payload.label {
        let label = label.trim().to_string();
        if label.is_empty() {
            return Err(AppError::BadRequest("label cannot be empty".into()));
        }
        active.label = Set(label);
    }
    if let Some(slug) = payload.slug.map(|s| slugify(&s)).filter(|s| !s.is_empty()) {
        active.slug = Set(slug);
    }
    if payload.logo_url.is_some() {
        active.logo_url = Set(clean_text(payload.logo_url));
    }
    if payload.banner_url.is_some() {
        active.banner_url = Set(clean_text(payload.banner_url));
    }
    if payload.sort_order.is_some() {
        active.sort_order = Set(coerce_sort_order(payload.sort_order.as_ref())?);
    }

    let node = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "catalog_node_update",
        "catalog_nodes",
        serde_json::json!({ "node_id": node.id }),
    )
    .await;

    Ok(node_from_entity(node))
}

/// Children and products keep existing; the store nulls their reference.
pub async fn delete_node(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    id: Uuid,
) -> AppResult<OkResponse> {
    let result = CatalogNodes::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "catalog_node_delete",
        "catalog_nodes",
        serde_json::json!({ "node_id": id }),
    )
    .await;

    Ok(OkResponse::ok())
}

/// Whole, non-negative position; missing means 0.
pub fn coerce_sort_order(value: Option<&Value>) -> AppResult<i32> {
    let number = match value {
        None | Some(Value::Null) => return Ok(0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(n.round().clamp(0.0, f64::from(i32::MAX)) as i32),
        _ => Err(AppError::BadRequest("sort_order must be a number".into())),
    }
}

fn node_from_entity(model: NodeModel) -> CatalogNode {
    CatalogNode {
        id: model.id,
        kind: model.kind,
        parent_id: model.parent_id,
        label: model.label,
        slug: model.slug,
        logo_url: model.logo_url,
        banner_url: model.banner_url,
        sort_order: model.sort_order,
    }
}
