use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::ProductInput,
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::AdminUser,
    models::Product,
    pricing,
    response::{ListResponse, Meta, OkResponse},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const CLOTHING_SIZES: [&str; 4] = ["P", "M", "G", "GG"];
const ONE_SIZE: &str = "Único";

pub async fn list_products(state: &AppState, query: ProductQuery) -> AppResult<ListResponse<Product>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Brand).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(Column::Category).ilike(category));
    }

    if let Some(node_id) = query.catalog_node_id {
        condition = condition.add(Column::CatalogNodeId.eq(node_id));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::PriceCents,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ListResponse::paged(items, Meta::new(page, limit, total)))
}

pub async fn get_by_slug(state: &AppState, slug: &str) -> AppResult<Product> {
    Products::find()
        .filter(Column::Slug.eq(slug.trim()))
        .order_by_asc(Column::CreatedAt)
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or(AppError::NotFound)
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<Product> {
    Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity)
        .ok_or(AppError::NotFound)
}

pub async fn create_product(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    payload: ProductInput,
) -> AppResult<Product> {
    let name = clean_text(payload.name)
        .ok_or_else(|| AppError::BadRequest("name is required".into()))?;
    let slug = clean_text(payload.slug)
        .map(|s| slugify(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| slugify(&name));
    let category = clean_text(payload.category);

    let mut sizes = payload.sizes.as_ref().map(parse_list).unwrap_or_default();
    if sizes.is_empty() {
        sizes = default_sizes(category.as_deref());
    }

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        slug: Set(slug),
        category: Set(category),
        brand: Set(clean_text(payload.brand)),
        badge: Set(clean_text(payload.badge)),
        description: Set(clean_text(payload.description)),
        price_cents: Set(coerce_price(payload.price_cents.as_ref())?),
        hero_image: Set(clean_text(payload.hero_image)),
        images: Set(payload.images.as_ref().map(parse_list).unwrap_or_default()),
        sizes: Set(sizes),
        colors: Set(payload.colors.as_ref().map(parse_list).unwrap_or_default()),
        catalog_node_id: Set(parse_optional_id(payload.catalog_node_id, "catalog_node_id")?),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(product_from_entity(product))
}

pub async fn update_product(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    id: Uuid,
    payload: ProductInput,
) -> AppResult<Product> {
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let category = payload.category.map(|c| clean_text(Some(c)));
    let effective_category = category.clone().unwrap_or_else(|| existing.category.clone());

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(slug) = payload.slug {
        let slug = slugify(&slug);
        if !slug.is_empty() {
            active.slug = Set(slug);
        }
    }
    if let Some(category) = category {
        active.category = Set(category);
    }
    if payload.brand.is_some() {
        active.brand = Set(clean_text(payload.brand));
    }
    if payload.badge.is_some() {
        active.badge = Set(clean_text(payload.badge));
    }
    if payload.description.is_some() {
        active.description = Set(clean_text(payload.description));
    }
    if payload.price_cents.is_some() {
        active.price_cents = Set(coerce_price(payload.price_cents.as_ref())?);
    }
    if payload.hero_image.is_some() {
        active.hero_image = Set(clean_text(payload.hero_image));
    }
    if let Some(images) = payload.images.as_ref() {
        active.images = Set(parse_list(images));
    }
    if let Some(colors) = payload.colors.as_ref() {
        active.colors = Set(parse_list(colors));
    }
    if let Some(sizes) = payload.sizes.as_ref() {
        let mut sizes = parse_list(sizes);
        if sizes.is_empty() {
            sizes = default_sizes(effective_category.as_deref());
        }
        active.sizes = Set(sizes);
    }
    if payload.catalog_node_id.is_some() {
        active.catalog_node_id = Set(parse_optional_id(payload.catalog_node_id, "catalog_node_id")?);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(product_from_entity(product))
}

pub async fn delete_product(
    state: &AppState,
    AdminUser(admin): &AdminUser,
    id: Uuid,
) -> AppResult<OkResponse> {
    let result = Products::delete_by_id(id)
        .exec(&state.orm)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::BadRequest("product is referenced by existing orders".into())
            }
            _ => AppError::from(err),
        })?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(admin.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(OkResponse::ok())
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        price_label: pricing::price_label(model.price_cents),
        id: model.id,
        name: model.name,
        slug: model.slug,
        category: model.category,
        brand: model.brand,
        badge: model.badge,
        description: model.description,
        price_cents: model.price_cents,
        hero_image: model.hero_image,
        images: model.images,
        sizes: model.sizes,
        colors: model.colors,
        catalog_node_id: model.catalog_node_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

/// Trimmed text, with blank collapsing to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_optional_id(value: Option<String>, field: &str) -> AppResult<Option<Uuid>> {
    match clean_text(value) {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(&raw)
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{field} is invalid"))),
    }
}

/// Price in cents from a JSON number or numeric text. Negative values clamp
/// to zero, fractions round; null or blank means "price on request".
pub fn coerce_price(value: Option<&Value>) -> AppResult<Option<i64>> {
    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
        Some(_) => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(Some(n.round().max(0.0).min(i64::MAX as f64) as i64)),
        _ => Err(AppError::BadRequest("price_cents must be a number".into())),
    }
}

/// List field from an array of strings or comma/newline separated text.
pub fn parse_list(value: &Value) -> Vec<String> {
    let entries: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Value::String(text) => text
            .split([',', '\n', '\r'])
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Size grid used when a product is saved without explicit sizes.
pub fn default_sizes(category: Option<&str>) -> Vec<String> {
    let key = category.map(slugify).unwrap_or_default();

    const CLOTHING: [&str; 9] = [
        "roupa", "vestuario", "camis", "blusa", "moletom", "jaqueta", "calca", "clothing", "apparel",
    ];
    const FOOTWEAR: [&str; 7] = ["calcado", "tenis", "sapato", "bota", "sandalia", "footwear", "sneaker"];

    if FOOTWEAR.iter().any(|k| key.contains(k)) {
        return (37..=44).map(|n| n.to_string()).collect();
    }
    if CLOTHING.iter().any(|k| key.contains(k)) {
        return CLOTHING_SIZES.iter().map(|s| s.to_string()).collect();
    }
    vec![ONE_SIZE.to_string()]
}

/// Lowercase ASCII slug: accents folded, everything else collapsed to `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.trim().chars().flat_map(char::to_lowercase) {
        let ch = fold_accent(ch);
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}
