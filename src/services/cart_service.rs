use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{
        AddToCartRequest, AddToCartResponse, CartView, RemoveCartItemRequest,
        UpdateCartItemRequest, UpdateCartItemResponse,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, ProductSnapshot},
    response::OkResponse,
};

#[derive(FromRow)]
struct CartWithProductRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    size: Option<String>,
    created_at: DateTime<Utc>,
    name: Option<String>,
    slug: Option<String>,
    price_cents: Option<i64>,
    hero_image: Option<String>,
    sizes: Option<Vec<String>>,
}

/// Parse a quantity sent as a JSON number or numeric string.
///
/// Must be finite and whole; `allow_zero` admits 0 for updates, where it
/// means "remove".
pub fn parse_quantity(value: Option<&Value>, allow_zero: bool) -> AppResult<i32> {
    let invalid = || {
        let bound = if allow_zero { ">= 0" } else { "> 0" };
        AppError::BadRequest(format!("quantity must be a whole number {bound}"))
    };

    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if !number.is_finite() || number.fract() != 0.0 || number > f64::from(i32::MAX) {
        return Err(invalid());
    }
    let min = if allow_zero { 0.0 } else { 1.0 };
    if number < min {
        return Err(invalid());
    }
    Ok(number as i32)
}

pub fn parse_id(value: Option<&str>, field: &str) -> AppResult<Uuid> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} is required")))?;
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("{field} is invalid")))
}

/// Oldest cart of the user, if any.
pub async fn find_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM carts WHERE user_id = $1 ORDER BY created_at ASC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Return the user's cart, creating it on first use. `carts.user_id` is
/// unique, so concurrent first requests converge on one row.
pub async fn ensure_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Uuid> {
    sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(pool)
        .await?;

    find_cart(pool, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart vanished after upsert")))
}

pub async fn list_items(pool: &DbPool, user: &AuthUser) -> AppResult<CartView> {
    let cart_id = ensure_cart(pool, user.user_id).await?;

    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id, ci.product_id, ci.quantity, ci.size, ci.created_at,
               p.name, p.slug, p.price_cents, p.hero_image, p.sizes
        FROM cart_items ci
        LEFT JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            size: row.size,
            created_at: row.created_at,
            product: row.name.map(|name| ProductSnapshot {
                id: row.product_id,
                name,
                slug: row.slug.unwrap_or_default(),
                price_cents: row.price_cents,
                hero_image: row.hero_image,
                sizes: row.sizes.unwrap_or_default(),
            }),
        })
        .collect();

    Ok(CartView { cart_id, items })
}

pub async fn add_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<AddToCartResponse> {
    let product_id = parse_id(payload.product_id.as_deref(), "product_id")?;
    let quantity = parse_quantity(payload.quantity.as_ref(), false)?;
    let size = payload
        .size
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let product_exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    if product_exist.is_none() {
        return Err(AppError::BadRequest("product not found".to_string()));
    }

    let cart_id = ensure_cart(pool, user.user_id).await?;

    // Repeated adds accumulate onto the existing (cart, product) row. A sum
    // past the column range leaves the row untouched and returns nothing.
    let merged: Option<(Uuid, i32)> = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, cart_id, product_id, quantity, size)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (cart_id, product_id) DO UPDATE
        SET quantity = cart_items.quantity + EXCLUDED.quantity,
            size = COALESCE(EXCLUDED.size, cart_items.size)
        WHERE cart_items.quantity::BIGINT + EXCLUDED.quantity <= $6
        RETURNING id, quantity
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .bind(size)
    .bind(i64::from(i32::MAX))
    .fetch_optional(pool)
    .await?;
    let (item_id, merged) = merged.ok_or_else(|| {
        AppError::BadRequest("quantity exceeds the maximum for one cart item".to_string())
    })?;

    tracing::debug!(%cart_id, %product_id, quantity = merged, "cart item added");

    Ok(AddToCartResponse {
        ok: true,
        item_id,
        quantity: merged,
    })
}

pub async fn update_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: UpdateCartItemRequest,
) -> AppResult<UpdateCartItemResponse> {
    let item_id = parse_id(payload.item_id.as_deref(), "item_id")?;
    let quantity = parse_quantity(payload.quantity.as_ref(), true)?;

    if quantity == 0 {
        delete_item(pool, user.user_id, item_id).await?;
        return Ok(UpdateCartItemResponse {
            ok: true,
            quantity: None,
            deleted: Some(true),
        });
    }

    sqlx::query(
        r#"
        UPDATE cart_items SET quantity = $3
        WHERE id = $1
          AND cart_id IN (SELECT id FROM carts WHERE user_id = $2)
        "#,
    )
    .bind(item_id)
    .bind(user.user_id)
    .bind(quantity)
    .execute(pool)
    .await?;

    Ok(UpdateCartItemResponse {
        ok: true,
        quantity: Some(quantity),
        deleted: None,
    })
}

pub async fn remove_item(
    pool: &DbPool,
    user: &AuthUser,
    payload: RemoveCartItemRequest,
) -> AppResult<OkResponse> {
    let item_id = parse_id(payload.item_id.as_deref(), "item_id")?;
    delete_item(pool, user.user_id, item_id).await?;
    Ok(OkResponse::ok())
}

/// Idempotent: deleting a missing item is not an error.
async fn delete_item(pool: &DbPool, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM cart_items
        WHERE id = $1
          AND cart_id IN (SELECT id FROM carts WHERE user_id = $2)
        "#,
    )
    .bind(item_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::debug!(%item_id, removed = result.rows_affected(), "cart item removed");
    Ok(())
}
