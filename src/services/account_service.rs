use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{ShippingFields, UserAddress},
    response::OkResponse,
};

/// The caller's saved address; an empty one when nothing was saved yet.
pub async fn get_address(pool: &DbPool, user: &AuthUser) -> AppResult<UserAddress> {
    let row = sqlx::query_as::<_, UserAddress>(
        r#"
        SELECT user_id, name, phone, address, city, state, zip, notes, updated_at
        FROM user_addresses
        WHERE user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.unwrap_or_else(|| empty_address(user.user_id)))
}

pub async fn save_address(
    pool: &DbPool,
    user: &AuthUser,
    fields: ShippingFields,
) -> AppResult<OkResponse> {
    let fields = fields.normalized();

    sqlx::query(
        r#"
        INSERT INTO user_addresses (user_id, name, phone, address, city, state, zip, notes, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
        ON CONFLICT (user_id) DO UPDATE
        SET name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            address = EXCLUDED.address,
            city = EXCLUDED.city,
            state = EXCLUDED.state,
            zip = EXCLUDED.zip,
            notes = EXCLUDED.notes,
            updated_at = now()
        "#,
    )
    .bind(user.user_id)
    .bind(fields.name)
    .bind(fields.phone)
    .bind(fields.address)
    .bind(fields.city)
    .bind(fields.state)
    .bind(fields.zip)
    .bind(fields.notes)
    .execute(pool)
    .await?;

    Ok(OkResponse::ok())
}

fn empty_address(user_id: Uuid) -> UserAddress {
    UserAddress {
        user_id,
        name: None,
        phone: None,
        address: None,
        city: None,
        state: None,
        zip: None,
        notes: None,
        updated_at: chrono::Utc::now(),
    }
}
