use chrono::Utc;
use rand::Rng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::{DbPool, OrderItemSchema},
    dto::orders::{CheckoutProvider, CheckoutRequest, CheckoutResponse},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        carts::Entity as Carts,
        order_items::{ActiveModel as OrderItemActive, Entity as OrderItems},
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, OrderWithItems, ProductSnapshot, ShippingFields},
    payments::{CheckoutSessionRequest, SessionLine},
    pricing::{self, CartLine, PricedCart},
    response::{ListResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service,
    state::AppState,
};

/// Unguessable token granting access to a single order without logging in.
pub fn generate_public_token() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<CheckoutResponse> {
    let provider = payload.provider.unwrap_or_default();
    let gateway = match provider {
        CheckoutProvider::Stripe => Some(state.payments.clone().ok_or_else(|| {
            AppError::Upstream("payment gateway is not configured".into())
        })?),
        CheckoutProvider::Whatsapp => None,
    };

    let cart_id = cart_service::find_cart(&state.pool, user.user_id)
        .await?
        .ok_or(AppError::EmptyCart)?;

    let txn = state.orm.begin().await?;

    // Concurrent checkouts of one cart queue here; the later one then reads
    // the swept cart and fails with EmptyCart.
    Carts::find_by_id(cart_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(AppError::EmptyCart)?;

    let rows = CartItems::find()
        .filter(CartCol::CartId.eq(cart_id))
        .order_by_asc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(&txn)
        .await?;

    let swept: Vec<Uuid> = rows.iter().map(|(item, _)| item.id).collect();
    let lines = rows
        .into_iter()
        .map(|(item, product)| {
            let (name, unit_price_cents) = product
                .map(|p| (p.name, p.price_cents))
                .unwrap_or_default();
            CartLine {
                product_id: item.product_id,
                name,
                quantity: item.quantity,
                unit_price_cents,
            }
        })
        .collect();

    // Dropping `txn` on an early return rolls it back.
    let priced = pricing::price_cart(lines)?;

    if gateway.is_some() && priced.lines.iter().any(|l| l.unit_price_cents <= 0) {
        return Err(AppError::BadRequest(
            "cart has items priced on request; use the WhatsApp checkout".into(),
        ));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user.user_id)),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        total_cents: Set(priced.total_cents),
        email: Set(user.email.clone()),
        source: Set(provider.as_str().to_string()),
        payment_link: Set(None),
        public_token: Set(generate_public_token()),
        gateway_provider: Set(None),
        gateway_order_id: Set(None),
        shipping_name: Set(None),
        shipping_phone: Set(None),
        shipping_address: Set(None),
        shipping_city: Set(None),
        shipping_state: Set(None),
        shipping_zip: Set(None),
        shipping_notes: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let with_prices = state.order_item_schema.has_prices();
    let items = priced.lines.iter().map(|line| OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(line.product_id),
        quantity: Set(line.quantity),
        unit_price_cents: if with_prices {
            Set(Some(line.unit_price_cents))
        } else {
            NotSet
        },
        line_total_cents: if with_prices {
            Set(Some(line.line_total_cents))
        } else {
            NotSet
        },
        created_at: NotSet,
    });
    OrderItems::insert_many(items)
        .exec_without_returning(&txn)
        .await?;

    // clear cart; the cart row itself is kept for reuse
    CartItems::delete_many()
        .filter(CartCol::Id.is_in(swept))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        total_cents = order.total_cents,
        provider = provider.as_str(),
        "order created from cart"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_cents": order.total_cents }),
    )
    .await;

    let mut response = CheckoutResponse {
        ok: true,
        order_id: order.id,
        public_token: order.public_token.clone(),
        total_cents: order.total_cents,
        whatsapp_url: None,
        checkout_url: None,
    };

    match gateway {
        None => {
            let message = pricing::whatsapp_message(order.id, &priced);
            response.whatsapp_url = Some(pricing::whatsapp_url(
                &state.config.whatsapp_number,
                &message,
            ));
        }
        Some(gateway) => {
            let request = session_request(state, &order, &priced);
            let session = gateway.create_checkout_session(request).await?;
            Orders::update_many()
                .col_expr(OrderCol::PaymentLink, Expr::value(session.url.clone()))
                .col_expr(OrderCol::GatewayProvider, Expr::value(gateway.provider()))
                .col_expr(OrderCol::GatewayOrderId, Expr::value(session.id.clone()))
                .col_expr(OrderCol::UpdatedAt, Expr::value(Utc::now()))
                .filter(OrderCol::Id.eq(order.id))
                .exec(&state.orm)
                .await?;
            response.checkout_url = session.url;
        }
    }

    Ok(response)
}

fn session_request(state: &AppState, order: &OrderModel, priced: &PricedCart) -> CheckoutSessionRequest {
    let order_page = format!("{}/pedido/{}", state.config.site_url, order.public_token);
    CheckoutSessionRequest {
        order_id: order.id,
        customer_email: order.email.clone(),
        currency: state.config.currency.clone(),
        lines: priced
            .lines
            .iter()
            .map(|line| SessionLine {
                name: line.name.clone(),
                unit_amount_cents: line.unit_price_cents,
                quantity: line.quantity,
            })
            .collect(),
        success_url: format!("{order_page}?pagamento=sucesso"),
        cancel_url: format!("{order_page}?pagamento=cancelado"),
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ListResponse<Order>> {
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status));
    }
    paged_orders(state, condition, &query).await
}

/// Shared by the account and admin order listings.
pub async fn paged_orders(
    state: &AppState,
    condition: Condition,
    query: &OrderListQuery,
) -> AppResult<ListResponse<Order>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ListResponse::paged(orders, Meta::new(page, limit, total)))
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<OrderWithItems> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    with_items(state, order).await
}

pub async fn with_items(state: &AppState, order: OrderModel) -> AppResult<OrderWithItems> {
    let items = load_items(&state.pool, state.order_item_schema, order.id).await?;
    Ok(OrderWithItems {
        order: order_from_entity(order)?,
        items,
    })
}

#[derive(FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price_cents: Option<i64>,
    line_total_cents: Option<i64>,
    name: Option<String>,
    slug: Option<String>,
    price_cents: Option<i64>,
    hero_image: Option<String>,
    sizes: Option<Vec<String>>,
}

const FULL_ITEMS_QUERY: &str = r#"
    SELECT oi.id, oi.order_id, oi.product_id, oi.quantity,
           oi.unit_price_cents, oi.line_total_cents,
           p.name, p.slug, p.price_cents, p.hero_image, p.sizes
    FROM order_items oi
    LEFT JOIN products p ON p.id = oi.product_id
    WHERE oi.order_id = $1
    ORDER BY oi.created_at ASC
"#;

const MINIMAL_ITEMS_QUERY: &str = r#"
    SELECT oi.id, oi.order_id, oi.product_id, oi.quantity,
           NULL::BIGINT AS unit_price_cents, NULL::BIGINT AS line_total_cents,
           p.name, p.slug, p.price_cents, p.hero_image, p.sizes
    FROM order_items oi
    LEFT JOIN products p ON p.id = oi.product_id
    WHERE oi.order_id = $1
"#;

pub async fn load_items(
    pool: &DbPool,
    schema: OrderItemSchema,
    order_id: Uuid,
) -> AppResult<Vec<OrderItem>> {
    let sql = match schema {
        OrderItemSchema::Full => FULL_ITEMS_QUERY,
        OrderItemSchema::Minimal => MINIMAL_ITEMS_QUERY,
    };

    let rows = sqlx::query_as::<_, OrderItemRow>(sql)
        .bind(order_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
            product: row.name.map(|name| ProductSnapshot {
                id: row.product_id,
                name,
                slug: row.slug.unwrap_or_default(),
                price_cents: row.price_cents,
                hero_image: row.hero_image,
                sizes: row.sizes.unwrap_or_default(),
            }),
        })
        .collect())
}

pub fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        status,
        total_cents: model.total_cents,
        email: model.email,
        source: model.source,
        payment_link: model.payment_link,
        public_token: model.public_token,
        gateway_provider: model.gateway_provider,
        gateway_order_id: model.gateway_order_id,
        shipping: ShippingFields {
            name: model.shipping_name,
            phone: model.shipping_phone,
            address: model.shipping_address,
            city: model.shipping_city,
            state: model.shipping_state,
            zip: model.shipping_zip,
            notes: model.shipping_notes,
        },
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
