//! Store-backed flows. Skipped unless TEST_DATABASE_URL or DATABASE_URL is set.

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use solid_choice_api::{
    db::{DbPool, create_pool, orm_from_pool, run_migrations},
    dto::{
        cart::{AddToCartRequest, UpdateCartItemRequest},
        orders::{CheckoutProvider, CheckoutRequest},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::OrderStatus,
    payments::{
        CheckoutSession, CheckoutSessionRequest, PaymentGateway, PaymentIntent, PROVIDER_PAGARME,
        events::{OrderTarget, PaymentEvent},
        stripe::sign_payload,
    },
    services::{cart_service, order_service, public_order_service, reconcile_service},
    services::reconcile_service::ReconcileOutcome,
    state::AppState,
};
use uuid::Uuid;

#[derive(Default)]
struct RecordingGateway {
    intents: Mutex<Vec<PaymentIntent>>,
    sessions: Mutex<Vec<CheckoutSessionRequest>>,
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    fn provider(&self) -> &'static str {
        "stripe"
    }

    async fn create_payment_intent(
        &self,
        order_id: Uuid,
        _amount_cents: i64,
        _currency: &str,
    ) -> AppResult<PaymentIntent> {
        let mut intents = self.intents.lock().unwrap();
        let intent = PaymentIntent {
            id: format!("pi_test_{}", intents.len()),
            client_secret: Some(format!("pi_secret_{order_id}")),
            status: Some("requires_payment_method".into()),
        };
        intents.push(intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
        self.intents
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == intent_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        self.sessions.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", request.order_id),
            url: Some("https://checkout.example/session".into()),
            payment_intent: None,
        })
    }
}

fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run store-backed flow tests.");
            None
        }
    }
}

async fn setup_state(
    database_url: &str,
    identity: common::StubIdentity,
) -> anyhow::Result<(AppState, Arc<RecordingGateway>)> {
    let pool = create_pool(database_url).await?;
    // tests run in parallel; DDL must not race
    MIGRATED
        .get_or_try_init(|| run_migrations_once(&pool))
        .await?;
    let gateway = Arc::new(RecordingGateway::default());
    let payments: Arc<dyn PaymentGateway> = gateway.clone();
    let state = common::build_state(pool, identity, Some(payments));
    Ok((state, gateway))
}

static MIGRATED: OnceCell<()> = OnceCell::const_new();

async fn run_migrations_once(pool: &DbPool) -> anyhow::Result<()> {
    run_migrations(&orm_from_pool(pool)).await
}

async fn insert_product(state: &AppState, name: &str, price_cents: Option<i64>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO products (id, name, slug, price_cents, sizes) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(name)
    .bind(format!("test-{id}"))
    .bind(price_cents)
    .bind(vec!["P".to_string(), "M".to_string()])
    .execute(&state.pool)
    .await?;
    Ok(id)
}

fn shopper() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        email: Some("cliente@example.com".into()),
        is_admin: false,
    }
}

fn add(product_id: Uuid, quantity: serde_json::Value) -> AddToCartRequest {
    AddToCartRequest {
        product_id: Some(product_id.to_string()),
        quantity: Some(quantity),
        size: None,
    }
}

async fn order_status(state: &AppState, order_id: Uuid) -> anyhow::Result<String> {
    let (status,): (String,) = sqlx::query_as("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(status)
}

#[tokio::test]
async fn cart_checkout_and_webhook_flow() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, _gateway) = setup_state(&url, common::StubIdentity::default()).await?;

    let shirt = insert_product(&state, "Camiseta", Some(1000)).await?;
    let cap = insert_product(&state, "Boné", Some(500)).await?;
    let sock = insert_product(&state, "Meia", Some(300)).await?;
    let user = shopper();

    // Repeated adds accumulate onto one row.
    let first = cart_service::add_item(&state.pool, &user, add(shirt, json!(1))).await?;
    let second = cart_service::add_item(&state.pool, &user, add(shirt, json!(1))).await?;
    assert_eq!(first.item_id, second.item_id);
    assert_eq!(second.quantity, 2);
    cart_service::add_item(&state.pool, &user, add(cap, json!("3"))).await?;

    // Setting quantity 0 removes the row, and doing it again is still fine.
    let extra = cart_service::add_item(&state.pool, &user, add(sock, json!(1))).await?;
    for _ in 0..2 {
        let resp = cart_service::update_item(
            &state.pool,
            &user,
            UpdateCartItemRequest {
                item_id: Some(extra.item_id.to_string()),
                quantity: Some(json!(0)),
            },
        )
        .await?;
        assert_eq!(resp.deleted, Some(true));
    }

    let cart = cart_service::list_items(&state.pool, &user).await?;
    assert_eq!(cart.items.len(), 2);
    for item in &cart.items {
        let snapshot = item.product.as_ref().expect("product snapshot");
        assert_eq!(snapshot.sizes, vec!["P", "M"]);
    }

    let checkout = order_service::checkout(&state, &user, CheckoutRequest::default()).await?;
    assert_eq!(checkout.total_cents, 3500);
    let whatsapp = checkout.whatsapp_url.expect("whatsapp handoff");
    assert!(whatsapp.starts_with("https://wa.me/5511999999999?text="));
    assert!(checkout.checkout_url.is_none());

    let order = order_service::get_order(&state, &user, checkout.order_id).await?;
    assert_eq!(order.order.status, OrderStatus::Pending);
    assert!(order.items.iter().all(|i| {
        i.product.as_ref().is_some_and(|p| p.sizes == vec!["P", "M"])
    }));
    let mut totals: Vec<i64> = order.items.iter().filter_map(|i| i.line_total_cents).collect();
    totals.sort_unstable();
    assert_eq!(totals, vec![1500, 2000]);

    let cart = cart_service::list_items(&state.pool, &user).await?;
    assert!(cart.items.is_empty());
    assert!(matches!(
        order_service::checkout(&state, &user, CheckoutRequest::default()).await,
        Err(AppError::EmptyCart)
    ));

    // The same "paid" delivery twice leaves the order paid without error.
    let paid = PaymentEvent {
        provider: PROVIDER_PAGARME,
        event_type: "order.paid".into(),
        target: Some(OrderTarget::Id(checkout.order_id)),
        external_ref: Some("or_test_1".into()),
        status: Some(OrderStatus::Paid),
        shipping: None,
    };
    for _ in 0..2 {
        let outcome = reconcile_service::reconcile(&state, paid.clone()).await?;
        assert_eq!(outcome, ReconcileOutcome::Applied { rows: 1 });
    }
    assert_eq!(order_status(&state, checkout.order_id).await?, "paid");

    let anonymous = PaymentEvent {
        target: None,
        ..paid
    };
    assert_eq!(
        reconcile_service::reconcile(&state, anonymous).await?,
        ReconcileOutcome::Ignored
    );

    // A paid order cannot open a new payment intent.
    assert!(matches!(
        public_order_service::create_payment_intent(&state, &checkout.public_token).await,
        Err(AppError::OrderNotPayable)
    ));

    Ok(())
}

#[tokio::test]
async fn payment_intent_bootstrap_is_stable() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, gateway) = setup_state(&url, common::StubIdentity::default()).await?;

    let product = insert_product(&state, "Tênis", Some(25990)).await?;
    let user = shopper();
    cart_service::add_item(&state.pool, &user, add(product, json!(1))).await?;
    let checkout = order_service::checkout(&state, &user, CheckoutRequest::default()).await?;

    let first = public_order_service::create_payment_intent(&state, &checkout.public_token).await?;
    let second = public_order_service::create_payment_intent(&state, &checkout.public_token).await?;
    assert_eq!(first.client_secret, second.client_secret);
    assert_eq!(gateway.intents.lock().unwrap().len(), 1);

    let viewed = public_order_service::get_by_token(&state, &checkout.public_token).await?;
    assert_eq!(viewed.order.gateway_order_id.as_deref(), Some("pi_test_0"));

    assert!(matches!(
        public_order_service::get_by_token(&state, "missing-token").await,
        Err(AppError::NotFound)
    ));
    Ok(())
}

fn json_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let body = body.map(|v| Body::from(v.to_string())).unwrap_or_else(Body::empty);
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

async fn order_row(
    state: &AppState,
    order_id: Uuid,
) -> anyhow::Result<(String, Option<String>, Option<String>, Option<String>)> {
    let row: (String, Option<String>, Option<String>, Option<String>) = sqlx::query_as(
        "SELECT status, payment_link, gateway_provider, gateway_order_id FROM orders WHERE id = $1",
    )
    .bind(order_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(row)
}

#[tokio::test]
async fn admin_guard_covers_every_admin_route() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let shopper_id = Uuid::new_v4();
    let admin_id = Uuid::new_v4();
    let identity = common::StubIdentity::default()
        .with_user("shopper-token", shopper_id, "cliente@example.com")
        .with_user("admin-token", admin_id, "ops@example.com");
    let (state, _gateway) = setup_state(&url, identity).await?;

    sqlx::query("INSERT INTO admin_users (user_id) VALUES ($1)")
        .bind(admin_id)
        .execute(&state.pool)
        .await?;

    let app = common::app(state.clone());

    for (method, uri) in common::admin_routes() {
        let response =
            common::send(&app, json_request(method, &uri, "shopper-token", Some(json!({})))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {uri}");
        assert_eq!(common::json_body(response).await["error"], "Forbidden");
    }

    let admin = |method: &str, uri: &str, body: Option<Value>| {
        json_request(method, uri, "admin-token", body)
    };
    let ok = |response: axum::http::Response<Body>, what: &str| {
        assert_eq!(response.status(), StatusCode::OK, "{what}");
        response
    };

    let body = common::json_body(ok(common::send(&app, admin("GET", "/api/admin/me", None)).await, "me")).await;
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["user_id"], admin_id.to_string());

    // products
    let created = common::json_body(ok(
        common::send(
            &app,
            admin(
                "POST",
                "/api/admin/products",
                Some(json!({ "name": "Tênis Trilha", "category": "Calçados", "price_cents": "12990" })),
            ),
        )
        .await,
        "create product",
    ))
    .await;
    let product_id = created["item"]["id"].as_str().expect("product id").to_string();
    assert_eq!(created["item"]["price_label"], "R$ 129,90");
    assert_eq!(created["item"]["sizes"][0], "37");

    ok(common::send(&app, admin("GET", "/api/admin/products", None)).await, "list products");
    let product_uri = format!("/api/admin/products/{product_id}");
    ok(common::send(&app, admin("GET", &product_uri, None)).await, "get product");
    let updated = common::json_body(ok(
        common::send(&app, admin("PUT", &product_uri, Some(json!({ "badge": "Novo" })))).await,
        "update product",
    ))
    .await;
    assert_eq!(updated["item"]["badge"], "Novo");

    // catalog nodes
    let node = common::json_body(ok(
        common::send(
            &app,
            admin("POST", "/api/admin/catalog-nodes", Some(json!({ "label": "Novidades" }))),
        )
        .await,
        "create node",
    ))
    .await;
    let node_uri = format!("/api/admin/catalog-nodes/{}", node["item"]["id"].as_str().expect("node id"));
    ok(common::send(&app, admin("GET", "/api/admin/catalog-nodes", None)).await, "list nodes");
    let node = common::json_body(ok(
        common::send(&app, admin("PUT", &node_uri, Some(json!({ "sort_order": 5 })))).await,
        "update node",
    ))
    .await;
    assert_eq!(node["item"]["sort_order"], 5);

    // orders
    let buyer = AuthUser {
        user_id: shopper_id,
        email: Some("cliente@example.com".into()),
        is_admin: false,
    };
    let priced = insert_product(&state, "Meia Cano Alto", Some(2990)).await?;
    cart_service::add_item(&state.pool, &buyer, add(priced, json!(1))).await?;
    let checkout = order_service::checkout(&state, &buyer, CheckoutRequest::default()).await?;
    let order_uri = format!("/api/admin/orders/{}", checkout.order_id);

    ok(common::send(&app, admin("GET", "/api/admin/orders", None)).await, "list orders");
    ok(common::send(&app, admin("GET", &order_uri, None)).await, "get order");
    let patched = common::json_body(ok(
        common::send(&app, admin("PATCH", &order_uri, Some(json!({ "status": "confirmed" })))).await,
        "patch order",
    ))
    .await;
    assert_eq!(patched["item"]["status"], "confirmed");

    // landing
    ok(common::send(&app, admin("GET", "/api/admin/landing", None)).await, "get landing");
    ok(
        common::send(
            &app,
            admin("PUT", "/api/admin/landing", Some(json!({ "hero": { "title": "Nova coleção" } }))),
        )
        .await,
        "save landing",
    );

    ok(common::send(&app, admin("DELETE", &product_uri, None)).await, "delete product");
    ok(common::send(&app, admin("DELETE", &node_uri, None)).await, "delete node");
    let response = common::send(&app, admin("GET", &product_uri, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn stripe_checkout_stores_session_reference() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, gateway) = setup_state(&url, common::StubIdentity::default()).await?;

    let jacket = insert_product(&state, "Jaqueta Jeans", Some(45990)).await?;
    let user = shopper();
    cart_service::add_item(&state.pool, &user, add(jacket, json!(2))).await?;

    let stripe = CheckoutRequest {
        provider: Some(CheckoutProvider::Stripe),
    };
    let checkout = order_service::checkout(&state, &user, stripe).await?;
    assert_eq!(checkout.total_cents, 91980);
    assert_eq!(
        checkout.checkout_url.as_deref(),
        Some("https://checkout.example/session")
    );
    assert!(checkout.whatsapp_url.is_none());

    let (status, link, provider, reference) = order_row(&state, checkout.order_id).await?;
    assert_eq!(status, "pending");
    assert_eq!(link.as_deref(), Some("https://checkout.example/session"));
    assert_eq!(provider.as_deref(), Some("stripe"));
    assert_eq!(reference, Some(format!("cs_test_{}", checkout.order_id)));

    let sessions = gateway.sessions.lock().unwrap().clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].lines[0].unit_amount_cents, 45990);
    assert_eq!(sessions[0].lines[0].quantity, 2);
    assert!(sessions[0].success_url.contains(&checkout.public_token));

    assert!(cart_service::list_items(&state.pool, &user).await?.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn stripe_checkout_rejects_price_on_request_items() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, gateway) = setup_state(&url, common::StubIdentity::default()).await?;

    let priced = insert_product(&state, "Camiseta", Some(7990)).await?;
    let bespoke = insert_product(&state, "Terno Sob Medida", None).await?;
    let user = shopper();
    cart_service::add_item(&state.pool, &user, add(priced, json!(1))).await?;
    cart_service::add_item(&state.pool, &user, add(bespoke, json!(1))).await?;

    let stripe = CheckoutRequest {
        provider: Some(CheckoutProvider::Stripe),
    };
    let result = order_service::checkout(&state, &user, stripe).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders, 0);
    assert!(gateway.sessions.lock().unwrap().is_empty());
    assert_eq!(cart_service::list_items(&state.pool, &user).await?.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn webhooks_update_only_what_they_carry() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, _gateway) = setup_state(&url, common::StubIdentity::default()).await?;
    let app = common::app(state.clone());
    let product = insert_product(&state, "Bermuda", Some(8990)).await?;

    // Completed hosted checkout carrying only name and zip.
    let user = shopper();
    cart_service::add_item(&state.pool, &user, add(product, json!(1))).await?;
    let order = order_service::checkout(&state, &user, CheckoutRequest::default()).await?;
    sqlx::query(
        "UPDATE orders SET shipping_city = 'Campinas', shipping_notes = 'Portão azul' WHERE id = $1",
    )
    .bind(order.order_id)
    .execute(&state.pool)
    .await?;

    let body = json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_live_1",
            "client_reference_id": order.order_id,
            "customer_details": { "name": "Ana Souza", "address": { "postal_code": "13000-000" } }
        }}
    })
    .to_string();
    let signature = sign_payload(
        body.as_bytes(),
        common::STRIPE_WEBHOOK_SECRET,
        chrono::Utc::now().timestamp(),
    );
    let request = Request::post("/api/webhooks/stripe")
        .header("Stripe-Signature", signature)
        .body(Body::from(body))
        .unwrap();
    assert_eq!(common::send(&app, request).await.status(), StatusCode::OK);

    let viewed = public_order_service::get_by_token(&state, &order.public_token).await?;
    assert_eq!(viewed.order.status, OrderStatus::Paid);
    assert_eq!(viewed.order.gateway_order_id.as_deref(), Some("cs_live_1"));
    let shipping = viewed.order.shipping;
    assert_eq!(shipping.name.as_deref(), Some("Ana Souza"));
    assert_eq!(shipping.zip.as_deref(), Some("13000-000"));
    assert_eq!(shipping.city.as_deref(), Some("Campinas"));
    assert_eq!(shipping.notes.as_deref(), Some("Portão azul"));
    assert_eq!(shipping.phone, None);

    // Pagar.me event located only by the stored gateway reference.
    let other = shopper();
    cart_service::add_item(&state.pool, &other, add(product, json!(1))).await?;
    let order = order_service::checkout(&state, &other, CheckoutRequest::default()).await?;
    let reference = format!("or_{}", Uuid::new_v4().simple());
    sqlx::query("UPDATE orders SET gateway_order_id = $2 WHERE id = $1")
        .bind(order.order_id)
        .bind(&reference)
        .execute(&state.pool)
        .await?;

    let uri = format!("/api/webhooks/pagarme?token={}", common::PAGARME_TOKEN);
    let request = Request::post(uri.as_str())
        .body(Body::from(
            json!({ "type": "order.paid", "data": { "id": reference, "status": "paid" } }).to_string(),
        ))
        .unwrap();
    assert_eq!(common::send(&app, request).await.status(), StatusCode::OK);

    let (status, _, provider, stored_ref) = order_row(&state, order.order_id).await?;
    assert_eq!(status, "paid");
    assert_eq!(provider.as_deref(), Some(PROVIDER_PAGARME));
    assert_eq!(stored_ref, Some(reference));
    Ok(())
}

#[tokio::test]
async fn cart_quantity_cannot_overflow() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, _gateway) = setup_state(&url, common::StubIdentity::default()).await?;
    let product = insert_product(&state, "Pulseira", Some(1990)).await?;
    let user = shopper();

    cart_service::add_item(&state.pool, &user, add(product, json!(i32::MAX))).await?;
    let result = cart_service::add_item(&state.pool, &user, add(product, json!(1))).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let cart = cart_service::list_items(&state.pool, &user).await?;
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, i32::MAX);
    Ok(())
}

#[tokio::test]
async fn double_submitted_checkout_creates_one_order() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        return Ok(());
    };
    let (state, _gateway) = setup_state(&url, common::StubIdentity::default()).await?;
    let product = insert_product(&state, "Cinto", Some(4990)).await?;
    let user = shopper();
    cart_service::add_item(&state.pool, &user, add(product, json!(2))).await?;

    let (first, second) = tokio::join!(
        order_service::checkout(&state, &user, CheckoutRequest::default()),
        order_service::checkout(&state, &user, CheckoutRequest::default()),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(AppError::EmptyCart))));

    let (orders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders, 1);
    Ok(())
}
