use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{
            AddToCartRequest, AddToCartResponse, CartView, RemoveCartItemRequest,
            UpdateCartItemRequest, UpdateCartItemResponse,
        },
        orders::{
            AdminContext, AdminOrderPatch, CheckoutProvider, CheckoutRequest, CheckoutResponse,
            PatchShippingRequest, PaymentIntentResponse,
        },
        products::{CatalogNodeInput, ProductInput},
    },
    landing::{Banner, Hero, Highlight, LandingContent},
    models::{
        CartItem, CatalogNode, Order, OrderItem, OrderStatus, OrderWithItems, Product,
        ProductSnapshot, ShippingFields, UserAddress,
    },
    response::{ItemResponse, ListResponse, Meta, OkResponse},
    routes::{account, admin, cart, health, orders, params, products, webhooks},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::checkout,
        orders::list_orders,
        orders::get_order,
        orders::get_public_order,
        orders::patch_public_order,
        orders::create_payment_intent,
        account::get_address,
        account::save_address,
        products::list_products,
        products::get_product,
        products::list_catalog_nodes,
        products::get_landing,
        webhooks::pagarme_webhook,
        webhooks::stripe_webhook,
        admin::admin_me,
        admin::list_products,
        admin::get_product,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::list_catalog_nodes,
        admin::create_catalog_node,
        admin::update_catalog_node,
        admin::delete_catalog_node,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order,
        admin::get_landing,
        admin::save_landing
    ),
    components(
        schemas(
            health::HealthData,
            Product,
            ProductSnapshot,
            CartItem,
            CatalogNode,
            Order,
            OrderItem,
            OrderStatus,
            OrderWithItems,
            ShippingFields,
            UserAddress,
            LandingContent,
            Hero,
            Highlight,
            Banner,
            AddToCartRequest,
            AddToCartResponse,
            UpdateCartItemRequest,
            UpdateCartItemResponse,
            RemoveCartItemRequest,
            CartView,
            CheckoutProvider,
            CheckoutRequest,
            CheckoutResponse,
            PatchShippingRequest,
            PaymentIntentResponse,
            AdminOrderPatch,
            AdminContext,
            ProductInput,
            CatalogNodeInput,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            OkResponse,
            ItemResponse<Product>,
            ItemResponse<OrderWithItems>,
            ListResponse<Product>,
            ListResponse<Order>,
            ListResponse<CatalogNode>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Catalog", description = "Public catalog endpoints"),
        (name = "Cart", description = "Cart and checkout endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Public orders", description = "Token-gated order endpoints"),
        (name = "Account", description = "Account endpoints"),
        (name = "Webhooks", description = "Payment provider webhooks"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
