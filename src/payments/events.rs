//! Provider webhook payloads normalized into one [`PaymentEvent`].
//!
//! Each gateway speaks its own vocabulary. Adapters authenticate the raw
//! request, then map it onto the internal order status enum and the order
//! it refers to. What happens to the order afterwards is the reconciler's
//! job, not the adapter's.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use uuid::Uuid;

use super::{PROVIDER_PAGARME, PROVIDER_STRIPE, stripe};
use crate::{
    error::{AppError, AppResult},
    models::OrderStatus,
};

/// How a webhook event locates its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderTarget {
    Id(Uuid),
    GatewayRef(String),
}

/// Shipping data carried by a completed hosted checkout. Only present
/// fields overwrite the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl ShippingPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub provider: &'static str,
    pub event_type: String,
    pub target: Option<OrderTarget>,
    /// Gateway-side identifier stamped on the order when known.
    pub external_ref: Option<String>,
    pub status: Option<OrderStatus>,
    pub shipping: Option<ShippingPatch>,
}

/// Raw inbound webhook request, before any provider-specific parsing.
#[derive(Debug, Clone, Copy)]
pub struct WebhookRequest<'a> {
    pub signature: Option<&'a str>,
    pub query_token: Option<&'a str>,
    pub body: &'a [u8],
    pub now: i64,
}

pub trait PaymentProviderAdapter: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Reject requests that did not come from the provider.
    fn authenticate(&self, request: &WebhookRequest<'_>) -> AppResult<()>;

    fn parse(&self, body: &[u8]) -> AppResult<PaymentEvent>;

    fn accept(&self, request: &WebhookRequest<'_>) -> AppResult<PaymentEvent> {
        self.authenticate(request)?;
        self.parse(request.body)
    }
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn uuid_at(value: &Value, pointer: &str) -> Option<Uuid> {
    str_at(value, pointer).and_then(|s| Uuid::parse_str(s).ok())
}

// ---------------------------------------------------------------------------
// Pagar.me
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct PagarmeAdapter {
    token: Option<SecretString>,
}

impl PagarmeAdapter {
    pub fn new(token: Option<SecretString>) -> Self {
        Self { token }
    }
}

/// Map a Pagar.me order/charge status, falling back to the event type.
pub fn pagarme_status(status: Option<&str>, event_type: &str) -> Option<OrderStatus> {
    let status = status.map(str::to_ascii_lowercase);
    match status.as_deref() {
        Some("paid" | "approved" | "authorized" | "captured") => Some(OrderStatus::Paid),
        Some("canceled" | "failed" | "refused") => Some(OrderStatus::Canceled),
        _ if event_type.to_ascii_lowercase().contains("paid") => Some(OrderStatus::Paid),
        _ => None,
    }
}

impl PaymentProviderAdapter for PagarmeAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER_PAGARME
    }

    fn authenticate(&self, request: &WebhookRequest<'_>) -> AppResult<()> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        match request.query_token {
            Some(given) if given == expected.expose_secret() => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }

    fn parse(&self, body: &[u8]) -> AppResult<PaymentEvent> {
        // Unreadable payloads are acknowledged and ignored like any other
        // event we cannot tie to an order.
        let payload: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

        let event_type = str_at(&payload, "/type").unwrap_or_default().to_string();
        let status = str_at(&payload, "/data/status")
            .or_else(|| str_at(&payload, "/data/charges/0/status"))
            .or_else(|| str_at(&payload, "/data/charge/status"));
        let external_ref = str_at(&payload, "/data/id").map(str::to_string);

        let target = uuid_at(&payload, "/data/metadata/order_id")
            .or_else(|| uuid_at(&payload, "/data/order/metadata/order_id"))
            .map(OrderTarget::Id)
            .or_else(|| external_ref.clone().map(OrderTarget::GatewayRef));

        Ok(PaymentEvent {
            provider: PROVIDER_PAGARME,
            status: pagarme_status(status, &event_type),
            event_type,
            target,
            external_ref,
            shipping: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Stripe
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct StripeAdapter {
    secret: Option<SecretString>,
}

impl StripeAdapter {
    pub fn new(secret: Option<SecretString>) -> Self {
        Self { secret }
    }
}

const STRIPE_PAID_EVENTS: [&str; 3] = [
    "payment_intent.succeeded",
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

const STRIPE_CANCELED_EVENTS: [&str; 4] = [
    "payment_intent.payment_failed",
    "charge.failed",
    "checkout.session.expired",
    "checkout.session.async_payment_failed",
];

pub fn stripe_status(event_type: &str) -> Option<OrderStatus> {
    if STRIPE_PAID_EVENTS.iter().any(|e| event_type.contains(e)) {
        Some(OrderStatus::Paid)
    } else if STRIPE_CANCELED_EVENTS.iter().any(|e| event_type.contains(e)) {
        Some(OrderStatus::Canceled)
    } else {
        None
    }
}

fn stripe_shipping(object: &Value) -> ShippingPatch {
    let shipping = object
        .pointer("/shipping_details")
        .filter(|v| !v.is_null())
        .or_else(|| object.pointer("/collected_information/shipping_details"))
        .filter(|v| !v.is_null());
    let customer = object.pointer("/customer_details").filter(|v| !v.is_null());

    let pick = |pointer: &str| {
        shipping
            .and_then(|v| str_at(v, pointer))
            .or_else(|| customer.and_then(|v| str_at(v, pointer)))
            .map(str::to_string)
    };

    let line1 = pick("/address/line1");
    let line2 = pick("/address/line2");
    let address = match (line1, line2) {
        (Some(a), Some(b)) => Some(format!("{a}, {b}")),
        (a, b) => a.or(b),
    };

    ShippingPatch {
        name: pick("/name"),
        phone: pick("/phone"),
        address,
        city: pick("/address/city"),
        state: pick("/address/state"),
        zip: pick("/address/postal_code"),
    }
}

impl PaymentProviderAdapter for StripeAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER_STRIPE
    }

    fn authenticate(&self, request: &WebhookRequest<'_>) -> AppResult<()> {
        let Some(secret) = &self.secret else {
            tracing::warn!("stripe webhook received but no signing secret is configured");
            return Err(AppError::InvalidSignature);
        };
        let header = request.signature.ok_or(AppError::InvalidSignature)?;
        stripe::verify_signature(header, request.body, secret.expose_secret(), request.now)
    }

    fn parse(&self, body: &[u8]) -> AppResult<PaymentEvent> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {e}")))?;

        let event_type = str_at(&payload, "/type").unwrap_or_default().to_string();
        let object = payload.pointer("/data/object").unwrap_or(&Value::Null);

        let target = uuid_at(object, "/metadata/order_id")
            .or_else(|| uuid_at(object, "/client_reference_id"))
            .map(OrderTarget::Id);
        let external_ref = str_at(object, "/payment_intent")
            .or_else(|| str_at(object, "/id"))
            .map(str::to_string);

        let shipping = (event_type == "checkout.session.completed")
            .then(|| stripe_shipping(object))
            .filter(|patch| !patch.is_empty());

        Ok(PaymentEvent {
            provider: PROVIDER_STRIPE,
            status: stripe_status(&event_type),
            event_type,
            target,
            external_ref,
            shipping,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request<'a>(body: &'a [u8], token: Option<&'a str>, sig: Option<&'a str>) -> WebhookRequest<'a> {
        WebhookRequest {
            signature: sig,
            query_token: token,
            body,
            now: 1_700_000_000,
        }
    }

    #[test]
    fn pagarme_vocabulary() {
        for s in ["paid", "approved", "authorized", "captured", "PAID"] {
            assert_eq!(pagarme_status(Some(s), ""), Some(OrderStatus::Paid), "{s}");
        }
        for s in ["canceled", "failed", "refused"] {
            assert_eq!(pagarme_status(Some(s), ""), Some(OrderStatus::Canceled), "{s}");
        }
        assert_eq!(pagarme_status(Some("pending"), "order.paid"), Some(OrderStatus::Paid));
        assert_eq!(pagarme_status(None, "charge.paid"), Some(OrderStatus::Paid));
        assert_eq!(pagarme_status(Some("pending"), "order.created"), None);
    }

    #[test]
    fn pagarme_prefers_metadata_order_id() {
        let order_id = Uuid::new_v4();
        let body = json!({
            "type": "order.paid",
            "data": { "id": "or_123", "status": "paid", "metadata": { "order_id": order_id } }
        })
        .to_string();
        let event = PagarmeAdapter::default().parse(body.as_bytes()).unwrap();
        assert_eq!(event.target, Some(OrderTarget::Id(order_id)));
        assert_eq!(event.external_ref.as_deref(), Some("or_123"));
        assert_eq!(event.status, Some(OrderStatus::Paid));
    }

    #[test]
    fn pagarme_falls_back_to_gateway_ref_and_charge_status() {
        let body = json!({
            "type": "charge.updated",
            "data": { "id": "or_456", "charges": [{ "status": "refused" }] }
        })
        .to_string();
        let event = PagarmeAdapter::default().parse(body.as_bytes()).unwrap();
        assert_eq!(event.target, Some(OrderTarget::GatewayRef("or_456".into())));
        assert_eq!(event.status, Some(OrderStatus::Canceled));
    }

    #[test]
    fn pagarme_without_identifiers_has_no_target() {
        let event = PagarmeAdapter::default()
            .parse(br#"{"type":"order.paid","data":{}}"#)
            .unwrap();
        assert_eq!(event.target, None);

        let event = PagarmeAdapter::default().parse(b"not json").unwrap();
        assert_eq!(event.target, None);
        assert_eq!(event.status, None);
    }

    #[test]
    fn pagarme_token_checked_only_when_configured() {
        let open = PagarmeAdapter::default();
        assert!(open.authenticate(&request(b"{}", None, None)).is_ok());

        let guarded = PagarmeAdapter::new(Some(SecretString::from("s3cret".to_string())));
        assert!(guarded.authenticate(&request(b"{}", Some("s3cret"), None)).is_ok());
        assert!(matches!(
            guarded.authenticate(&request(b"{}", Some("nope"), None)),
            Err(AppError::Unauthorized)
        ));
        assert!(guarded.authenticate(&request(b"{}", None, None)).is_err());
    }

    #[test]
    fn stripe_vocabulary() {
        assert_eq!(stripe_status("payment_intent.succeeded"), Some(OrderStatus::Paid));
        assert_eq!(stripe_status("checkout.session.completed"), Some(OrderStatus::Paid));
        assert_eq!(
            stripe_status("checkout.session.async_payment_succeeded"),
            Some(OrderStatus::Paid)
        );
        assert_eq!(stripe_status("charge.failed"), Some(OrderStatus::Canceled));
        assert_eq!(stripe_status("checkout.session.expired"), Some(OrderStatus::Canceled));
        assert_eq!(
            stripe_status("checkout.session.async_payment_failed"),
            Some(OrderStatus::Canceled)
        );
        assert_eq!(stripe_status("customer.created"), None);
    }

    #[test]
    fn stripe_requires_secret_and_signature() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let unconfigured = StripeAdapter::default();
        let header = stripe::sign_payload(body, "whsec", 1_700_000_000);
        assert!(matches!(
            unconfigured.accept(&request(body, None, Some(&header))),
            Err(AppError::InvalidSignature)
        ));

        let adapter = StripeAdapter::new(Some(SecretString::from("whsec".to_string())));
        assert!(adapter.accept(&request(body, None, None)).is_err());
        assert!(adapter.accept(&request(body, None, Some("t=1,v1=00"))).is_err());
        assert!(adapter.accept(&request(body, None, Some(&header))).is_ok());
    }

    #[test]
    fn stripe_completed_session_carries_shipping() {
        let order_id = Uuid::new_v4();
        let body = json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "client_reference_id": order_id,
                "payment_intent": "pi_123",
                "customer_details": { "name": "Ana", "phone": "+5511988887777", "address": null },
                "shipping_details": {
                    "name": "Ana Souza",
                    "address": {
                        "line1": "Rua A, 10", "line2": "Apto 2",
                        "city": "São Paulo", "state": "SP", "postal_code": "01000-000"
                    }
                }
            }}
        })
        .to_string();
        let event = StripeAdapter::default().parse(body.as_bytes()).unwrap();
        assert_eq!(event.target, Some(OrderTarget::Id(order_id)));
        assert_eq!(event.external_ref.as_deref(), Some("pi_123"));
        assert_eq!(event.status, Some(OrderStatus::Paid));
        let shipping = event.shipping.unwrap();
        assert_eq!(shipping.name.as_deref(), Some("Ana Souza"));
        assert_eq!(shipping.phone.as_deref(), Some("+5511988887777"));
        assert_eq!(shipping.address.as_deref(), Some("Rua A, 10, Apto 2"));
        assert_eq!(shipping.zip.as_deref(), Some("01000-000"));
    }

    #[test]
    fn stripe_event_without_order_reference_has_no_target() {
        let body = json!({
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_999", "metadata": {} } }
        })
        .to_string();
        let event = StripeAdapter::default().parse(body.as_bytes()).unwrap();
        assert_eq!(event.target, None);
        assert_eq!(event.external_ref.as_deref(), Some("pi_999"));
        assert!(event.shipping.is_none());
    }
}
