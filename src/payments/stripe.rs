//! Stripe REST client and webhook signature verification.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::instrument;
use uuid::Uuid;

use super::{
    CheckoutSession, CheckoutSessionRequest, PROVIDER_STRIPE, PaymentGateway, PaymentIntent,
};
use crate::error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a signed webhook, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    base_url: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: SecretString) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            client,
            secret_key,
            base_url: STRIPE_API_BASE.to_string(),
        })
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AppError::Upstream(format!("stripe response: {e}")));
        }

        let message = response
            .json::<StripeErrorEnvelope>()
            .await
            .ok()
            .and_then(|env| env.error.message)
            .unwrap_or_else(|| format!("stripe returned {status}"));
        Err(AppError::Upstream(message))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    fn provider(&self) -> &'static str {
        PROVIDER_STRIPE
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn create_payment_intent(
        &self,
        order_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> AppResult<PaymentIntent> {
        let params = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("metadata[order_id]", order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(self.secret_key.expose_secret(), Some(""))
            // A second bootstrap racing the first gets the same intent back.
            .header("Idempotency-Key", format!("order-{order_id}-payment-intent"))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("stripe unreachable: {e}")))?;

        let intent: PaymentIntent = Self::read(response).await?;
        tracing::info!(intent_id = %intent.id, "payment intent created");
        Ok(intent)
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(&self, intent_id: &str) -> AppResult<PaymentIntent> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.base_url))
            .basic_auth(self.secret_key.expose_secret(), Some(""))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("stripe unreachable: {e}")))?;

        Self::read(response).await
    }

    #[instrument(skip_all, fields(order_id = %request.order_id))]
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        let params = checkout_session_form(&request);

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(self.secret_key.expose_secret(), Some(""))
            .header(
                "Idempotency-Key",
                format!("order-{}-checkout-session", request.order_id),
            )
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("stripe unreachable: {e}")))?;

        let session: CheckoutSession = Self::read(response).await?;
        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }
}

fn checkout_session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let order_id = request.order_id.to_string();
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("client_reference_id".to_string(), order_id.clone()),
        ("metadata[order_id]".to_string(), order_id.clone()),
        ("payment_intent_data[metadata][order_id]".to_string(), order_id),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "shipping_address_collection[allowed_countries][0]".to_string(),
            "BR".to_string(),
        ),
        ("phone_number_collection[enabled]".to_string(), "true".to_string()),
    ];
    if let Some(email) = &request.customer_email {
        params.push(("customer_email".to_string(), email.clone()));
    }
    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        params.push((
            format!("{prefix}[price_data][currency]"),
            request.currency.clone(),
        ));
        params.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        params.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount_cents.to_string(),
        ));
        params.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }
    params
}

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against the raw request body.
///
/// The signed payload is `"{t}.{body}"`, HMAC-SHA256 keyed by the endpoint
/// secret. Any matching `v1` entry is accepted, as long as `t` lies within
/// [`SIGNATURE_TOLERANCE_SECS`] of `now`.
pub fn verify_signature(header: &str, body: &[u8], secret: &str, now: i64) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::InvalidSignature)?;
    let ts: i64 = timestamp.parse().map_err(|_| AppError::InvalidSignature)?;
    let within_tolerance = now
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .is_some_and(|age| age <= SIGNATURE_TOLERANCE_SECS);
    if !within_tolerance {
        tracing::warn!(ts, now, "stripe signature timestamp outside tolerance");
        return Err(AppError::InvalidSignature);
    }

    let matched = signatures.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        // verify_slice compares in constant time
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

/// Build a valid signature header. Used by tests and local tooling to
/// replay webhook payloads.
pub fn sign_payload(body: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"payment_intent.succeeded"}"#;

    #[test]
    fn accepts_own_signature() {
        let header = sign_payload(BODY, SECRET, 1_700_000_000);
        assert!(verify_signature(&header, BODY, SECRET, 1_700_000_010).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let good = sign_payload(BODY, SECRET, 1_700_000_000);
        let v1 = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1=deadbeef,v1={v1}");
        assert!(verify_signature(&header, BODY, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign_payload(BODY, SECRET, 1_700_000_000);
        let err = verify_signature(&header, b"{}", SECRET, 1_700_000_000).unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = sign_payload(BODY, "whsec_other", 1_700_000_000);
        assert!(verify_signature(&header, BODY, SECRET, 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let header = sign_payload(BODY, SECRET, 1_700_000_000);
        let later = 1_700_000_000 + SIGNATURE_TOLERANCE_SECS as i64 + 1;
        assert!(verify_signature(&header, BODY, SECRET, later).is_err());
    }

    #[test]
    fn rejects_extreme_timestamps_without_overflow() {
        for ts in [i64::MIN, i64::MIN + 1, i64::MAX] {
            let header = format!("t={ts},v1=00");
            let result = verify_signature(&header, BODY, SECRET, 1_700_000_000);
            assert!(matches!(result, Err(AppError::InvalidSignature)), "t={ts}");
        }
        let header = sign_payload(BODY, SECRET, 1_700_000_000);
        assert!(verify_signature(&header, BODY, SECRET, i64::MIN).is_err());
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(verify_signature("garbage", BODY, SECRET, 0).is_err());
        assert!(verify_signature("t=abc,v1=00", BODY, SECRET, 0).is_err());
        assert!(verify_signature("t=0", BODY, SECRET, 0).is_err());
    }

    #[test]
    fn session_form_carries_order_reference_and_lines() {
        let order_id = Uuid::new_v4();
        let form = checkout_session_form(&CheckoutSessionRequest {
            order_id,
            customer_email: Some("ana@example.com".into()),
            currency: "brl".into(),
            lines: vec![super::super::SessionLine {
                name: "Camiseta".into(),
                unit_amount_cents: 1000,
                quantity: 2,
            }],
            success_url: "https://shop.test/ok".into(),
            cancel_url: "https://shop.test/cancel".into(),
        });
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_reference_id"), Some(order_id.to_string().as_str()));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1000"));
        assert_eq!(get("line_items[0][quantity]"), Some("2"));
        assert_eq!(get("customer_email"), Some("ana@example.com"));
    }
}
